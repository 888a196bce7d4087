//! HTTP routes
//!
//! - `GET /`: service description
//! - `POST /data-ssrm`: one grid request, answered with `{rowData, rowCount}`
//! - `GET /table-info`: columns and row count of the configured table
//! - `GET /stats`: request counters of the query engine

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{get, middleware, post, web, App, HttpResponse, HttpServer, ResponseError};
use anyhow::{Context, Result};
use serde_json::json;
use ssrm_core::{ErrorCategory, SsrmService};
use tracing::{error, info};

use crate::config::ServerConfig;

/// Failure of a request, rendered as `{"detail": ...}`
#[derive(Debug)]
pub struct ApiError(ssrm_core::Error);

impl From<ssrm_core::Error> for ApiError {
    fn from(err: ssrm_core::Error) -> Self {
        Self(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error processing SSRM request: {}", self.0)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0.category() {
            ErrorCategory::Request => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}

#[get("/")]
async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "name": "ssrm",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Server-side row model query engine",
    }))
}

#[post("/data-ssrm")]
async fn data_ssrm(
    service: web::Data<SsrmService>,
    payload: web::Json<serde_json::Value>,
) -> Result<HttpResponse, ApiError> {
    match service.query_json(payload.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(e) => {
            error!(error = %e, category = %e.category(), "SSRM request failed");
            Err(e.into())
        }
    }
}

#[get("/stats")]
async fn stats(service: web::Data<SsrmService>) -> HttpResponse {
    HttpResponse::Ok().json(service.stats())
}

#[get("/table-info")]
async fn table_info(service: web::Data<SsrmService>) -> Result<HttpResponse, ApiError> {
    let info = service.table_info().await?;
    Ok(HttpResponse::Ok().json(info))
}

/// Register all routes; malformed JSON bodies get the same error envelope
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::from(ssrm_core::Error::invalid_request(err.to_string())).into()
    });

    cfg.app_data(json_config)
        .service(root)
        .service(data_ssrm)
        .service(table_info)
        .service(stats);
}

/// Serve until shutdown
pub async fn run_server(service: SsrmService, settings: &ServerConfig) -> Result<()> {
    let service = web::Data::new(service);
    let bind_addr = format!("{}:{}", settings.host, settings.port);
    info!("Starting HTTP server on {}", bind_addr);
    info!("Endpoints: GET /, POST /data-ssrm, GET /table-info, GET /stats");

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(service.clone())
            .configure(configure)
    });
    if settings.workers > 0 {
        server = server.workers(settings.workers);
    }

    server
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind {}", bind_addr))?
        .run()
        .await
        .context("HTTP server failed")?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use ssrm_core::BackendConfig;
    use tempfile::TempDir;

    async fn seeded_service() -> (TempDir, SsrmService) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("demo_data.db");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE demo_data (id INTEGER, name TEXT, sector TEXT, revenue REAL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO demo_data VALUES \
             (1, 'Acme Corp', 'Technology', 100.0), \
             (2, 'Initech', 'Technology', 50.0), \
             (3, 'Umbrella Corp', 'Healthcare', 75.0)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;

        let service = SsrmService::open(BackendConfig::for_sqlite(&db_path, "demo_data"))
            .await
            .unwrap();
        (temp_dir, service)
    }

    #[actix_web::test]
    async fn test_root() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "ssrm");
    }

    #[actix_web::test]
    async fn test_data_ssrm_grouped() {
        let (_dir, service) = seeded_service().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/data-ssrm")
            .set_json(json!({
                "startRow": 0,
                "endRow": 100,
                "rowGroupCols": [{"id": "sector", "field": "sector"}],
                "valueCols": [{"field": "revenue", "aggFunc": "sum"}],
                "sortModel": [{"colId": "sector", "sort": "desc"}]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["rowCount"], 2);
        assert_eq!(
            body["rowData"],
            json!([
                {"sector": "Technology", "revenue": 150.0},
                {"sector": "Healthcare", "revenue": 75.0}
            ])
        );
    }

    #[actix_web::test]
    async fn test_invalid_request_is_400() {
        let (_dir, service) = seeded_service().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/data-ssrm")
            .set_json(json!({"sortModel": [{"colId": "id", "sort": "sideways"}]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_unknown_column_is_500_with_detail() {
        let (_dir, service) = seeded_service().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/data-ssrm")
            .set_json(json!({
                "filterModel": {"nope": {"filterType": "text", "filter": "x"}}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = test::read_body_json(resp).await;
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.starts_with("Error processing SSRM request: "));
        assert!(detail.contains("nope"));
    }

    #[actix_web::test]
    async fn test_malformed_body_gets_detail_envelope() {
        let (_dir, service) = seeded_service().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/data-ssrm")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.starts_with("Error processing SSRM request: Invalid request"));
    }

    #[actix_web::test]
    async fn test_stats_count_requests() {
        let (_dir, service) = seeded_service().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(configure),
        )
        .await;

        let ok = test::TestRequest::post()
            .uri("/data-ssrm")
            .set_json(json!({"startRow": 0, "endRow": 10}))
            .to_request();
        assert!(test::call_service(&app, ok).await.status().is_success());

        let failing = test::TestRequest::post()
            .uri("/data-ssrm")
            .set_json(json!({"sortModel": [{"colId": "missing", "sort": "asc"}]}))
            .to_request();
        let resp = test::call_service(&app, failing).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let req = test::TestRequest::get().uri("/stats").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total_queries"], 2);
        assert_eq!(body["error_queries"], 1);
    }

    #[actix_web::test]
    async fn test_table_info() {
        let (_dir, service) = seeded_service().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(service))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/table-info").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["table_name"], "demo_data");
        assert_eq!(body["total_rows"], 3);
        assert_eq!(body["columns"][1]["column_name"], "name");
    }
}
