use anyhow::{Context, Result};
use serde_json::json;
use ssrm_core::{explain_offline, GridRequest, SsrmService};
use std::fs;
use std::io::Read;

use crate::config::Config;
use crate::http;

/// Start the HTTP server
pub async fn serve(config: Config) -> Result<()> {
    let service = SsrmService::open(config.backend.clone())
        .await
        .context("Failed to open backend")?;
    http::run_server(service, &config.server).await
}

/// Run one request and print the response envelope
pub async fn query(config: Config, request: &str) -> Result<()> {
    let request = read_request(request)?;
    let service = SsrmService::open(config.backend)
        .await
        .context("Failed to open backend")?;

    let response = service.query(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    service.close().await;
    Ok(())
}

/// Print the statements a request would run, without connecting
pub fn explain(mut config: Config, request: &str, quote: Option<char>) -> Result<()> {
    let request = read_request(request)?;
    if quote.is_some() {
        config.backend.quote_char = quote;
    }

    let plan = explain_offline(&config.backend, &request)?;
    let output = json!({
        "query": plan.query.to_inline_sql(),
        "countQuery": plan.count_query.to_inline_sql(),
        "sql": plan.query.sql(),
        "params": plan.query.params().map(|p| p.to_inline()).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print columns and row count of the configured table
pub async fn describe(config: Config) -> Result<()> {
    let service = SsrmService::open(config.backend)
        .await
        .context("Failed to open backend")?;

    let info = service.table_info().await?;
    println!("{}", serde_json::to_string_pretty(&info)?);

    service.close().await;
    Ok(())
}

/// Request JSON given inline, as `@path`, or `-` for stdin
fn read_request(arg: &str) -> Result<GridRequest> {
    let text = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else if let Some(path) = arg.strip_prefix('@') {
        fs::read_to_string(path).with_context(|| format!("Failed to read request file: {}", path))?
    } else {
        arg.to_string()
    };

    Ok(GridRequest::from_json(&text)?)
}
