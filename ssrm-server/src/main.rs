use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod commands;
mod config;
mod http;
mod logging;

#[derive(Parser)]
#[command(name = "ssrm")]
#[command(about = "SSRM - Server-side row model query engine for data grids")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "SSRM Team")]
struct Cli {
    /// SQLite database file (overrides the configured backend)
    #[arg(short, long, value_name = "FILE", env = "SSRM_DATABASE")]
    database: Option<PathBuf>,

    /// Table to query
    #[arg(short, long, value_name = "TABLE", env = "SSRM_TABLE")]
    table: Option<String>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Listen address
        #[arg(long)]
        host: Option<String>,
        /// Listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run one grid request and print the response
    Query {
        /// Request JSON, `@file`, or `-` for stdin
        request: String,
    },
    /// Print the SQL a grid request would run, without connecting
    Explain {
        /// Request JSON, `@file`, or `-` for stdin
        request: String,
        /// Identifier quote character
        #[arg(long)]
        quote: Option<char>,
    },
    /// Show columns and row count of the table
    Describe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::Config::load(cli.config.as_deref())?;

    let level = logging::level_for(cli.quiet, cli.verbose, &config.logging.level);
    logging::init_logging(&level, config.logging.format)?;

    info!("Starting SSRM v{}", env!("CARGO_PKG_VERSION"));

    let (host, port) = match &cli.command {
        Some(Commands::Serve { host, port }) => (host.clone(), *port),
        _ => (None, None),
    };
    config.apply(config::Overrides {
        database: cli.database,
        table: cli.table,
        host,
        port,
    });

    match cli.command {
        Some(Commands::Serve { .. }) | None => commands::serve(config).await,
        Some(Commands::Query { request }) => commands::query(config, &request).await,
        Some(Commands::Explain { request, quote }) => commands::explain(config, &request, quote),
        Some(Commands::Describe) => commands::describe(config).await,
    }
}
