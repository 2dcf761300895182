// src/main.rs

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use chain_agent_mcp::{
    api,
    blockchain::{aggregator::HttpAggregator, aggregator::SwapAggregator, EvmLedger},
    config::Config,
    mcp::{
        handler::handle_mcp_request,
        protocol::{error_codes, Request, Response},
    },
    AppState,
};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- HTTP Server Logic ---
async fn run_http_server(state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], state.config.port));
    let app = api::router(state);

    info!("🚀 HTTP Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("HTTP server stopped unexpectedly")
}

// --- MCP Server Logic ---
async fn run_mcp_server(state: AppState) {
    info!("🚀 Starting MCP server on stdin/stdout...");

    let mut stdin = io::BufReader::new(io::stdin());
    let mut stdout = io::stdout();

    loop {
        let mut line = String::new();

        match stdin.read_line(&mut line).await {
            Ok(0) => {
                info!("EOF received, shutting down MCP server");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                debug!("Received: {}", line);

                let response = match serde_json::from_str::<Request>(line) {
                    Ok(request) => handle_mcp_request(request, state.clone()).await,
                    Err(parse_error) => {
                        error!("JSON parse error: {}", parse_error);
                        Some(Response::error(
                            serde_json::Value::Null,
                            error_codes::PARSE_ERROR,
                            format!("Parse error: {}", parse_error),
                        ))
                    }
                };

                if let Some(response) = response {
                    if let Ok(response_json) = serde_json::to_string(&response) {
                        debug!("Sending: {}", response_json);
                        let written = async {
                            stdout
                                .write_all(format!("{}\n", response_json).as_bytes())
                                .await?;
                            stdout.flush().await
                        }
                        .await;
                        if let Err(e) = written {
                            error!("Failed to write response: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        }
    }

    info!("MCP server shutting down");
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries the stdio transport.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chain_agent_mcp=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let ledger = match EvmLedger::connect(&config).await {
        Ok(ledger) => ledger,
        Err(e) => {
            error!("❌ Failed to connect to the ledger: {:#}", e);
            std::process::exit(1);
        }
    };

    let aggregator = config.aggregator_base_url.as_ref().map(|url| {
        Arc::new(HttpAggregator::new(url.clone(), config.aggregator_api_key.clone()))
            as Arc<dyn SwapAggregator>
    });
    if aggregator.is_none() {
        info!("AGGREGATOR_BASE_URL not set; swap and quote tools will report UNCONFIGURED");
    }

    let mcp_mode = config.mcp_mode || env::args().any(|a| a == "--mcp");
    let app_state = AppState::new(config, Arc::new(ledger), aggregator);

    if mcp_mode {
        run_mcp_server(app_state).await;
    } else if let Err(e) = run_http_server(app_state).await {
        error!("❌ {:#}", e);
        std::process::exit(1);
    }
}
