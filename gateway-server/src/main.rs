//! Gateway Server binary entrypoint: load configuration, validate it, bind
//! the HTTP listener and serve until interrupted.
//!
//! Exit codes: `0` success, `1` fatal startup error, `2` invalid
//! configuration, `64` missing required credential.

use clap::Parser;
use gateway_server::config::Config;
use gateway_server::create_server;
use std::net::SocketAddr;
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

enum StartupError {
    InvalidConfig(anyhow::Error),
    MissingCredential(String),
    Fatal(anyhow::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(StartupError::InvalidConfig(error)) => {
            eprintln!("invalid configuration: {error:#}");
            ExitCode::from(2)
        }
        Err(StartupError::MissingCredential(message)) => {
            eprintln!("missing required credential: {message}");
            ExitCode::from(64)
        }
        Err(StartupError::Fatal(error)) => {
            eprintln!("fatal startup error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let args = Args::parse();

    let config = Config::load(&args.config).map_err(StartupError::InvalidConfig)?;
    config.validate().map_err(StartupError::InvalidConfig)?;

    if config.service_key.is_none() {
        return Err(StartupError::MissingCredential(
            "SERVICE_KEY environment variable is not set".to_string(),
        ));
    }

    let filter = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (app, mcp) = create_server(&config).await.map_err(StartupError::Fatal)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|error| StartupError::Fatal(anyhow::anyhow!("invalid bind address: {error}")))?;
    tracing::info!(%addr, network = ?config.network, "starting gateway server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|error| StartupError::Fatal(error.into()))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| StartupError::Fatal(error.into()))?;

    mcp.close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received, draining in-flight requests");
}
