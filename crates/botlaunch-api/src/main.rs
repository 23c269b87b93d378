//! Botlaunch REST API entry point.
//!
//! Binary name: `botlaunch`
//!
//! Parses CLI arguments, initializes the application state, and starts the
//! publish/provision service.

mod http;
mod state;

use clap::{Parser, Subcommand};

use state::AppState;

#[derive(Parser)]
#[command(name = "botlaunch", version, about = "Bot publish and provision service")]
struct Cli {
    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Export spans via OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server.
    Serve {
        /// Override the configured bind address.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directive = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "info,botlaunch=debug",
        _ => "trace",
    };
    botlaunch_observe::init_tracing(directive, cli.otel)
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let state = AppState::init().await?;

    match cli.command {
        Commands::Serve { bind } => {
            let addr = bind.unwrap_or_else(|| state.config.bind_addr.clone());
            let router = http::router::build_router(state);

            tracing::info!(addr = addr.as_str(), "starting publish service");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, router).await?;
        }
    }

    botlaunch_observe::shutdown_tracing();
    Ok(())
}
