//! Threadline CLI and REST API entry point.
//!
//! Binary name: `tline`
//!
//! Parses CLI arguments, initializes tracing, the database and the shared
//! bus, then dispatches to the chat loop, a history command, or the HTTP
//! server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use secrecy::SecretString;

use cli::{Cli, Commands};
use state::AppState;
use threadline_observe::{init_tracing, shutdown_tracing, verbosity_filter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(verbosity_filter(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "tline", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;

    match cli.command {
        Commands::Chat {
            model,
            api_key,
            listen,
        } => {
            let credential = SecretString::from(api_key);
            cli::chat::loop_runner::run_chat_loop(&state, model, credential, listen).await?;
        }

        Commands::History => cli::history::show_history(&state, cli.json).await?,

        Commands::Clear => cli::history::clear_history(&state, cli.json).await?,

        Commands::Serve { listen } => {
            if !cli.quiet {
                println!(
                    "  {} Threadline API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{listen}")).cyan()
                );
            }
            http::router::serve(state, &listen, shutdown_signal()).await?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
///
/// If a handler cannot be installed, that signal is simply never awaited.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
