//! Sessionkeeper CLI and status API entry point.
//!
//! Binary name: `skeeper`
//!
//! Parses CLI arguments, initializes the database and session store,
//! then dispatches to the appropriate command handler or starts the
//! status server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use sessionkeeper_types::session::SessionId;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,sessionkeeper=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Shell completions and remote probes don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "skeeper", &mut std::io::stdout());
        return Ok(());
    }
    if let Commands::Health { url } = &cli.command {
        return cli::session::health(url, cli.json).await;
    }

    // Initialize application state (DB, store)
    let state = AppState::init().await?;

    match cli.command {
        Commands::Backup { session } => {
            cli::session::backup(&state, session, cli.json).await?;
        }

        Commands::Restore { session } => {
            cli::session::restore(&state, session, cli.json).await?;
        }

        Commands::Exists { session } => {
            cli::session::exists(&state, session, cli.json).await?;
        }

        Commands::Cleanup => {
            cli::session::cleanup(&state, cli.json).await?;
        }

        Commands::Serve {
            port,
            host,
            session,
        } => {
            let id = SessionId::normalize(session.as_deref());
            state
                .store
                .start_periodic_backup(id.clone(), state.config.backup_interval());

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} Sessionkeeper listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!(
                "  {} Backing up '{}' every {}s",
                console::style("💾").bold(),
                console::style(id.as_str()).cyan(),
                state.config.backup_interval_secs
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let store = state.store.clone();
            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            // One last backup on the way out, so a clean shutdown never
            // loses session changes made since the previous tick.
            store.stop_periodic_backup();
            if store.save(&id).await {
                println!("\n  Final backup taken. Server stopped.");
            } else {
                println!("\n  Server stopped (final backup skipped, nothing to save).");
            }
        }

        Commands::Health { .. } | Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
