//! # Taskboard Client CLI
//!
//! Logs in and follows the board live, printing every change as it arrives.
//!
//! ## Usage
//!
//! ```bash
//! TASKBOARD_EMAIL=ada@example.com TASKBOARD_PASSWORD=secret123 \
//!     cargo run -p taskboard-client -- watch
//! ```

use std::sync::Arc;
use taskboard_client::{
    api::HttpBoardApi,
    config::ClientConfig,
    session::{Session, SessionUpdate},
};
use taskboard_shared::models::Task;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taskboard_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "watch".to_string());
    if command != "watch" {
        anyhow::bail!("unknown command: {} (available: watch)", command);
    }

    let config = ClientConfig::from_env()?;
    let api = HttpBoardApi::login(
        &config.base_url,
        &config.email,
        &config.password,
        config.request_timeout,
    )
    .await?;

    let session = Arc::new(Session::new(Arc::new(api)).with_reconnect_delay(config.reconnect_delay));
    let mut updates = session.updates();
    let shutdown = CancellationToken::new();

    let runner = {
        let session = session.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { session.run(shutdown).await })
    };

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                }
                break;
            }
            update = updates.recv() => match update {
                Ok(SessionUpdate::Refreshed) => {
                    println!("--- board ---");
                    for task in session.tasks().await {
                        println!("{}", line(&task));
                    }
                }
                Ok(SessionUpdate::TaskChanged(id)) => {
                    if let Some(task) = session.task(id).await {
                        println!("~ {}", line(&task));
                    }
                }
                Ok(SessionUpdate::TaskRemoved(id)) => println!("- {}", id),
                Ok(SessionUpdate::ConflictOpened(id)) => println!("! conflict on {}", id),
                Ok(SessionUpdate::ActivityLogged(entry)) => {
                    println!("* {}", entry.entry.description);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Display fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Shutdown signal received, exiting...");
    shutdown.cancel();
    runner.await?;

    Ok(())
}

fn line(task: &Task) -> String {
    format!(
        "[{:<11}] {} ({}, v{})",
        task.status.as_str(),
        task.title,
        task.priority,
        task.version
    )
}
