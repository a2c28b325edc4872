// Amigo Secreto entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Build the participant repository and insight client
// 4. Create mpsc channels
// 5. Spawn app logic task
// 6. Run the TUI until the user quits
// 7. Cleanup on exit

use std::sync::Arc;

use amigo_core::config;
use amigo_core::store::ParticipantRepository;
use amigo_llm::InsightClient;
use amigo_tui::{app, tui};

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Amigo Secreto starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        backend = ?config.store.backend,
        naming = ?config.store.primary_naming,
        "Config loaded"
    );

    let repository = ParticipantRepository::from_config(&config);
    if repository.is_active() {
        info!("Participant store configured");
    } else {
        warn!("Participant store not configured; the participant list will be empty");
    }

    let insight_client = InsightClient::from_config(&config);
    match &insight_client {
        InsightClient::Active(_) => info!("Insight client initialized (API key configured)"),
        InsightClient::Disabled => info!("Insight client disabled (no API key)"),
    }

    let (insight_tx, insight_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let app_state = app::AppState::new(repository, Arc::new(insight_client), insight_tx);

    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(cmd_rx, insight_rx, ui_tx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    // Blocks until the user quits.
    if let Err(e) = tui::run(ui_rx, cmd_tx).await {
        error!("TUI error: {}", e);
    }

    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("Amigo Secreto shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (the terminal belongs to the TUI).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("amigo-secreto.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("amigo=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
