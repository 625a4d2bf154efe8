use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::watch;

use notabot::core::clock::MinuteClock;
use notabot::{
    Config, ConversationEngine, InboundEvent, MessagingGateway, NoteStore, ReminderDispatcher,
    StdioGateway,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting note bot...");
    if config.gateway_token.is_none() {
        warn!("GATEWAY_TOKEN is not set - the messaging transport may refuse to authenticate");
    }

    // Open the store up front: a corrupt file aborts startup here instead
    // of silently losing data later
    let store = Arc::new(NoteStore::open(&config.database_path).await.map_err(|e| {
        error!("Failed to open note store at {}: {e:#}", config.database_path);
        e
    })?);
    info!("Note store ready at {}", config.database_path);

    let gateway: Arc<dyn MessagingGateway> = Arc::new(StdioGateway::new());
    let engine = Arc::new(ConversationEngine::new(store.clone()));

    // Start the reminder dispatcher
    let dispatcher = ReminderDispatcher::new(
        store,
        gateway.clone(),
        MinuteClock::with_offset(config.utc_offset),
    )
    .with_tick_interval(Duration::from_secs(config.tick_interval_secs))
    .with_send_timeout(Duration::from_secs(config.send_timeout_secs));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown_rx));

    info!("Listening for gateway events on stdin");

    // Inbound event loop: one line-delimited JSON event per line. Each
    // event is handled on its own task so a slow reply to one user never
    // delays another.
    let event_loop = async {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let event: InboundEvent = match serde_json::from_str(line) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("ignoring malformed gateway event: {e}");
                            continue;
                        }
                    };

                    let engine = engine.clone();
                    let gateway = gateway.clone();
                    tokio::spawn(async move {
                        match engine.handle_message(&event.user_id, &event.text).await {
                            Ok(Some(reply)) => {
                                if let Err(e) = gateway.send(&event.user_id, &reply).await {
                                    error!(
                                        "failed to send reply to user {}: {e:#}",
                                        event.user_id
                                    );
                                }
                            }
                            Ok(None) => {}
                            Err(e) => error!(
                                "conversation turn failed for user {}: {e:#}",
                                event.user_id
                            ),
                        }
                    });
                }
                Ok(None) => {
                    info!("gateway input closed");
                    break;
                }
                Err(e) => {
                    error!("reading gateway input failed: {e}");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = event_loop => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    // Let the dispatcher finish any tick in flight before exiting
    let _ = shutdown_tx.send(true);
    if let Err(e) = dispatcher_task.await {
        error!("reminder dispatcher task failed: {e}");
    }

    info!("note bot stopped");
    Ok(())
}
