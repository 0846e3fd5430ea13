pub mod channels;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod datalog_writer;
pub mod error;
pub mod options;
pub mod prelude;
pub mod scheduler;
pub mod swr;
pub mod transport;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::transport::Endpoint;

/// Wires the components together and runs the poller until shutdown.
///
/// A persistence failure here, before anything has been polled, is
/// unrecoverable: without the store not even comments can be recorded.
pub async fn app(config: Config, channels: Channels) -> Result<()> {
    info!("sunnyboy-bridge {} starting", CARGO_PKG_VERSION);

    info!("  Creating Database...");
    let database = Database::new(config.database().clone(), channels.clone());

    info!("  Creating Transport...");
    let datalog = match config.frame_log() {
        Some(dir) => Some(DatalogWriter::new(dir)?),
        None => None,
    };
    let transport = Transport::new(Endpoint::parse(config.device()), datalog);

    info!("  Creating Coordinator...");
    let coordinator = Coordinator::new(config.clone(), channels.clone(), transport);

    info!("  Creating Scheduler...");
    let scheduler = Scheduler::new(config.clone(), channels.clone());

    info!("Starting database...");
    database.prepare().await?;
    database
        .append_comment(&database::CommentRow::new(
            None,
            format!(
                "sunnyboy-bridge {} started on {}",
                CARGO_PKG_VERSION,
                config.device()
            ),
        ))
        .await?;

    let database_task = tokio::spawn({
        let database = database.clone();
        async move {
            if let Err(e) = database.start().await {
                error!("database error: {:#}", e);
            }
        }
    });

    info!("Starting scheduler...");
    let result = scheduler.start(coordinator).await;

    info!("Stopping components...");
    database.stop();
    let _ = database_task.await;
    info!("Shutdown complete");

    result
}
