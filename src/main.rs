use anyhow::Result;
use log::{error, info};
use std::io::Write;

use sunnyboy_bridge::prelude::*;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    let config = Config::new(&options).unwrap_or_else(|err| {
        // no logging available yet, so eprintln! will have to do
        eprintln!("Error: {:?}", err);
        std::process::exit(1);
    });

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.loglevel()))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();

    info!(
        "sunnyboy-bridge {} polling {}",
        CARGO_PKG_VERSION,
        config.device()
    );

    if let Some(path) = &options.pid_file {
        std::fs::write(path, format!("{}\n", std::process::id()))?;
    }

    let channels = Channels::new();

    // Ctrl+C flips the scheduler's shutdown flag; an in-flight cycle is
    // allowed to complete or to fail via timeout.
    let shutdown_tx = channels.to_scheduler.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Ctrl+C received, initiating shutdown");
        if let Err(e) = shutdown_tx.send(scheduler::ChannelData::Shutdown) {
            error!("failed to send shutdown signal: {}", e);
        }
    });

    let result = sunnyboy_bridge::app(config, channels).await;

    if let Some(path) = &options.pid_file {
        let _ = std::fs::remove_file(path);
    }

    result
}
