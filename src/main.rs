/*!
Standalone runner for the last-updated course module log store
*/

use std::path::PathBuf;
use std::time::Duration;

use clap::{Arg, ArgAction, Command};
use tokio::io::BufReader;
use tokio_stream::StreamExt;
use tracing::{error, info};

use logstore_lastupdated::core::{
    cleanup_task::CleanupTask,
    config::StoreConfig,
    event_system::EventFeed,
    store::Store,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let matches = Command::new("logstore-lastupdated")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Records the last time each course module was created or updated")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to a TOML configuration file")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("db-path")
                .short('p')
                .long("db-path")
                .help("Override the log store database path")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("loglifetime")
                .short('l')
                .long("loglifetime")
                .help("Override record lifetime in days (0 keeps records forever)")
                .value_name("DAYS"),
        )
        .arg(
            Arg::new("disabled")
                .long("disabled")
                .help("Accept events but record nothing")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => StoreConfig::from_file(path).await?,
        None => StoreConfig::default(),
    };

    if let Some(path) = matches.get_one::<String>("db-path") {
        config.store.db_path = PathBuf::from(path);
    }
    if let Some(days) = matches.get_one::<String>("loglifetime") {
        config.retention.loglifetime_days = days.parse()?;
    }
    if matches.get_flag("disabled") {
        config.store.enabled = false;
    }

    if let Some(parent) = config.store.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let store = Store::new(config.clone()).await?;
    let cleanup = CleanupTask::new(&config.retention);

    info!("Log store database: {:?}", config.store.db_path);
    info!(
        "Retention: {} day(s), swept every {}s",
        config.retention.loglifetime_days, config.retention.sweep_interval_secs
    );

    // Events arrive as JSON lines on stdin, one per committed host event.
    let feed = EventFeed::new(BufReader::new(tokio::io::stdin()));
    let mut events = Box::pin(feed.into_stream());

    // The first tick fires immediately, doubling as the startup sweep.
    let mut sweep = tokio::time::interval(Duration::from_secs(
        config.retention.sweep_interval_secs.max(1),
    ));

    loop {
        tokio::select! {
            maybe_event = events.next() => {
                match maybe_event {
                    Some(event) => {
                        if let Err(e) = store.handle(&event).await {
                            error!("Error handling event: {}", e);
                        }
                    }
                    None => {
                        info!("Event feed closed");
                        break;
                    }
                }
            }
            _ = sweep.tick() => {
                if let Err(e) = cleanup.execute(store.records()).await {
                    error!("Cleanup task failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown");
                break;
            }
        }
    }

    Ok(())
}
