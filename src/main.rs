use anyhow::{Context, Result};
use sensor_proxy::{
    config::Config, externals::event_logging::task::task_readings_logging,
    system::task_sensor_system,
};
use tokio::{signal, sync::broadcast, task::LocalSet};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_max_level(config.max_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Drivers share state with their sources through Rc, everything runs on
    // this one thread.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    LocalSet::new().block_on(&runtime, run(config))
}

async fn run(config: Config) -> Result<()> {
    info!("Using {:?}", config);
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    let (tx_readings, rx_readings) = broadcast::channel(32);

    let token_clone = token.clone();
    tracker.spawn_local(async move { task_readings_logging(token_clone, rx_readings).await });

    let token_clone = token.clone();
    let client = config.udev_client();
    let driver_config = config.drivers;
    tracker.spawn_local(async move {
        task_sensor_system(token_clone, client, driver_config, tx_readings).await
    });

    let token_clone = token.clone();

    tokio::select! {
        _ = token_clone.cancelled() => {}
        res = signal::ctrl_c() => {
            match res {
                Ok(_) => {
                    token.cancel();
                },
                Err(e) => {
                    tracing::error!("Failed to listen for ctrl_c. Error: {}", e);
                    token.cancel();
                }
            };
        },
    }

    tracker.close();
    tracker.wait().await;

    Ok(())
}
