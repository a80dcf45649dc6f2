use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::readings_event::ReadingsEvent;

#[tracing::instrument(skip_all)]
pub async fn task_readings_logging(
    token: CancellationToken,
    mut rx_readings: Receiver<ReadingsEvent>,
) {
    info!("Started.");
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            res = rx_readings.recv() => {
                match res {
                    Ok(event) => info!("Got readings: {}", event),
                    Err(RecvError::Lagged(skipped)) => warn!("Skipped {} readings.", skipped),
                    Err(RecvError::Closed) => {
                        info!("Readings channel closed.");
                        break;
                    }
                }
            }
        };
    }
}
