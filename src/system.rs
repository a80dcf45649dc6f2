use tokio::sync::broadcast::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    externals::{event_logging::adapters::emit_to_broadcast, udev::UdevClient},
    internals::{
        core::{
            ports::DriverType,
            system::{driver_close, driver_open, find_driver, SensorDevice},
        },
        drivers::{drivers_for, subsystems_for, DriverConfig},
    },
    models::readings_event::ReadingsEvent,
};

pub const DRIVER_TYPES: [DriverType; 4] = [
    DriverType::Accel,
    DriverType::Light,
    DriverType::Compass,
    DriverType::Proximity,
];

/// Find a device of class `driver_type` and open it with the first driver
/// that accepts it. Readings are broadcast on `tx_readings`.
#[instrument(skip_all, fields(driver_type = %driver_type))]
pub fn open_sensor(
    client: &UdevClient,
    driver_type: DriverType,
    config: &DriverConfig,
    tx_readings: &Sender<ReadingsEvent>,
) -> Option<SensorDevice> {
    let drivers = drivers_for(driver_type, config);
    for subsystem in subsystems_for(driver_type) {
        for device in client.query_by_subsystem(subsystem) {
            let Some(driver) = find_driver(&drivers, &device) else {
                continue;
            };
            debug!("{} accepts {}", driver.name(), device.sysfs_path().display());

            let callback = emit_to_broadcast(device.display_name(), tx_readings.clone());
            if let Some(sensor) = driver_open(driver, &device, callback) {
                return Some(sensor);
            }
        }
    }
    None
}

/// Task: open one sensor of every class and keep them polling until
/// cancelled. Must run on a `LocalSet`.
#[tracing::instrument(skip_all)]
pub async fn task_sensor_system(
    token: CancellationToken,
    client: UdevClient,
    config: DriverConfig,
    tx_readings: Sender<ReadingsEvent>,
) {
    info!("Started.");

    let mut sensors: Vec<SensorDevice> = DRIVER_TYPES
        .iter()
        .filter_map(|driver_type| {
            let sensor = open_sensor(&client, *driver_type, &config, &tx_readings);
            if sensor.is_none() {
                info!("No {} found.", driver_type);
            }
            sensor
        })
        .collect();
    if sensors.is_empty() {
        warn!("No sensors found under {}.", client.sysfs_root().display());
    }

    for sensor in sensors.iter_mut() {
        sensor.set_polling(true);
    }

    token.cancelled().await;
    warn!("Cancelled.");

    for sensor in sensors {
        driver_close(sensor);
    }
}
