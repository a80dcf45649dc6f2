//! Concrete sensor drivers and the registry that orders them.

use tracing::debug;

use crate::{
    externals::udev::UdevDevice,
    internals::core::ports::{DriverType, SensorDriver},
};

pub mod fake_compass;
pub mod fake_light;
pub mod hwmon_light;
pub mod iio_buffer;
pub mod iio_buffer_accel;
pub mod iio_buffer_compass;
pub mod iio_buffer_light;
pub mod iio_poll_accel;
pub mod iio_poll_compass;
pub mod iio_poll_light;
pub mod input_proximity;
pub mod polling;

pub use fake_compass::FAKE_COMPASS;
pub use fake_light::FAKE_LIGHT;
pub use hwmon_light::HWMON_LIGHT;
pub use iio_buffer_accel::IIO_BUFFER_ACCEL;
pub use iio_buffer_compass::IIO_BUFFER_COMPASS;
pub use iio_buffer_light::IIO_BUFFER_LIGHT;
pub use iio_poll_accel::IIO_POLL_ACCEL;
pub use iio_poll_compass::IIO_POLL_COMPASS;
pub use iio_poll_light::IIO_POLL_LIGHT;
pub use input_proximity::INPUT_PROXIMITY;

/// Udev property listing the sensor types a device provides.
pub const SENSOR_TYPE_PROPERTY: &str = "IIO_SENSOR_PROXY_TYPE";

/// Whether `device` was tagged by udev as providing `tag`. `name` is only
/// used for logging a match.
pub fn check_udev_sensor_type(device: &UdevDevice, tag: &str, name: Option<&str>) -> bool {
    let Some(types) = device.property(SENSOR_TYPE_PROPERTY) else {
        return false;
    };
    if !types.split_whitespace().any(|t| t == tag) {
        return false;
    }

    if let Some(name) = name {
        debug!("Found {} at {}", name, device.sysfs_path().display());
    }
    true
}

/// Which optional drivers take part in discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverConfig {
    pub fake_light: bool,
    pub fake_compass: bool,
}

/// Drivers for `driver_type` in the order they are tried.
pub fn drivers_for(
    driver_type: DriverType,
    config: &DriverConfig,
) -> Vec<&'static dyn SensorDriver> {
    let mut drivers: Vec<&'static dyn SensorDriver> = vec![];
    match driver_type {
        DriverType::Accel => {
            drivers.push(&IIO_POLL_ACCEL);
            drivers.push(&IIO_BUFFER_ACCEL);
        }
        DriverType::Light => {
            if config.fake_light {
                drivers.push(&FAKE_LIGHT);
            }
            drivers.push(&IIO_POLL_LIGHT);
            drivers.push(&HWMON_LIGHT);
            drivers.push(&IIO_BUFFER_LIGHT);
        }
        DriverType::Compass => {
            if config.fake_compass {
                drivers.push(&FAKE_COMPASS);
            }
            drivers.push(&IIO_BUFFER_COMPASS);
            drivers.push(&IIO_POLL_COMPASS);
        }
        DriverType::Proximity => drivers.push(&INPUT_PROXIMITY),
    }
    drivers
}

/// Subsystems worth enumerating for `driver_type`.
pub fn subsystems_for(driver_type: DriverType) -> &'static [&'static str] {
    match driver_type {
        DriverType::Accel | DriverType::Compass => &["iio", "input"],
        DriverType::Light => &["iio", "hwmon", "input"],
        DriverType::Proximity => &["input"],
    }
}
