use std::fmt;

use tracing::{debug, info, instrument, warn};

use super::{
    location::{setup_accel_location, AccelLocation},
    ports::{DriverState, DriverType, ReadingsUpdateFunc, SensorDriver},
};
use crate::externals::udev::UdevDevice;

/// An opened device: the driver serving it and that driver's private state.
pub struct SensorDevice {
    driver: &'static dyn SensorDriver,
    name: String,
    state: Box<dyn DriverState>,
}

impl fmt::Debug for SensorDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorDevice")
            .field("driver", &self.driver.name())
            .field("name", &self.name)
            .field("polling", &self.state.is_polling())
            .finish()
    }
}

impl SensorDevice {
    pub fn driver(&self) -> &'static dyn SensorDriver {
        self.driver
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_polling(&self) -> bool {
        self.state.is_polling()
    }

    /// Start or stop delivering readings. Once this returns with `false` the
    /// callback will not be invoked again until polling is re-enabled.
    pub fn set_polling(&mut self, state: bool) {
        debug!(
            "Setting polling of '{}' ({}) to {}",
            self.name,
            self.driver.name(),
            state
        );
        self.state.set_polling(state);
    }

    /// Stop polling and release the device.
    pub fn close(mut self) {
        self.set_polling(false);
        info!("Closed '{}' ({})", self.name, self.driver.name());
    }
}

/// Whether `driver` should handle `device`. Accelerometers that are not in
/// the display are rejected, and so are ones whose location can't be worked
/// out.
pub fn driver_discover(driver: &dyn SensorDriver, device: &UdevDevice) -> bool {
    if !driver.discover(device) {
        return false;
    }
    if driver.driver_type() != DriverType::Accel {
        return true;
    }

    match setup_accel_location(device) {
        Some(AccelLocation::Display) => true,
        Some(location) => {
            debug!(
                "Ignoring accelerometer {} located in the {}",
                device.name(),
                location
            );
            false
        }
        None => false,
    }
}

/// Open `device` with `driver`. Failures are logged and yield `None`.
#[instrument(skip_all, fields(driver = driver.name(), device = device.name()))]
pub fn driver_open(
    driver: &'static dyn SensorDriver,
    device: &UdevDevice,
    callback: ReadingsUpdateFunc,
) -> Option<SensorDevice> {
    match driver.open(device, callback) {
        Ok(state) => {
            info!("Opened {} as {}", device.display_name(), driver.driver_type());
            Some(SensorDevice {
                driver,
                name: device.display_name(),
                state,
            })
        }
        Err(e) => {
            warn!("Failed to open {}: {}", device.sysfs_path().display(), e);
            debug!("{:?}", e);
            None
        }
    }
}

pub fn driver_set_polling(device: &mut SensorDevice, state: bool) {
    device.set_polling(state);
}

pub fn driver_close(device: SensorDevice) {
    device.close();
}

/// First driver out of `drivers` that accepts `device`.
pub fn find_driver(
    drivers: &[&'static dyn SensorDriver],
    device: &UdevDevice,
) -> Option<&'static dyn SensorDriver> {
    drivers
        .iter()
        .copied()
        .find(|driver| driver_discover(*driver, device))
}
