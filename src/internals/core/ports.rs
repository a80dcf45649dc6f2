use std::{io, path::PathBuf, rc::Rc};

use common::{
    evdev::BitmaskError,
    iio::{ChannelLayoutError, ChannelTypeError},
    readings::Readings,
};
use derive_more::Display;
use serde::Serialize;
use thiserror::Error;

use crate::externals::{sysfs::SysfsError, udev::UdevDevice};

/// Sensor class a driver serves.
#[derive(Debug, Display, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverType {
    #[display(fmt = "accelerometer")]
    Accel,
    #[display(fmt = "ambient light sensor")]
    Light,
    #[display(fmt = "compass")]
    Compass,
    #[display(fmt = "proximity sensor")]
    Proximity,
}

/// Invoked with every new reading of an opened device. Whatever context
/// the consumer needs is captured by the closure.
pub type ReadingsUpdateFunc = Rc<dyn Fn(&'static dyn SensorDriver, &Readings)>;

/// A family of sensor devices the daemon knows how to read.
pub trait SensorDriver: Sync {
    /// Human readable driver name.
    fn name(&self) -> &'static str;

    fn driver_type(&self) -> DriverType;

    /// Whether this driver can handle `device`. Must not open the device.
    fn discover(&self, device: &UdevDevice) -> bool;

    /// Acquire `device`. Readings are not delivered until polling is
    /// enabled on the returned state.
    fn open(
        &self,
        device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError>;
}

/// Per-device state of an opened driver. Resources are released when it is
/// dropped.
pub trait DriverState {
    /// Start or stop delivering readings. Idempotent: repeated calls with the
    /// same value leave exactly one or zero active sources.
    fn set_polling(&mut self, state: bool);

    fn is_polling(&self) -> bool;
}

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Device has no device file.")]
    NoDeviceFile,

    #[error("Failed to open '{0}'.")]
    FailedToOpen(PathBuf, #[source] io::Error),

    #[error("Could not find trigger name associated with {0}.")]
    TriggerNotFound(String),

    #[error("Failed to query switch state.")]
    FailedToQuerySwitches(#[source] io::Error),

    #[error("Invalid switch capabilities.")]
    Capabilities(#[from] BitmaskError),

    #[error("Sysfs access failed.")]
    Sysfs(#[from] SysfsError),

    #[error("Invalid type for channel '{0}'.")]
    ChannelType(String, #[source] ChannelTypeError),

    #[error("Invalid channel layout.")]
    ChannelLayout(#[from] ChannelLayoutError),

    /// A channel the driver needs is not available on the device.
    #[error("Device has no '{0}' channel.")]
    MissingChannel(String),
}
