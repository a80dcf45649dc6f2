use core::fmt::Display;

use common::readings::Readings;
use serde::Serialize;

use crate::internals::core::ports::DriverType;

/// A reading together with where it came from, as broadcast to the
/// consumers of the daemon.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ReadingsEvent {
    pub driver: &'static str,
    pub driver_type: DriverType,
    pub device: String,
    pub readings: Readings,
}

impl Display for ReadingsEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{} '{}' ({}): {}",
            self.driver_type, self.device, self.driver, self.readings
        )
    }
}
