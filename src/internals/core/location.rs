use std::str::FromStr;

use derive_more::Display;
use thiserror::Error;
use tracing::{debug, warn};

use crate::externals::udev::UdevDevice;

pub const ACCEL_LOCATION_PROPERTY: &str = "ACCEL_LOCATION";

/// Where an accelerometer is mounted on a convertible device.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum AccelLocation {
    #[display(fmt = "display")]
    Display,
    #[display(fmt = "base")]
    Base,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown accelerometer location '{0}'.")]
pub struct AccelLocationError(String);

impl FromStr for AccelLocation {
    type Err = AccelLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "display" => Ok(Self::Display),
            "base" => Ok(Self::Base),
            other => Err(AccelLocationError(other.to_string())),
        }
    }
}

/// Work out where an accelerometer is mounted.
///
/// The udev `ACCEL_LOCATION` property wins. Otherwise the sysfs `label`
/// attribute is used (`accel-display` or `accel-base`), and failing both the
/// sensor is assumed to be in the display. Returns `None` when the property
/// is present but malformed and no label resolves it.
pub fn setup_accel_location(device: &UdevDevice) -> Option<AccelLocation> {
    let mut malformed = false;
    if let Some(location) = device.property(ACCEL_LOCATION_PROPERTY) {
        match location.parse() {
            Ok(location) => return Some(location),
            Err(e) => {
                warn!("Failed to parse {} from udev: {}", ACCEL_LOCATION_PROPERTY, e);
                malformed = true;
            }
        }
    }

    match device.sysfs_attr("label").as_deref() {
        Some("accel-display") => return Some(AccelLocation::Display),
        Some("accel-base") => return Some(AccelLocation::Base),
        Some(label) => debug!("Ignoring label '{}' of {}", label, device.name()),
        None => {}
    }

    if malformed {
        None
    } else {
        Some(AccelLocation::Display)
    }
}
