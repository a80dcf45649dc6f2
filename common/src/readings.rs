use core::fmt::Display;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Per-axis scale that turns raw accelerometer counts into m/s².
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct AccelScale {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelScale {
    /// Use the same scale for all three axes.
    pub fn uniform(scale: f64) -> Self {
        Self {
            x: scale,
            y: scale,
            z: scale,
        }
    }
}

impl Default for AccelScale {
    fn default() -> Self {
        Self::uniform(1f64)
    }
}

/// Raw accelerometer sample along with the scale needed to interpret it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct AccelReadings {
    pub accel_x: i32,
    pub accel_y: i32,
    pub accel_z: i32,
    pub scale: AccelScale,
}

/// Ambient light level.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct LightReadings {
    pub level: f64,

    /// `true` when `level` is in lux, `false` when it is a percentage of
    /// the sensor's range.
    pub uses_lux: bool,
}

/// Compass heading in degrees.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CompassReadings {
    pub heading: f64,
}

/// State of a proximity switch.
#[derive(Debug, Display, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ProximityNear {
    /// The state could not be determined.
    #[display(fmt = "error")]
    Error,

    /// Nothing is close to the front of the device.
    #[display(fmt = "far")]
    Far,

    /// Something is close to the front of the device.
    #[display(fmt = "near")]
    Near,
}

impl From<bool> for ProximityNear {
    fn from(value: bool) -> Self {
        match value {
            true => Self::Near,
            false => Self::Far,
        }
    }
}

impl From<Option<bool>> for ProximityNear {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(near) => near.into(),
            None => Self::Error,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct ProximityReadings {
    pub is_near: ProximityNear,
}

/// A single update pushed to a driver's readings callback. Built fresh for
/// every invocation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum Readings {
    Accel(AccelReadings),
    Light(LightReadings),
    Compass(CompassReadings),
    Proximity(ProximityReadings),
}

impl Display for Readings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Accel(r) => write!(
                f,
                "<Accel: x={} y={} z={} scale=({}, {}, {})>",
                r.accel_x, r.accel_y, r.accel_z, r.scale.x, r.scale.y, r.scale.z
            ),
            Self::Light(r) => write!(
                f,
                "<Light: {} {}>",
                r.level,
                if r.uses_lux { "lux" } else { "%" }
            ),
            Self::Compass(r) => write!(f, "<Compass: {} deg>", r.heading),
            Self::Proximity(r) => write!(f, "<Proximity: {}>", r.is_near),
        }
    }
}

impl From<AccelReadings> for Readings {
    fn from(value: AccelReadings) -> Self {
        Self::Accel(value)
    }
}

impl From<LightReadings> for Readings {
    fn from(value: LightReadings) -> Self {
        Self::Light(value)
    }
}

impl From<CompassReadings> for Readings {
    fn from(value: CompassReadings) -> Self {
        Self::Compass(value)
    }
}

impl From<ProximityReadings> for Readings {
    fn from(value: ProximityReadings) -> Self {
        Self::Proximity(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proximity_from_switch_state() {
        assert_eq!(ProximityNear::from(true), ProximityNear::Near);
        assert_eq!(ProximityNear::from(false), ProximityNear::Far);
        assert_eq!(ProximityNear::from(None), ProximityNear::Error);
    }

    #[test]
    fn test_display() {
        let light: Readings = LightReadings {
            level: 5f64,
            uses_lux: true,
        }
        .into();
        assert_eq!(format!("{}", light), "<Light: 5 lux>");

        let proximity: Readings = ProximityReadings {
            is_near: ProximityNear::Near,
        }
        .into();
        assert_eq!(format!("{}", proximity), "<Proximity: near>");
    }
}
