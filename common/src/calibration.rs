use core::f64::consts::PI;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw three axis magnetometer sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagnetometerSample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Observed extrema of each magnetometer axis. Treated as a constant
/// snapshot for the lifetime of a device.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationData {
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
    pub z_min: i32,
    pub z_max: i32,
    pub is_calibrated: bool,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// An axis has `min == max`, its scale would be infinite.
    #[error("Calibration range of the {0} axis is empty.")]
    DegenerateRange(char),
}

/// Sample with hard iron offset removed and soft iron scale applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Outcome of a heading computation. `fallback` is set when calibration was
/// requested but could not be applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heading {
    pub degrees: f64,
    pub fallback: Option<CalibrationError>,
}

struct AxisCorrection {
    offset: f64,
    half_range: f64,
}

impl AxisCorrection {
    fn new(min: i32, max: i32) -> Self {
        Self {
            offset: (min as f64 + max as f64) / 2f64,
            half_range: (max as f64 - min as f64) / 2f64,
        }
    }
}

impl CalibrationData {
    /// Extrema measured on the reference magnetometer. Used until a
    /// calibration store exists.
    pub const REFERENCE: CalibrationData = CalibrationData {
        x_min: -7912,
        x_max: -1648,
        y_min: -6554,
        y_max: -528,
        z_min: -3074,
        z_max: 2720,
        is_calibrated: true,
    };

    /// Remove the per-axis offset and equalize the per-axis ranges.
    pub fn correct(&self, raw: MagnetometerSample) -> Result<CorrectedSample, CalibrationError> {
        let axes = [
            ('x', AxisCorrection::new(self.x_min, self.x_max)),
            ('y', AxisCorrection::new(self.y_min, self.y_max)),
            ('z', AxisCorrection::new(self.z_min, self.z_max)),
        ];
        if let Some((axis, _)) = axes.iter().find(|(_, c)| c.half_range == 0f64) {
            return Err(CalibrationError::DegenerateRange(*axis));
        }

        let avg_half_range = axes.iter().map(|(_, c)| c.half_range).sum::<f64>() / 3f64;
        let [(_, cx), (_, cy), (_, cz)] = axes;
        let apply = |value: i32, c: &AxisCorrection| {
            (value as f64 - c.offset) * (avg_half_range / c.half_range)
        };

        Ok(CorrectedSample {
            x: apply(raw.x, &cx),
            y: apply(raw.y, &cy),
            z: apply(raw.z, &cz),
        })
    }
}

fn heading_degrees(x: f64, y: f64) -> f64 {
    let degrees = x.atan2(y) * 180f64 / PI;
    if degrees.is_finite() {
        degrees
    } else {
        0f64
    }
}

/// Compute the heading of a magnetometer sample.
///
/// Only X and Y contribute: the heading is planar and no tilt compensation
/// is applied. A degenerate calibration falls back to the raw sample.
pub fn compute_heading(raw: MagnetometerSample, calibration: &CalibrationData) -> Heading {
    if !calibration.is_calibrated {
        return Heading {
            degrees: heading_degrees(raw.x as f64, raw.y as f64),
            fallback: None,
        };
    }

    match calibration.correct(raw) {
        Ok(corrected) => Heading {
            degrees: heading_degrees(corrected.x, corrected.y),
            fallback: None,
        },
        Err(e) => Heading {
            degrees: heading_degrees(raw.x as f64, raw.y as f64),
            fallback: Some(e),
        },
    }
}
