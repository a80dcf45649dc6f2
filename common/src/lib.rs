//! Hardware independent pieces of the sensor proxy: reading models and the
//! decoders for the kernel formats the drivers consume.

pub mod calibration;
pub mod evdev;
pub mod iio;
pub mod readings;
