//! Sensor hardware abstraction for Linux.
//!
//! Accelerometers, ambient light sensors, compasses and proximity switches
//! exposed through IIO, hwmon or evdev are discovered, opened and polled
//! through a common driver interface. Readings are delivered to a callback
//! in physical units.

pub mod config;
pub mod externals;
pub mod internals;
pub mod models;
pub mod system;
