pub mod evdev;
pub mod event_logging;
pub mod scheduler;
pub mod sysfs;
pub mod udev;
