pub mod location;
pub mod ports;
pub mod system;
