pub mod core;
pub mod drivers;
