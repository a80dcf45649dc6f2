pub mod adapters;
pub mod task;
