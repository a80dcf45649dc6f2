pub mod readings_event;
