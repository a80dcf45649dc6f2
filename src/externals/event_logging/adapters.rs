use std::rc::Rc;

use common::readings::Readings;
use tokio::sync::broadcast::Sender;
use tracing::{debug, trace};

use crate::{
    internals::core::ports::{ReadingsUpdateFunc, SensorDriver},
    models::readings_event::ReadingsEvent,
};

/// Build a readings callback for `device` that broadcasts every reading.
pub fn emit_to_broadcast(device: String, tx_readings: Sender<ReadingsEvent>) -> ReadingsUpdateFunc {
    Rc::new(move |driver: &'static dyn SensorDriver, readings: &Readings| {
        let event = ReadingsEvent {
            driver: driver.name(),
            driver_type: driver.driver_type(),
            device: device.clone(),
            readings: *readings,
        };
        match tx_readings.send(event) {
            Ok(receivers) => trace!("Sent readings to {} receivers.", receivers),
            Err(e) => debug!("No receivers for readings. Error: {}", e),
        }
    })
}
