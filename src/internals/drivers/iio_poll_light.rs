use std::path::PathBuf;

use common::readings::{LightReadings, Readings};
use tracing::{debug, warn};

use super::{check_udev_sensor_type, polling::TimerDevice};
use crate::{
    externals::{
        scheduler::DEFAULT_POLL_INTERVAL,
        sysfs::{fixup_sampling_frequency, read_attr_as},
        udev::UdevDevice,
    },
    internals::core::ports::{
        DriverError, DriverState, DriverType, ReadingsUpdateFunc, SensorDriver,
    },
};

pub struct IioPollLight;

pub static IIO_POLL_LIGHT: IioPollLight = IioPollLight;

struct DrvData {
    name: String,
    input_path: PathBuf,
    scale: f64,
    callback: ReadingsUpdateFunc,
}

fn light_changed(data: &DrvData) {
    let raw: f64 = match read_attr_as(&data.input_path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to read light level of '{}': {}", data.name, e);
            return;
        }
    };
    let readings = LightReadings {
        level: raw * data.scale,
        uses_lux: true,
    };
    debug!("Light read from '{}': {} lux", data.name, readings.level);
    (data.callback)(&IIO_POLL_LIGHT, &Readings::from(readings));
}

impl SensorDriver for IioPollLight {
    fn name(&self) -> &'static str {
        "IIO Polling Light sensor"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Light
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        check_udev_sensor_type(device, "iio-poll-als", Some(self.name()))
    }

    /// Prefers the processed `in_illuminance_input`, falling back to
    /// `in_illuminance_raw` times `in_illuminance_scale`.
    fn open(
        &self,
        device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        fixup_sampling_frequency(device);

        let input = device.attr_path("in_illuminance_input");
        let raw = device.attr_path("in_illuminance_raw");
        let (input_path, scale) = if input.exists() {
            (input, 1f64)
        } else if raw.exists() {
            let scale_path = device.attr_path("in_illuminance_scale");
            let scale = if scale_path.exists() {
                read_attr_as(&scale_path)?
            } else {
                1f64
            };
            (raw, scale)
        } else {
            return Err(DriverError::MissingChannel("in_illuminance".to_string()));
        };

        Ok(Box::new(TimerDevice::new(
            DrvData {
                name: device.display_name(),
                input_path,
                scale,
                callback,
            },
            DEFAULT_POLL_INTERVAL,
            "[iio_poll_light_set_polling] light_changed",
            light_changed,
        )))
    }
}
