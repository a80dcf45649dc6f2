use common::{
    iio::ChannelLayout,
    readings::{LightReadings, Readings},
};
use tracing::{debug, warn};

use super::{check_udev_sensor_type, iio_buffer::BufferDrvData, polling::TimerDevice};
use crate::{
    externals::{scheduler::DEFAULT_POLL_INTERVAL, udev::UdevDevice},
    internals::core::ports::{
        DriverError, DriverState, DriverType, ReadingsUpdateFunc, SensorDriver,
    },
};

const CHANNEL: &str = "in_intensity_both";

pub struct IioBufferLight;

pub static IIO_BUFFER_LIGHT: IioBufferLight = IioBufferLight;

struct DrvData {
    name: String,
    buffer_data: BufferDrvData,
    callback: ReadingsUpdateFunc,
}

fn process_scan(data: &DrvData, layout: &ChannelLayout, row: &[u8]) {
    let value = match layout.process_scan(row, CHANNEL) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to decode light scan on '{}': {}", data.name, e);
            return;
        }
    };
    debug!(
        "Light read from IIO on '{}': {} (scale {}) = {}",
        data.name,
        value.raw,
        value.scale,
        value.physical()
    );

    // The kernel declares in_intensity values unitless, but the sensors
    // this driver binds to report lux.
    let readings = LightReadings {
        level: value.physical(),
        uses_lux: true,
    };
    (data.callback)(&IIO_BUFFER_LIGHT, &Readings::from(readings));
}

fn read_light(data: &DrvData) {
    data.buffer_data
        .read_last_scan(|layout, row| process_scan(data, layout, row));
}

impl SensorDriver for IioBufferLight {
    fn name(&self) -> &'static str {
        "IIO Buffer Light sensor"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Light
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        check_udev_sensor_type(device, "iio-buffer-als", Some(self.name()))
    }

    fn open(
        &self,
        device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        let buffer_data = BufferDrvData::new(device, "als")?;
        if buffer_data.layout().channel(CHANNEL).is_none() {
            return Err(DriverError::MissingChannel(CHANNEL.to_string()));
        }

        let data = DrvData {
            name: device.display_name(),
            buffer_data,
            callback,
        };
        Ok(Box::new(TimerDevice::new(
            data,
            DEFAULT_POLL_INTERVAL,
            "[iio_buffer_light_set_polling] read_light",
            read_light,
        )))
    }
}
