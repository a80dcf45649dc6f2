use common::{
    iio::ChannelLayout,
    readings::{CompassReadings, Readings},
};
use tracing::{debug, warn};

use super::{check_udev_sensor_type, iio_buffer::BufferDrvData, polling::TimerDevice};
use crate::{
    externals::{scheduler::DEFAULT_POLL_INTERVAL, udev::UdevDevice},
    internals::core::ports::{
        DriverError, DriverState, DriverType, ReadingsUpdateFunc, SensorDriver,
    },
};

const CHANNEL: &str = "in_rot_from_north_magnetic_tilt_comp";

pub struct IioBufferCompass;

pub static IIO_BUFFER_COMPASS: IioBufferCompass = IioBufferCompass;

struct DrvData {
    name: String,
    buffer_data: BufferDrvData,
    callback: ReadingsUpdateFunc,
}

fn process_scan(data: &DrvData, layout: &ChannelLayout, row: &[u8]) {
    let value = match layout.process_scan(row, CHANNEL) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to decode heading on '{}': {}", data.name, e);
            return;
        }
    };
    debug!(
        "Heading read from IIO on '{}': {} (scale {}) = {}",
        data.name,
        value.raw,
        value.scale,
        value.physical()
    );

    let readings = CompassReadings {
        heading: value.physical(),
    };
    (data.callback)(&IIO_BUFFER_COMPASS, &Readings::from(readings));
}

fn read_heading(data: &DrvData) {
    data.buffer_data
        .read_last_scan(|layout, row| process_scan(data, layout, row));
}

impl SensorDriver for IioBufferCompass {
    fn name(&self) -> &'static str {
        "IIO Buffer Compass"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Compass
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        check_udev_sensor_type(device, "iio-buffer-compass", Some(self.name()))
    }

    fn open(
        &self,
        device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        let buffer_data = BufferDrvData::new(device, "magn_3d")?;
        if buffer_data.layout().channel(CHANNEL).is_none() {
            return Err(DriverError::MissingChannel(CHANNEL.to_string()));
        }

        Ok(Box::new(TimerDevice::new(
            DrvData {
                name: device.display_name(),
                buffer_data,
                callback,
            },
            DEFAULT_POLL_INTERVAL,
            "[iio_buffer_compass_set_polling] read_heading",
            read_heading,
        )))
    }
}
