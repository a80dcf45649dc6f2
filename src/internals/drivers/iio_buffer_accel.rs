use common::{
    iio::{ChannelLayout, ScanError},
    readings::{AccelReadings, AccelScale, Readings},
};
use thiserror::Error;
use tracing::{debug, warn};

use super::{check_udev_sensor_type, iio_buffer::BufferDrvData, polling::TimerDevice};
use crate::{
    externals::{scheduler::DEFAULT_POLL_INTERVAL, udev::UdevDevice},
    internals::core::ports::{
        DriverError, DriverState, DriverType, ReadingsUpdateFunc, SensorDriver,
    },
};

const CHANNELS: [&str; 3] = ["in_accel_x", "in_accel_y", "in_accel_z"];

pub struct IioBufferAccel;

pub static IIO_BUFFER_ACCEL: IioBufferAccel = IioBufferAccel;

struct DrvData {
    name: String,
    buffer_data: BufferDrvData,
    callback: ReadingsUpdateFunc,
}

#[derive(Debug, Error, PartialEq, Eq)]
enum DecodeError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("Value {1} of '{0}' does not fit in 32 bits.")]
    OutOfRange(&'static str, i64),
}

fn axis_value(raw: i64, channel: &'static str) -> Result<i32, DecodeError> {
    i32::try_from(raw).map_err(|_| DecodeError::OutOfRange(channel, raw))
}

fn decode(layout: &ChannelLayout, row: &[u8]) -> Result<AccelReadings, DecodeError> {
    let [x_name, y_name, z_name] = CHANNELS;
    let (x, y, z) = (
        layout.process_scan(row, x_name)?,
        layout.process_scan(row, y_name)?,
        layout.process_scan(row, z_name)?,
    );
    Ok(AccelReadings {
        accel_x: axis_value(x.raw, x_name)?,
        accel_y: axis_value(y.raw, y_name)?,
        accel_z: axis_value(z.raw, z_name)?,
        scale: AccelScale {
            x: x.scale,
            y: y.scale,
            z: z.scale,
        },
    })
}

fn process_scan(data: &DrvData, layout: &ChannelLayout, row: &[u8]) {
    match decode(layout, row) {
        Ok(readings) => {
            debug!(
                "Accel read from IIO on '{}': {}, {}, {}",
                data.name, readings.accel_x, readings.accel_y, readings.accel_z
            );
            (data.callback)(&IIO_BUFFER_ACCEL, &Readings::from(readings));
        }
        Err(e) => warn!("Failed to decode accel scan on '{}': {}", data.name, e),
    }
}

fn read_orientation(data: &DrvData) {
    data.buffer_data
        .read_last_scan(|layout, row| process_scan(data, layout, row));
}

impl SensorDriver for IioBufferAccel {
    fn name(&self) -> &'static str {
        "IIO Buffer accelerometer"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Accel
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        check_udev_sensor_type(device, "iio-buffer-accel", Some(self.name()))
    }

    fn open(
        &self,
        device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        let buffer_data = BufferDrvData::new(device, "accel_3d")?;
        if let Some(missing) = CHANNELS
            .iter()
            .find(|channel| buffer_data.layout().channel(channel).is_none())
        {
            return Err(DriverError::MissingChannel(missing.to_string()));
        }

        Ok(Box::new(TimerDevice::new(
            DrvData {
                name: device.display_name(),
                buffer_data,
                callback,
            },
            DEFAULT_POLL_INTERVAL,
            "[iio_buffer_accel_set_polling] read_orientation",
            read_orientation,
        )))
    }
}

#[cfg(test)]
mod tests {
    use common::iio::ChannelSpec;

    use super::*;

    #[test]
    fn test_decode_per_axis_scale() {
        let spec = |name: &str, index, scale| ChannelSpec {
            name: name.to_string(),
            index,
            channel_type: "be:s12/16>>4".parse().unwrap(),
            scale,
        };
        let layout = ChannelLayout::new(vec![
            spec("in_accel_x", 0, 0.01),
            spec("in_accel_y", 1, 0.02),
            spec("in_accel_z", 2, 0.03),
        ])
        .unwrap();

        // -1, 256 and 2047 shifted left by 4, big endian.
        let row = [0xff, 0xf0, 0x10, 0x00, 0x7f, 0xf0];
        let readings = decode(&layout, &row).expect("Failed to decode scan.");
        assert_eq!((readings.accel_x, readings.accel_y, readings.accel_z), (-1, 256, 2047));
        assert_eq!(readings.scale.y, 0.02);

        let partial = ChannelLayout::new(vec![spec("in_accel_x", 0, 1f64)]).unwrap();
        assert_eq!(
            decode(&partial, &row),
            Err(DecodeError::Scan(ScanError::MissingChannel(
                "in_accel_y".to_string()
            )))
        );
    }

    #[test]
    fn test_decode_rejects_values_wider_than_i32() {
        let spec = |name: &str, index| ChannelSpec {
            name: name.to_string(),
            index,
            channel_type: "le:u32/32>>0".parse().unwrap(),
            scale: 1f64,
        };
        let layout = ChannelLayout::new(vec![
            spec("in_accel_x", 0),
            spec("in_accel_y", 1),
            spec("in_accel_z", 2),
        ])
        .unwrap();

        let mut row = [0u8; 12];
        row[..4].copy_from_slice(&0x8000_0000u32.to_le_bytes());
        assert_eq!(
            decode(&layout, &row),
            Err(DecodeError::OutOfRange("in_accel_x", 0x8000_0000))
        );

        row[..4].copy_from_slice(&0x7fff_ffffu32.to_le_bytes());
        let readings = decode(&layout, &row).expect("Failed to decode scan.");
        assert_eq!(readings.accel_x, i32::MAX);
    }
}
