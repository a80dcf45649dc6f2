use common::readings::{AccelReadings, AccelScale, Readings};
use tracing::{debug, warn};

use super::{check_udev_sensor_type, polling::TimerDevice};
use crate::{
    externals::{
        scheduler::DEFAULT_POLL_INTERVAL,
        sysfs::{fixup_sampling_frequency, read_attr_as, SysfsError},
        udev::UdevDevice,
    },
    internals::core::ports::{
        DriverError, DriverState, DriverType, ReadingsUpdateFunc, SensorDriver,
    },
};

pub struct IioPollAccel;

pub static IIO_POLL_ACCEL: IioPollAccel = IioPollAccel;

struct DrvData {
    device: UdevDevice,
    name: String,
    scale: AccelScale,
    callback: ReadingsUpdateFunc,
}

/// Scale of one axis: the per-axis attribute if there is one, otherwise the
/// shared `in_accel_scale`, otherwise 1.
fn axis_scale(device: &UdevDevice, axis: char) -> Result<f64, SysfsError> {
    for attr in [format!("in_accel_{}_scale", axis), "in_accel_scale".to_string()] {
        let path = device.attr_path(&attr);
        if path.exists() {
            return read_attr_as(&path);
        }
    }
    Ok(1f64)
}

fn read_axis(device: &UdevDevice, axis: char) -> Result<i32, SysfsError> {
    read_attr_as(&device.attr_path(&format!("in_accel_{}_raw", axis)))
}

fn read_sample(device: &UdevDevice) -> Result<(i32, i32, i32), SysfsError> {
    Ok((
        read_axis(device, 'x')?,
        read_axis(device, 'y')?,
        read_axis(device, 'z')?,
    ))
}

fn poll_orientation(data: &DrvData) {
    let (accel_x, accel_y, accel_z) = match read_sample(&data.device) {
        Ok(sample) => sample,
        Err(e) => {
            warn!("Failed to read accelerometer '{}': {}", data.name, e);
            return;
        }
    };
    debug!(
        "Accel read from '{}': {}, {}, {}",
        data.name, accel_x, accel_y, accel_z
    );

    let readings = AccelReadings {
        accel_x,
        accel_y,
        accel_z,
        scale: data.scale,
    };
    (data.callback)(&IIO_POLL_ACCEL, &Readings::from(readings));
}

impl SensorDriver for IioPollAccel {
    fn name(&self) -> &'static str {
        "IIO Poll accelerometer"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Accel
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        check_udev_sensor_type(device, "iio-poll-accel", Some(self.name()))
    }

    fn open(
        &self,
        device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        fixup_sampling_frequency(device);
        let scale = AccelScale {
            x: axis_scale(device, 'x')?,
            y: axis_scale(device, 'y')?,
            z: axis_scale(device, 'z')?,
        };

        Ok(Box::new(TimerDevice::new(
            DrvData {
                device: device.clone(),
                name: device.display_name(),
                scale,
                callback,
            },
            DEFAULT_POLL_INTERVAL,
            "[iio_poll_accel_set_polling] poll_orientation",
            poll_orientation,
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, fs, rc::Rc};

    use tokio::{task::LocalSet, time};

    use super::*;
    use crate::externals::udev::UdevClient;

    #[test]
    fn test_axis_scale() {
        let dir = tempfile::tempdir().expect("Failed to create tempdir.");
        let device = UdevDevice::new(UdevClient::default(), "iio", dir.path());
        assert_eq!(axis_scale(&device, 'x').unwrap(), 1f64);

        fs::write(dir.path().join("in_accel_scale"), "0.009806\n").unwrap();
        fs::write(dir.path().join("in_accel_z_scale"), "0.5\n").unwrap();
        assert_eq!(axis_scale(&device, 'x').unwrap(), 0.009806);
        assert_eq!(axis_scale(&device, 'z').unwrap(), 0.5);

        fs::write(dir.path().join("in_accel_y_scale"), "fast\n").unwrap();
        assert!(IIO_POLL_ACCEL
            .open(&device, Rc::new(|_: &'static dyn SensorDriver, _: &Readings| {}))
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_orientation() {
        LocalSet::new()
            .run_until(async {
                let dir = tempfile::tempdir().expect("Failed to create tempdir.");
                fs::write(dir.path().join("in_accel_scale"), "0.01\n").unwrap();
                fs::write(dir.path().join("in_accel_x_raw"), "12\n").unwrap();
                fs::write(dir.path().join("in_accel_y_raw"), "-981\n").unwrap();
                fs::write(dir.path().join("in_accel_z_raw"), "3\n").unwrap();
                let device = UdevDevice::new(UdevClient::default(), "iio", dir.path());

                let received = Rc::new(RefCell::new(vec![]));
                let sink = received.clone();
                let mut state = IIO_POLL_ACCEL
                    .open(
                        &device,
                        Rc::new(move |_: &'static dyn SensorDriver, readings: &Readings| {
                            sink.borrow_mut().push(*readings)
                        }),
                    )
                    .expect("Failed to open accelerometer.");
                state.set_polling(true);
                time::sleep(time::Duration::from_millis(701)).await;

                assert_eq!(
                    received.borrow().as_slice(),
                    &[Readings::Accel(AccelReadings {
                        accel_x: 12,
                        accel_y: -981,
                        accel_z: 3,
                        scale: AccelScale::uniform(0.01),
                    })]
                );
            })
            .await;
    }
}
