use common::{
    calibration::{compute_heading, CalibrationData, MagnetometerSample},
    readings::{CompassReadings, Readings},
};
use tracing::{trace, warn};

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

pub struct IioPollCompass;

pub static IIO_POLL_COMPASS: IioPollCompass = IioPollCompass;

struct DrvData {
    device: UdevDevice,
    name: String,
    calibration_data: CalibrationData,
    callback: ReadingsUpdateFunc,
}

fn read_sample(device: &UdevDevice) -> Result<MagnetometerSample, SysfsError> {
    Ok(MagnetometerSample {
        x: read_attr_as(&device.attr_path("in_magn_x_raw"))?,
        y: read_attr_as(&device.attr_path("in_magn_y_raw"))?,
        z: read_attr_as(&device.attr_path("in_magn_z_raw"))?,
    })
}

fn poll_heading(data: &DrvData) {
    let sample = match read_sample(&data.device) {
        Ok(sample) => sample,
        Err(e) => {
            warn!("Failed to read magnetometer '{}': {}", data.name, e);
            return;
        }
    };

    let heading = compute_heading(sample, &data.calibration_data);
    if let Some(e) = heading.fallback {
        warn!("Using uncalibrated heading for '{}': {}", data.name, e);
    }
    trace!(
        "Heading of '{}' from ({}, {}, {}) is {}",
        data.name,
        sample.x,
        sample.y,
        sample.z,
        heading.degrees
    );

    let readings = CompassReadings {
        heading: heading.degrees,
    };
    (data.callback)(&IIO_POLL_COMPASS, &Readings::from(readings));
}

impl SensorDriver for IioPollCompass {
    fn name(&self) -> &'static str {
        "IIO poll compass uncalibrated"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Compass
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        check_udev_sensor_type(device, "iio-poll-compass-uncalibrated", Some(self.name()))
    }

    fn open(
        &self,
        device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        fixup_sampling_frequency(device);

        Ok(Box::new(TimerDevice::new(
            DrvData {
                device: device.clone(),
                name: device.display_name(),
                calibration_data: CalibrationData::REFERENCE,
                callback,
            },
            DEFAULT_POLL_INTERVAL,
            "[iio_compass_set_polling] poll_heading",
            poll_heading,
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, fs, rc::Rc};

    use approx::assert_relative_eq;
    use tokio::{task::LocalSet, time};

    use super::*;
    use crate::externals::udev::UdevClient;

    fn write_sample(dir: &std::path::Path, x: i32, y: i32, z: i32) {
        fs::write(dir.join("in_magn_x_raw"), format!("{}\n", x)).unwrap();
        fs::write(dir.join("in_magn_y_raw"), format!("{}\n", y)).unwrap();
        fs::write(dir.join("in_magn_z_raw"), format!("{}\n", z)).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_heading() {
        LocalSet::new()
            .run_until(async {
                let dir = tempfile::tempdir().expect("Failed to create tempdir.");
                fs::write(dir.path().join("in_magn_sampling_frequency"), "0\n").unwrap();
                write_sample(dir.path(), -4780, -3541, -177);

                let device = UdevDevice::new(UdevClient::default(), "iio", dir.path())
                    .with_property("IIO_SENSOR_PROXY_TYPE", "iio-poll-compass-uncalibrated");
                assert!(IIO_POLL_COMPASS.discover(&device));

                let headings = Rc::new(RefCell::new(vec![]));
                let sink = headings.clone();
                let callback: ReadingsUpdateFunc =
                    Rc::new(move |_: &'static dyn SensorDriver, readings: &Readings| {
                        if let Readings::Compass(compass) = readings {
                            sink.borrow_mut().push(compass.heading);
                        }
                    });

                let mut state = IIO_POLL_COMPASS
                    .open(&device, callback)
                    .expect("Failed to open compass.");
                assert_eq!(
                    fs::read_to_string(dir.path().join("in_magn_sampling_frequency")).unwrap(),
                    "10"
                );

                state.set_polling(true);
                time::sleep(time::Duration::from_millis(700)).await;
                time::sleep(time::Duration::from_millis(1)).await;
                assert_eq!(headings.borrow().as_slice(), &[0f64]);

                // A sample that can't be read skips the tick.
                fs::write(dir.path().join("in_magn_y_raw"), "garbage\n").unwrap();
                time::sleep(time::Duration::from_millis(700)).await;
                assert_eq!(headings.borrow().len(), 1);

                write_sample(dir.path(), -1648, -3541, 0);
                time::sleep(time::Duration::from_millis(700)).await;
                assert_eq!(headings.borrow().len(), 2);
                assert_relative_eq!(headings.borrow()[1], 90f64, epsilon = 1e-9);
            })
            .await;
    }
}
