use std::{cell::Cell, time::Duration};

use common::readings::{CompassReadings, Readings};
use tracing::debug;

use super::{fake_light::is_power_button, polling::TimerDevice};
use crate::{
    externals::udev::UdevDevice,
    internals::core::ports::{
        DriverError, DriverState, DriverType, ReadingsUpdateFunc, SensorDriver,
    },
};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const STEP: f64 = 10f64;

pub struct FakeCompass;

pub static FAKE_COMPASS: FakeCompass = FakeCompass;

struct DrvData {
    heading: Cell<f64>,
    callback: ReadingsUpdateFunc,
}

fn compass_changed(data: &DrvData) {
    let heading = (data.heading.get() + STEP) % 360f64;
    data.heading.set(heading);
    debug!("Fake heading {}", heading);
    (data.callback)(&FAKE_COMPASS, &Readings::from(CompassReadings { heading }));
}

impl SensorDriver for FakeCompass {
    fn name(&self) -> &'static str {
        "Fake compass driver"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Compass
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        if !is_power_button(device) {
            return false;
        }
        debug!("Found fake compass at {}", device.sysfs_path().display());
        true
    }

    fn open(
        &self,
        _device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        Ok(Box::new(TimerDevice::new(
            DrvData {
                heading: Cell::new(360f64 - STEP),
                callback,
            },
            POLL_INTERVAL,
            "[fake_compass_set_polling] compass_changed",
            compass_changed,
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use tokio::{task::LocalSet, time};

    use super::*;
    use crate::externals::udev::UdevClient;

    #[tokio::test(start_paused = true)]
    async fn test_rotates() {
        LocalSet::new()
            .run_until(async {
                let device =
                    UdevDevice::new(UdevClient::default(), "input", "/sys/class/input/input0");
                let headings = Rc::new(RefCell::new(vec![]));
                let sink = headings.clone();
                let mut state = FAKE_COMPASS
                    .open(
                        &device,
                        Rc::new(move |_: &'static dyn SensorDriver, readings: &Readings| {
                            if let Readings::Compass(compass) = readings {
                                sink.borrow_mut().push(compass.heading);
                            }
                        }),
                    )
                    .expect("Failed to open fake compass.");
                state.set_polling(true);
                time::sleep(time::Duration::from_millis(3500)).await;
                assert_eq!(headings.borrow().as_slice(), &[0f64, 10f64, 20f64]);
            })
            .await;
    }
}
