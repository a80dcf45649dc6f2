//! Synthetic light sensor for testing consumers on machines without one.
//! Only offered when enabled in the configuration.

use std::{cell::Cell, time::Duration};

use common::readings::{LightReadings, Readings};
use tracing::debug;

use super::polling::TimerDevice;
use crate::{
    externals::udev::UdevDevice,
    internals::core::ports::{
        DriverError, DriverState, DriverType, ReadingsUpdateFunc, SensorDriver,
    },
};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_LEVEL: f64 = 100f64;
const STEP: f64 = 10f64;

pub struct FakeLight;

pub static FAKE_LIGHT: FakeLight = FakeLight;

/// Fake drivers piggyback on the power button, which every machine has.
pub(super) fn is_power_button(device: &UdevDevice) -> bool {
    device.subsystem() == "input" && device.property("NAME") == Some("\"Power Button\"")
}

struct DrvData {
    level: Cell<f64>,
    callback: ReadingsUpdateFunc,
}

fn light_changed(data: &DrvData) {
    let level = match data.level.get() + STEP {
        level if level > MAX_LEVEL => 0f64,
        level => level,
    };
    data.level.set(level);
    debug!("Fake light level {}", level);

    let readings = LightReadings {
        level,
        uses_lux: true,
    };
    (data.callback)(&FAKE_LIGHT, &Readings::from(readings));
}

impl SensorDriver for FakeLight {
    fn name(&self) -> &'static str {
        "Fake light driver"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Light
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        if !is_power_button(device) {
            return false;
        }
        debug!("Found fake light at {}", device.sysfs_path().display());
        true
    }

    fn open(
        &self,
        _device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        Ok(Box::new(TimerDevice::new(
            DrvData {
                level: Cell::new(-STEP),
                callback,
            },
            POLL_INTERVAL,
            "[fake_light_set_polling] light_changed",
            light_changed,
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use tokio::{task::LocalSet, time};

    use super::*;
    use crate::externals::udev::UdevClient;

    #[test]
    fn test_discover_power_button() {
        let button = UdevDevice::new(UdevClient::default(), "input", "/sys/class/input/input0")
            .with_property("NAME", "\"Power Button\"");
        assert!(FAKE_LIGHT.discover(&button));

        let lid = UdevDevice::new(UdevClient::default(), "input", "/sys/class/input/input1")
            .with_property("NAME", "\"Lid Switch\"");
        assert!(!FAKE_LIGHT.discover(&lid));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_wraps() {
        LocalSet::new()
            .run_until(async {
                let device =
                    UdevDevice::new(UdevClient::default(), "input", "/sys/class/input/input0");
                let levels = Rc::new(RefCell::new(vec![]));
                let sink = levels.clone();
                let mut state = FAKE_LIGHT
                    .open(
                        &device,
                        Rc::new(move |_: &'static dyn SensorDriver, readings: &Readings| {
                            if let Readings::Light(light) = readings {
                                sink.borrow_mut().push(light.level);
                            }
                        }),
                    )
                    .expect("Failed to open fake light.");
                state.set_polling(true);
                time::sleep(time::Duration::from_millis(12500)).await;

                let levels = levels.borrow();
                assert_eq!(
                    levels.as_slice(),
                    &[
                        0f64, 10f64, 20f64, 30f64, 40f64, 50f64, 60f64, 70f64, 80f64, 90f64,
                        100f64, 0f64,
                    ]
                );
            })
            .await;
    }
}
