use std::{path::PathBuf, str::FromStr, time::Duration};

use common::readings::{LightReadings, Readings};
use thiserror::Error;
use tracing::{debug, warn};

use super::{check_udev_sensor_type, polling::TimerDevice};
use crate::{
    externals::{sysfs::read_attr, udev::UdevDevice},
    internals::core::ports::{
        DriverError, DriverState, DriverType, ReadingsUpdateFunc, SensorDriver,
    },
};

const POLL_INTERVAL: Duration = Duration::from_millis(8000);
const MAX_LIGHT_LEVEL: f64 = 255f64;

pub struct HwmonLight;

pub static HWMON_LIGHT: HwmonLight = HwmonLight;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid light attribute '{0}'.")]
pub struct LightAttrError(String);

/// Contents of the hwmon `light` attribute: `(left,right)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightPair {
    pub left: u32,
    pub right: u32,
}

impl FromStr for LightPair {
    type Err = LightAttrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || LightAttrError(s.to_string());
        let (left, right) = s
            .trim()
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .and_then(|s| s.split_once(','))
            .ok_or_else(err)?;
        Ok(Self {
            left: left.trim().parse().map_err(|_| err())?,
            right: right.trim().parse().map_err(|_| err())?,
        })
    }
}

impl LightPair {
    /// Brightest side as a percentage of the sensor's range.
    pub fn level(&self) -> f64 {
        self.left.max(self.right) as f64 / MAX_LIGHT_LEVEL * 100f64
    }
}

struct DrvData {
    name: String,
    light_path: PathBuf,
    callback: ReadingsUpdateFunc,
}

fn light_changed(data: &DrvData) {
    let pair = match read_attr(&data.light_path).map(|contents| contents.parse::<LightPair>()) {
        Ok(Ok(pair)) => pair,
        Ok(Err(e)) => {
            warn!("{}", e);
            return;
        }
        Err(e) => {
            warn!("Failed to read light level of '{}': {}", data.name, e);
            return;
        }
    };

    let readings = LightReadings {
        level: pair.level(),
        uses_lux: false,
    };
    debug!("Light read from '{}': {}%", data.name, readings.level);
    (data.callback)(&HWMON_LIGHT, &Readings::from(readings));
}

impl SensorDriver for HwmonLight {
    fn name(&self) -> &'static str {
        "Platform HWMon Light"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Light
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        check_udev_sensor_type(device, "hwmon-als", Some(self.name()))
    }

    fn open(
        &self,
        device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        let light_path = device.attr_path("light");
        read_attr(&light_path)?;

        Ok(Box::new(TimerDevice::new(
            DrvData {
                name: device.display_name(),
                light_path,
                callback,
            },
            POLL_INTERVAL,
            "[hwmon_light_set_polling] light_changed",
            light_changed,
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

    #[test]
    fn test_parse_light_pair() {
        assert_eq!(
            "(12,40)\n".parse::<LightPair>(),
            Ok(LightPair {
                left: 12,
                right: 40
            })
        );
        assert_eq!(
            "( 255 , 0 )".parse::<LightPair>(),
            Ok(LightPair {
                left: 255,
                right: 0
            })
        );
        assert!("12,40".parse::<LightPair>().is_err());
        assert!("(12)".parse::<LightPair>().is_err());
        assert!("(a,b)".parse::<LightPair>().is_err());
    }

    #[test]
    fn test_level_is_percentage() {
        assert_relative_eq!(LightPair { left: 0, right: 255 }.level(), 100f64);
        assert_relative_eq!(LightPair { left: 51, right: 0 }.level(), 20f64, epsilon = 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_slowly() {
        LocalSet::new()
            .run_until(async {
                let dir = tempfile::tempdir().expect("Failed to create tempdir.");
                fs::write(dir.path().join("light"), "(51,0)\n").unwrap();
                let device = UdevDevice::new(UdevClient::default(), "hwmon", dir.path());

                let received = Rc::new(RefCell::new(vec![]));
                let sink = received.clone();
                let mut state = HWMON_LIGHT
                    .open(
                        &device,
                        Rc::new(move |_: &'static dyn SensorDriver, readings: &Readings| {
                            sink.borrow_mut().push(*readings)
                        }),
                    )
                    .expect("Failed to open light sensor.");
                state.set_polling(true);

                time::sleep(time::Duration::from_millis(7999)).await;
                assert!(received.borrow().is_empty());
                time::sleep(time::Duration::from_millis(2)).await;

                let received = received.borrow();
                assert_eq!(received.len(), 1);
                let Readings::Light(light) = received[0] else {
                    panic!("Expected a light reading, got {}", received[0]);
                };
                assert!(!light.uses_lux);
                assert_relative_eq!(light.level, 20f64, epsilon = 1e-9);
            })
            .await;
    }

    #[test]
    fn test_open_requires_light_attr() {
        let dir = tempfile::tempdir().expect("Failed to create tempdir.");
        let device = UdevDevice::new(UdevClient::default(), "hwmon", dir.path());
        assert!(matches!(
            HWMON_LIGHT.open(&device, Rc::new(|_: &'static dyn SensorDriver, _: &Readings| {})),
            Err(DriverError::Sysfs(_))
        ));
    }
}
