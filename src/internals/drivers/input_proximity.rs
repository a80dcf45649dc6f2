//! Proximity sensors exposed as the `SW_FRONT_PROXIMITY` switch of an
//! evdev input device.

use std::{
    cell::{Cell, RefCell},
    fs,
    io,
    ops::ControlFlow,
    rc::Rc,
};

use common::{
    evdev::{EventAccumulator, SwitchBitmask, SW_FRONT_PROXIMITY},
    readings::{ProximityReadings, Readings},
};
use tracing::{debug, trace, warn};

use crate::{
    externals::{
        evdev::{EvdevFile, SwitchSource},
        scheduler::{watch_add, SourceId},
        udev::UdevDevice,
    },
    internals::core::ports::{
        DriverError, DriverState, DriverType, ReadingsUpdateFunc, SensorDriver,
    },
};

pub struct InputProximity;

pub static INPUT_PROXIMITY: InputProximity = InputProximity;

/// Switch capabilities of the input device an event node belongs to.
fn switch_get_bitmask(device: &UdevDevice) -> Option<SwitchBitmask> {
    let path = device.sysfs_path().join("../capabilities/sw");
    let contents = fs::read_to_string(&path).ok()?;
    match SwitchBitmask::from_capabilities(&contents) {
        Ok(bitmask) => Some(bitmask),
        Err(e) => {
            trace!("Ignoring {}: {}", path.display(), e);
            None
        }
    }
}

struct WatchData {
    name: String,
    driver: &'static dyn SensorDriver,
    last_switch_state: Cell<bool>,
    accumulator: RefCell<EventAccumulator>,
    callback: ReadingsUpdateFunc,
}

impl WatchData {
    /// Drain every complete event from `source`, reporting changes of the
    /// front proximity switch. A trailing partial event is kept for the next
    /// time the source becomes readable.
    fn proximity_changed<S: SwitchSource>(&self, source: &mut S) -> ControlFlow<()> {
        loop {
            let read = {
                let mut accumulator = self.accumulator.borrow_mut();
                match source.read(accumulator.remaining_mut()) {
                    Ok(0) => {
                        debug!("End of event stream on '{}'", self.name);
                        return ControlFlow::Break(());
                    }
                    Ok(read_bytes) => accumulator.advance(read_bytes),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        return ControlFlow::Continue(())
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Failed to read events from '{}': {}", self.name, e);
                        return ControlFlow::Continue(());
                    }
                }
            };

            let Some(event) = read else {
                trace!("Partial event on '{}'", self.name);
                continue;
            };
            if !event.is_front_proximity() {
                continue;
            }

            let bitmask = match source.switch_state() {
                Ok(bitmask) => bitmask,
                Err(e) => {
                    debug!("ioctl EVIOCGSW failed: {}", e);
                    continue;
                }
            };

            let is_near = bitmask.test_bit(SW_FRONT_PROXIMITY);
            if is_near == self.last_switch_state.get() {
                trace!("Proximity of '{}' unchanged", self.name);
                continue;
            }
            self.last_switch_state.set(is_near);

            let readings = ProximityReadings {
                is_near: is_near.into(),
            };
            (self.callback)(self.driver, &Readings::from(readings));
        }
    }
}

/// An opened switch device. Generic over the event source so that it can be
/// driven by something other than a real evdev node.
pub struct ProximityDevice<S: SwitchSource + 'static> {
    source: S,
    data: Rc<WatchData>,
    watch_id: Option<SourceId>,
}

impl<S: SwitchSource + 'static> ProximityDevice<S> {
    /// Reads the current switch state, which is not reported.
    pub fn new(
        source: S,
        name: String,
        driver: &'static dyn SensorDriver,
        callback: ReadingsUpdateFunc,
    ) -> Result<Self, DriverError> {
        let bitmask = source
            .switch_state()
            .map_err(DriverError::FailedToQuerySwitches)?;
        Ok(Self {
            source,
            data: Rc::new(WatchData {
                name,
                driver,
                last_switch_state: Cell::new(bitmask.test_bit(SW_FRONT_PROXIMITY)),
                accumulator: RefCell::new(EventAccumulator::new()),
                callback,
            }),
            watch_id: None,
        })
    }

    pub fn is_near(&self) -> bool {
        self.data.last_switch_state.get()
    }

    fn watch_input_proximity(&self) -> io::Result<SourceId> {
        let bitmask = self.source.switch_state()?;
        self.data
            .last_switch_state
            .set(bitmask.test_bit(SW_FRONT_PROXIMITY));
        // A fresh watch starts at a record boundary.
        *self.data.accumulator.borrow_mut() = EventAccumulator::new();

        let data = Rc::downgrade(&self.data);
        watch_add(self.source.try_clone()?, "[input_proximity] proximity_changed", move |source| {
            match data.upgrade() {
                Some(data) => data.proximity_changed(source),
                None => ControlFlow::Break(()),
            }
        })
    }
}

impl<S: SwitchSource + 'static> DriverState for ProximityDevice<S> {
    fn set_polling(&mut self, state: bool) {
        if self.watch_id.is_some() == state {
            return;
        }

        if let Some(id) = self.watch_id.take() {
            id.remove();
        }

        if state {
            match self.watch_input_proximity() {
                Ok(id) => {
                    debug!("Watching '{}'", self.data.name);
                    self.watch_id = Some(id);
                }
                Err(e) => warn!("Failed to watch '{}': {}", self.data.name, e),
            }
        }
    }

    fn is_polling(&self) -> bool {
        self.watch_id.is_some()
    }
}

impl SensorDriver for InputProximity {
    fn name(&self) -> &'static str {
        "Input proximity"
    }

    fn driver_type(&self) -> DriverType {
        DriverType::Proximity
    }

    fn discover(&self, device: &UdevDevice) -> bool {
        let Some(bitmask) = switch_get_bitmask(device) else {
            return false;
        };
        if !bitmask.test_bit(SW_FRONT_PROXIMITY) {
            return false;
        }

        debug!(
            "Found input proximity sensor at {}",
            device.sysfs_path().display()
        );
        true
    }

    fn open(
        &self,
        device: &UdevDevice,
        callback: ReadingsUpdateFunc,
    ) -> Result<Box<dyn DriverState>, DriverError> {
        let device_file = device.device_file().ok_or(DriverError::NoDeviceFile)?;
        let source = EvdevFile::open(device_file)
            .map_err(|e| DriverError::FailedToOpen(device_file.to_path_buf(), e))?;
        Ok(Box::new(ProximityDevice::new(
            source,
            device.name().to_string(),
            &INPUT_PROXIMITY,
            callback,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::externals::udev::UdevClient;

    fn event_device(capabilities: Option<&str>) -> (tempfile::TempDir, UdevDevice) {
        let root = tempfile::tempdir().expect("Failed to create tempdir.");
        let input = root.path().join("input5");
        fs::create_dir_all(input.join("event3")).unwrap();
        fs::create_dir_all(input.join("capabilities")).unwrap();
        if let Some(capabilities) = capabilities {
            fs::write(input.join("capabilities/sw"), capabilities).unwrap();
        }
        let device = UdevDevice::new(UdevClient::default(), "input", input.join("event3"))
            .with_device_file(root.path().join("missing"));
        (root, device)
    }

    fn noop_callback() -> ReadingsUpdateFunc {
        Rc::new(|_: &'static dyn SensorDriver, _: &Readings| {})
    }

    #[test]
    fn test_discover() {
        let (_root, device) = event_device(Some("800\n"));
        assert!(INPUT_PROXIMITY.discover(&device));

        // Lid switch only.
        let (_root, device) = event_device(Some("1\n"));
        assert!(!INPUT_PROXIMITY.discover(&device));

        let (_root, device) = event_device(Some("0\n"));
        assert!(!INPUT_PROXIMITY.discover(&device));

        let (_root, device) = event_device(None);
        assert!(!INPUT_PROXIMITY.discover(&device));
    }

    #[test]
    fn test_open_missing_device_file() {
        let (_root, device) = event_device(Some("800\n"));
        let result = INPUT_PROXIMITY.open(&device, noop_callback());
        assert!(matches!(
            result,
            Err(DriverError::FailedToOpen(path, _)) if path.ends_with(Path::new("missing"))
        ));

        let device = UdevDevice::new(UdevClient::default(), "input", "/sys/class/input/event3");
        let result = INPUT_PROXIMITY.open(&device, noop_callback());
        assert!(matches!(result, Err(DriverError::NoDeviceFile)));
    }
}
