use std::{
    cell::{Cell, RefCell},
    io::{self, Read, Write},
    os::{
        fd::{AsRawFd, RawFd},
        unix::net::UnixStream,
    },
    rc::Rc,
    time::Duration,
};

use common::{
    evdev::{InputEvent, SwitchBitmask, EV_SW, SW_FRONT_PROXIMITY},
    readings::{ProximityNear, Readings},
};
use sensor_proxy::{
    externals::evdev::SwitchSource,
    internals::{
        core::ports::{DriverState, SensorDriver},
        drivers::{input_proximity::ProximityDevice, INPUT_PROXIMITY},
    },
};
use tokio::{task::LocalSet, time};

const EV_KEY: u16 = 0x01;
const SW_LID: u16 = 0x00;

/// Event stream backed by one end of a socket pair, with a switch state
/// controlled by the test.
struct FakeSwitch {
    stream: UnixStream,
    near: Rc<Cell<bool>>,
    fail: Rc<Cell<bool>>,
}

impl Read for FakeSwitch {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl AsRawFd for FakeSwitch {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl SwitchSource for FakeSwitch {
    fn switch_state(&self) -> io::Result<SwitchBitmask> {
        if self.fail.get() {
            return Err(io::Error::from_raw_os_error(libc::ENOTTY));
        }
        let word = if self.near.get() { 1 << SW_FRONT_PROXIMITY } else { 0 };
        Ok(SwitchBitmask::from_words(vec![word]))
    }

    fn try_clone(&self) -> io::Result<Self> {
        Ok(Self {
            stream: self.stream.try_clone()?,
            near: self.near.clone(),
            fail: self.fail.clone(),
        })
    }
}

struct Harness {
    peer: UnixStream,
    near: Rc<Cell<bool>>,
    fail: Rc<Cell<bool>>,
    received: Rc<RefCell<Vec<ProximityNear>>>,
    device: ProximityDevice<FakeSwitch>,
}

impl Harness {
    fn new(initially_near: bool) -> Self {
        let (stream, peer) = UnixStream::pair().expect("Failed to create socket pair.");
        stream.set_nonblocking(true).unwrap();
        let near = Rc::new(Cell::new(initially_near));
        let fail = Rc::new(Cell::new(false));
        let source = FakeSwitch {
            stream,
            near: near.clone(),
            fail: fail.clone(),
        };

        let received = Rc::new(RefCell::new(vec![]));
        let received_clone = received.clone();
        let device = ProximityDevice::new(
            source,
            "event3".to_string(),
            &INPUT_PROXIMITY,
            Rc::new(move |driver: &'static dyn SensorDriver, readings: &Readings| {
                assert_eq!(driver.name(), INPUT_PROXIMITY.name());
                match readings {
                    Readings::Proximity(r) => received_clone.borrow_mut().push(r.is_near),
                    other => panic!("Unexpected readings {}", other),
                }
            }),
        )
        .expect("Failed to create proximity device.");

        Self {
            peer,
            near,
            fail,
            received,
            device,
        }
    }

    fn send(&mut self, bytes: &[u8]) {
        self.peer.write_all(bytes).expect("Failed to write events.");
    }

    fn send_event(&mut self, event_type: u16, code: u16, value: i32) {
        let event = InputEvent {
            time_sec: 1,
            time_usec: 0,
            event_type,
            code,
            value,
        };
        self.send(&event.to_bytes());
    }

    fn received(&self) -> Vec<ProximityNear> {
        self.received.borrow().clone()
    }
}

async fn settle() {
    time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_partial_record_is_completed_by_next_read() {
    LocalSet::new()
        .run_until(async {
            let mut harness = Harness::new(false);
            assert!(!harness.device.is_near());
            harness.device.set_polling(true);
            assert!(harness.device.is_polling());

            harness.near.set(true);
            let event = InputEvent {
                time_sec: 1,
                time_usec: 0,
                event_type: EV_SW,
                code: SW_FRONT_PROXIMITY,
                value: 1,
            }
            .to_bytes();
            harness.send(&event[..5]);
            settle().await;
            assert!(harness.received().is_empty());

            harness.send(&event[5..]);
            settle().await;
            assert_eq!(harness.received(), vec![ProximityNear::Near]);
            assert!(harness.device.is_near());
        })
        .await;
}

#[tokio::test]
async fn test_only_changes_are_reported() {
    LocalSet::new()
        .run_until(async {
            let mut harness = Harness::new(false);
            harness.device.set_polling(true);

            // State unchanged, then unrelated events.
            harness.send_event(EV_SW, SW_FRONT_PROXIMITY, 0);
            settle().await;
            assert!(harness.received().is_empty());

            harness.near.set(true);
            harness.send_event(EV_KEY, 116, 1);
            harness.send_event(EV_SW, SW_LID, 1);
            settle().await;
            assert!(harness.received().is_empty());

            harness.send_event(EV_SW, SW_FRONT_PROXIMITY, 1);
            harness.send_event(EV_SW, SW_FRONT_PROXIMITY, 1);
            settle().await;
            assert_eq!(harness.received(), vec![ProximityNear::Near]);

            harness.near.set(false);
            harness.send_event(EV_SW, SW_FRONT_PROXIMITY, 0);
            settle().await;
            assert_eq!(
                harness.received(),
                vec![ProximityNear::Near, ProximityNear::Far]
            );
        })
        .await;
}

#[tokio::test]
async fn test_failed_switch_query_is_skipped() {
    LocalSet::new()
        .run_until(async {
            let mut harness = Harness::new(true);
            harness.device.set_polling(true);

            harness.near.set(false);
            harness.fail.set(true);
            harness.send_event(EV_SW, SW_FRONT_PROXIMITY, 0);
            settle().await;
            assert!(harness.received().is_empty());
            assert!(harness.device.is_near());

            harness.fail.set(false);
            harness.send_event(EV_SW, SW_FRONT_PROXIMITY, 0);
            settle().await;
            assert_eq!(harness.received(), vec![ProximityNear::Far]);
        })
        .await;
}

#[tokio::test]
async fn test_no_events_after_polling_stops() {
    LocalSet::new()
        .run_until(async {
            let mut harness = Harness::new(false);
            harness.device.set_polling(true);
            harness.device.set_polling(false);
            assert!(!harness.device.is_polling());
            settle().await;

            harness.near.set(true);
            harness.send_event(EV_SW, SW_FRONT_PROXIMITY, 1);
            settle().await;
            assert!(harness.received().is_empty());

            // Re-enabling picks up the current state without reporting it.
            harness.device.set_polling(true);
            assert!(harness.device.is_near());
            settle().await;
            assert!(harness.received().is_empty());
        })
        .await;
}

#[test]
fn test_open_fails_when_switches_cannot_be_queried() {
    let (stream, _peer) = UnixStream::pair().expect("Failed to create socket pair.");
    let source = FakeSwitch {
        stream,
        near: Rc::new(Cell::new(false)),
        fail: Rc::new(Cell::new(true)),
    };
    let result = ProximityDevice::new(
        source,
        "event3".to_string(),
        &INPUT_PROXIMITY,
        Rc::new(|_: &'static dyn SensorDriver, _: &Readings| {}),
    );
    assert!(result.is_err());
}
