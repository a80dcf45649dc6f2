use std::{ops::ControlFlow, rc::Rc, time::Duration};

use crate::{
    externals::scheduler::{timeout_add, SourceId},
    internals::core::ports::DriverState,
};

/// State of a driver that samples its device on a fixed interval.
///
/// The timer only holds a weak reference to `data`, so dropping the device
/// releases the driver data right away even if the timer task has not been
/// torn down yet.
pub struct TimerDevice<D: 'static> {
    data: Rc<D>,
    interval: Duration,
    source_name: &'static str,
    tick: fn(&D),
    timeout_id: Option<SourceId>,
}

impl<D: 'static> TimerDevice<D> {
    pub fn new(data: D, interval: Duration, source_name: &'static str, tick: fn(&D)) -> Self {
        Self {
            data: Rc::new(data),
            interval,
            source_name,
            tick,
            timeout_id: None,
        }
    }

    pub fn data(&self) -> &D {
        &self.data
    }
}

impl<D: 'static> DriverState for TimerDevice<D> {
    fn set_polling(&mut self, state: bool) {
        if self.timeout_id.is_some() == state {
            return;
        }

        if let Some(id) = self.timeout_id.take() {
            id.remove();
        }

        if state {
            let data = Rc::downgrade(&self.data);
            let tick = self.tick;
            self.timeout_id = Some(timeout_add(self.interval, self.source_name, move || {
                match data.upgrade() {
                    Some(data) => {
                        tick(&data);
                        ControlFlow::Continue(())
                    }
                    None => ControlFlow::Break(()),
                }
            }));
        }
    }

    fn is_polling(&self) -> bool {
        self.timeout_id.is_some()
    }
}
