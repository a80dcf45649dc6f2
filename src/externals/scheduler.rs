//! Timer and file descriptor event sources on the local task set.
//!
//! Every source runs as a task on the current `LocalSet`, so callbacks never
//! run concurrently with each other or with the code that adds and removes
//! sources. A source is removed by dropping its `SourceId` (or calling
//! `remove`). An aborted local task is never polled again, so once removal
//! returns the callback will not be invoked any more.

use std::{io, ops::ControlFlow, os::fd::AsRawFd, time::Duration};

use tokio::{
    io::unix::AsyncFd,
    task::{self, JoinHandle},
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, trace, warn};

/// Polling interval used by most drivers.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(700);

/// Handle of a registered source. The source is removed when it is dropped.
#[derive(Debug)]
#[must_use = "the source is removed as soon as its id is dropped"]
pub struct SourceId {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl SourceId {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the source stopped on its own, e.g. because its callback
    /// asked to or the watched descriptor hung up.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn remove(self) {}
}

impl Drop for SourceId {
    fn drop(&mut self) {
        self.handle.abort();
        trace!("Removed source '{}'.", self.name);
    }
}

/// Call `func` every `interval`, first after one full interval has elapsed,
/// until it returns `ControlFlow::Break`.
///
/// Must be called from within a `LocalSet`.
pub fn timeout_add<F>(interval: Duration, name: &'static str, mut func: F) -> SourceId
where
    F: FnMut() -> ControlFlow<()> + 'static,
{
    let handle = task::spawn_local(async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if func().is_break() {
                debug!("Source '{}' stopped.", name);
                break;
            }
        }
    });
    SourceId { name, handle }
}

/// Call `func` every time `fd` becomes readable, until it returns
/// `ControlFlow::Break` or the descriptor hangs up or reports an error.
///
/// `fd` must be in non-blocking mode and `func` must read until it would
/// block, readiness is only reported again for new data.
///
/// Must be called from within a `LocalSet`.
pub fn watch_add<T, F>(fd: T, name: &'static str, mut func: F) -> io::Result<SourceId>
where
    T: AsRawFd + 'static,
    F: FnMut(&mut T) -> ControlFlow<()> + 'static,
{
    let mut fd = AsyncFd::new(fd)?;
    let handle = task::spawn_local(async move {
        loop {
            let mut guard = match fd.readable_mut().await {
                Ok(guard) => guard,
                Err(e) => {
                    warn!("Watch '{}' failed: {}", name, e);
                    break;
                }
            };

            let ready = guard.ready();
            let flow = func(guard.get_inner_mut());
            if flow.is_break() {
                debug!("Source '{}' stopped.", name);
                break;
            }
            if ready.is_read_closed() || ready.is_error() {
                debug!("Source '{}' hung up.", name);
                break;
            }
            guard.clear_ready();
        }
    });
    Ok(SourceId { name, handle })
}
