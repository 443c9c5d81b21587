//! Fixed-period tick worker
//!
//! Runs a callback on a dedicated thread every `interval` while active.
//! Inactive workers park on the condvar instead of polling. Missed deadlines
//! are skipped rather than replayed in a burst.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use voxbridge_core::BridgeResult;

#[derive(Default)]
struct TickState {
    active: bool,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<TickState>,
    wake: Condvar,
}

/// Cloneable switch for a running `TickWorker`
#[derive(Clone)]
pub struct TickHandle {
    shared: Arc<Shared>,
}

impl TickHandle {
    /// Inactive handle, to be attached to a worker later
    pub fn new() -> Self {
        TickHandle {
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn set_active(&self, active: bool) {
        let mut state = self.shared.state.lock();
        if state.active != active {
            trace!(active, "ticker toggled");
            state.active = active;
            self.shared.wake.notify_all();
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }
}

/// Owns the tick thread; dropping it stops and joins the thread
pub struct TickWorker {
    handle: TickHandle,
    interval: Duration,
    thread: Option<JoinHandle<()>>,
}

impl TickWorker {
    /// Spawn an inactive worker calling `tick` every `interval`
    pub fn spawn<F>(name: &str, interval: Duration, tick: F) -> BridgeResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        Self::attach(&TickHandle::new(), name, interval, tick)
    }

    /// Spawn the worker thread behind an existing handle
    pub fn attach<F>(
        handle: &TickHandle,
        name: &str,
        interval: Duration,
        mut tick: F,
    ) -> BridgeResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::clone(&handle.shared);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&shared, interval, &mut tick))?;

        debug!(name, ?interval, "tick worker started");
        Ok(TickWorker {
            handle: handle.clone(),
            interval,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> TickHandle {
        self.handle.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

fn run(shared: &Shared, interval: Duration, tick: &mut dyn FnMut()) {
    let mut state = shared.state.lock();
    let mut next = Instant::now();

    loop {
        if state.shutdown {
            break;
        }
        if !state.active {
            shared.wake.wait(&mut state);
            next = Instant::now();
            continue;
        }

        let now = Instant::now();
        if now < next {
            shared.wake.wait_until(&mut state, next);
            continue;
        }

        MutexGuard::unlocked(&mut state, || tick());

        next += interval;
        if next < now {
            next = now + interval;
        }
    }
}

impl Default for TickHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TickWorker {
    fn drop(&mut self) {
        {
            let mut state = self.handle.shared.state.lock();
            state.shutdown = true;
            self.handle.shared.wake.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_worker(interval: Duration) -> (TickWorker, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let worker = TickWorker::spawn("test-tick", interval, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (worker, count)
    }

    #[test]
    fn test_inactive_worker_does_not_tick() {
        let (worker, count) = counting_worker(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!worker.handle().is_active());
    }

    #[test]
    fn test_active_worker_ticks_until_paused() {
        let (worker, count) = counting_worker(Duration::from_millis(1));
        let handle = worker.handle();

        handle.set_active(true);
        thread::sleep(Duration::from_millis(50));
        handle.set_active(false);
        let ticked = count.load(Ordering::SeqCst);
        assert!(ticked > 0);

        // Allow an in-flight tick to finish
        thread::sleep(Duration::from_millis(10));
        let settled = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), settled);
    }

    #[test]
    fn test_handle_created_before_worker() {
        let handle = TickHandle::new();
        handle.set_active(true);

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _worker = TickWorker::attach(&handle, "test-attach", Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        assert!(count.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_drop_joins_thread() {
        let (worker, count) = counting_worker(Duration::from_millis(1));
        worker.handle().set_active(true);
        thread::sleep(Duration::from_millis(10));
        drop(worker);

        let after_drop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}
