use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace};

pub type TickFn = Arc<dyn Fn() + Send + Sync>;

struct Running {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// A cancellable fixed-period interval running on its own thread.
///
/// At most one interval is alive per ticker: `start` on a running ticker is
/// a no-op.
pub struct Ticker {
    period: Duration,
    on_tick: TickFn,
    running: Mutex<Option<Running>>,
    ticks: Arc<AtomicU64>,
    spawned: AtomicUsize,
}

impl Ticker {
    pub fn new(period: Duration, on_tick: TickFn) -> Self {
        Ticker {
            period,
            on_tick,
            running: Mutex::new(None),
            ticks: Arc::new(AtomicU64::new(0)),
            spawned: AtomicUsize::new(0),
        }
    }

    pub fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return false;
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let period = self.period;
        let on_tick = Arc::clone(&self.on_tick);
        let ticks = Arc::clone(&self.ticks);

        let thread = thread::spawn(move || loop {
            match stop_rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    trace!("tick");
                    on_tick();
                }
                // Explicit stop or the ticker was dropped.
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        self.spawned.fetch_add(1, Ordering::Relaxed);
        debug!(period_ms = period.as_millis() as u64, "ticker started");
        *running = Some(Running { stop_tx, thread });
        true
    }

    pub fn stop(&self) -> bool {
        let taken = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(Running { stop_tx, thread }) = taken else {
            return false;
        };

        let _ = stop_tx.send(());
        // A tick callback may stop its own ticker; joining would deadlock.
        if thread.thread().id() != thread::current().id() {
            let _ = thread.join();
        }
        debug!("ticker stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn intervals_started(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
