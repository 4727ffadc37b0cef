//! Session debouncing
//!
//! Coalesces a burst of triggers into a single flush that runs `timeout`
//! after the *last* trigger of the burst.
//!
//! The scheduler is a single actor thread reading a signal channel. The armed
//! deadline lives only on that thread, so trigger, cancel and expiry can never
//! interleave. The flush callback runs on the same thread: a trigger that
//! arrives during a flush is queued and arms the next cycle once the flush
//! returns, so two flushes never overlap.

use crate::error::Result;
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer armed
    Idle,
    /// Timer counting down to `deadline`
    Armed { deadline: Instant },
    /// Flush callback is executing
    Flushing,
}

enum Signal {
    Trigger(Instant),
    Stop,
}

enum Wakeup {
    Signal(Option<Signal>),
    Expired,
}

/// Cloneable handle for sending triggers from other threads
#[derive(Clone)]
pub struct TriggerHandle {
    tx: Sender<Signal>,
}

impl TriggerHandle {
    /// Arm the timer, or reset it if already armed
    ///
    /// Triggers sent after the scheduler stopped are dropped.
    pub fn trigger(&self) {
        let _ = self.tx.send(Signal::Trigger(Instant::now()));
    }
}

/// Debounce scheduler owning one deferred flush
pub struct DebounceScheduler {
    tx: Sender<Signal>,
    state: Arc<Mutex<SchedulerState>>,
    timeout: Duration,
    handle: Option<JoinHandle<()>>,
}

impl DebounceScheduler {
    /// Spawn the scheduler thread
    ///
    /// `flush` runs on the scheduler thread each time the quiet period
    /// elapses.
    pub fn start<F>(timeout: Duration, flush: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let state = Arc::new(Mutex::new(SchedulerState::Idle));

        let handle = thread::Builder::new()
            .name("debounce".to_string())
            .spawn({
                let state = state.clone();
                move || run_loop(rx, timeout, state, flush)
            })?;

        debug!("Debounce scheduler started (timeout: {:?})", timeout);

        Ok(Self {
            tx,
            state,
            timeout,
            handle: Some(handle),
        })
    }

    /// Arm the timer, or reset it if already armed
    pub fn trigger(&self) {
        let _ = self.tx.send(Signal::Trigger(Instant::now()));
    }

    /// Handle for triggering from another thread
    pub fn handle(&self) -> TriggerHandle {
        TriggerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// Quiet period length
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Stop the scheduler
    ///
    /// A flush already running finishes first. An armed timer is cancelled
    /// without firing.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tx.send(Signal::Stop);
            let _ = handle.join();
            info!("Debounce scheduler stopped");
        }
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Outcome of a timer expiry
#[derive(Debug, PartialEq, Eq)]
enum Expiry {
    Flush,
    Rearm(Instant),
}

/// Decide whether an expired timer flushes or is pushed back by a trigger
/// that was still queued when it fired
fn on_expiry(latest: Option<Instant>, timeout: Duration, now: Instant) -> Expiry {
    match latest.map(|at| at + timeout) {
        Some(next) if next > now => Expiry::Rearm(next),
        _ => Expiry::Flush,
    }
}

/// Empty the queue, keeping the newest trigger time
///
/// Returns `None` when a stop request was found.
fn drain_triggers(rx: &Receiver<Signal>, first: Option<Instant>) -> Option<Option<Instant>> {
    let mut latest = first;
    for signal in rx.try_iter() {
        match signal {
            Signal::Trigger(at) => latest = latest.max(Some(at)),
            Signal::Stop => return None,
        }
    }
    Some(latest)
}

fn run_loop<F>(
    rx: Receiver<Signal>,
    timeout: Duration,
    state: Arc<Mutex<SchedulerState>>,
    mut flush: F,
) where
    F: FnMut(),
{
    let mut deadline: Option<Instant> = None;

    loop {
        let timer = deadline.map_or_else(crossbeam_channel::never, crossbeam_channel::at);

        let wakeup = select! {
            recv(rx) -> signal => Wakeup::Signal(signal.ok()),
            recv(timer) -> _ => Wakeup::Expired,
        };

        match wakeup {
            Wakeup::Signal(Some(Signal::Trigger(at))) => {
                // Drain queued triggers so a backlog collapses into one deadline
                let Some(latest) = drain_triggers(&rx, Some(at)) else {
                    break;
                };

                let next = latest.unwrap_or(at) + timeout;
                if deadline.is_some() {
                    debug!("RESET timer");
                } else {
                    debug!("START timer");
                }
                deadline = Some(next);
                *state.lock() = SchedulerState::Armed { deadline: next };
            }
            Wakeup::Signal(Some(Signal::Stop)) | Wakeup::Signal(None) => break,
            Wakeup::Expired => {
                // A trigger may have become ready together with the timer
                let Some(latest) = drain_triggers(&rx, None) else {
                    break;
                };

                match on_expiry(latest, timeout, Instant::now()) {
                    Expiry::Rearm(next) => {
                        debug!("RESET timer");
                        deadline = Some(next);
                        *state.lock() = SchedulerState::Armed { deadline: next };
                    }
                    Expiry::Flush => {
                        deadline = None;
                        *state.lock() = SchedulerState::Flushing;
                        debug!("Timer expired, flushing");
                        flush();
                        *state.lock() = SchedulerState::Idle;
                    }
                }
            }
        }
    }

    if deadline.is_some() {
        debug!("Cancelled armed timer on shutdown");
    }
    *state.lock() = SchedulerState::Idle;
}
