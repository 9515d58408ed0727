//! Translates interrupt signals and lock-file invalidation into the
//! cooperative shutdown flag every stage and the lock watcher consult
//! between work units.
//!
//! Three states: running, graceful-requested (first interrupt, SIGTERM, or
//! the lock watcher noticing the lock file is gone), and immediate (three
//! interrupts within a 2 second window, which exits the process directly
//! rather than waiting for in-progress work).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const INTERRUPT_WINDOW: Duration = Duration::from_secs(2);
const IMMEDIATE_THRESHOLD: usize = 3;
const IMMEDIATE_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    GracefulRequested,
    Immediate,
}

/// Drops timestamps older than `INTERRUPT_WINDOW` and pushes `now`,
/// returning whether the window now holds `IMMEDIATE_THRESHOLD` or more.
fn record_interrupt(interrupts: &mut VecDeque<Instant>, now: Instant) -> bool {
    while let Some(&oldest) = interrupts.front() {
        if now.duration_since(oldest) > INTERRUPT_WINDOW {
            interrupts.pop_front();
        } else {
            break;
        }
    }
    interrupts.push_back(now);
    interrupts.len() >= IMMEDIATE_THRESHOLD
}

#[derive(Clone)]
pub struct ShutdownCoordinator {
    shutdown_requested: Arc<AtomicBool>,
    interrupts: Arc<Mutex<VecDeque<Instant>>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        ShutdownCoordinator {
            shutdown_requested: Arc::new(AtomicBool::new(false)),
            interrupts: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// The shared flag: hand a clone to `archiver_lock::FileLock::spawn_watcher`
    /// and to the stage engine so every component observes the same signal.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown_requested)
    }

    pub fn state(&self) -> ShutdownState {
        if !self.shutdown_requested.load(Ordering::SeqCst) {
            return ShutdownState::Running;
        }
        let recent = self.interrupts.lock().unwrap().len();
        if recent >= IMMEDIATE_THRESHOLD {
            ShutdownState::Immediate
        } else {
            ShutdownState::GracefulRequested
        }
    }

    /// Register the process-wide SIGINT/SIGTERM handler. Call once, near
    /// startup. On the third interrupt within the 2 s window, exits the
    /// process immediately with code 130 rather than returning.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let shutdown_requested = Arc::clone(&self.shutdown_requested);
        let interrupts = Arc::clone(&self.interrupts);
        ctrlc::set_handler(move || {
            shutdown_requested.store(true, Ordering::SeqCst);
            let immediate = record_interrupt(&mut interrupts.lock().unwrap(), Instant::now());
            if immediate {
                tracing::warn!("third interrupt within 2s, exiting immediately");
                std::process::exit(IMMEDIATE_EXIT_CODE);
            } else {
                tracing::info!("interrupt received, requesting graceful shutdown");
            }
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_coordinator_is_running() {
        let coordinator = ShutdownCoordinator::new();
        assert_eq!(coordinator.state(), ShutdownState::Running);
    }

    #[test]
    fn setting_the_flag_directly_is_graceful_not_immediate() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.shutdown_flag().store(true, Ordering::SeqCst);
        assert_eq!(coordinator.state(), ShutdownState::GracefulRequested);
    }

    #[test]
    fn two_interrupts_within_the_window_stay_graceful() {
        let mut interrupts = VecDeque::new();
        let now = Instant::now();
        assert!(!record_interrupt(&mut interrupts, now));
        assert!(!record_interrupt(&mut interrupts, now + Duration::from_millis(500)));
    }

    #[test]
    fn three_interrupts_within_the_window_trip_immediate() {
        let mut interrupts = VecDeque::new();
        let now = Instant::now();
        assert!(!record_interrupt(&mut interrupts, now));
        assert!(!record_interrupt(&mut interrupts, now + Duration::from_millis(200)));
        assert!(record_interrupt(&mut interrupts, now + Duration::from_millis(400)));
    }

    #[test]
    fn interrupts_outside_the_window_do_not_accumulate() {
        let mut interrupts = VecDeque::new();
        let now = Instant::now();
        assert!(!record_interrupt(&mut interrupts, now));
        assert!(!record_interrupt(&mut interrupts, now + Duration::from_millis(100)));
        // well past the 2s window: the first two should have aged out
        assert!(!record_interrupt(&mut interrupts, now + Duration::from_secs(5)));
    }
}
