//! Rate-limited, single-flight admission control for analysis calls.
//!
//! All triggers (periodic, voice, gesture, manual, step confirmation) pass
//! through one gate: at most one request in flight, and at least the
//! configured interval between request starts. Frozen sessions suspend the
//! gate entirely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

/// Why the scheduler declined to start an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRefusal {
    /// An earlier request has not completed yet
    InFlight,
    /// The minimum interval since the last request start has not elapsed
    RateLimited,
    /// Analysis is suspended (frozen session)
    Suspended,
}

/// Clears the in-flight flag when dropped, so completion, failure, and panic
/// unwinding all release the gate the same way.
#[derive(Debug)]
pub struct FlightGuard {
    in_flight: Arc<AtomicBool>,
    last_started: Arc<Mutex<Option<Instant>>>,
}

impl FlightGuard {
    /// Stamp the rate-limit clock. Call once the request actually goes out;
    /// an admitted cycle that is abandoned beforehand (no frame ready, frame
    /// unusable) leaves the quota untouched.
    pub fn mark_started(&self) {
        let mut last_started = self
            .last_started
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last_started = Some(Instant::now());
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

/// The admission gate in front of the reasoning client.
pub struct AnalysisScheduler {
    in_flight: Arc<AtomicBool>,
    last_started: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
    suspended: AtomicBool,
}

impl AnalysisScheduler {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            in_flight: Arc::new(AtomicBool::new(false)),
            last_started: Arc::new(Mutex::new(None)),
            min_interval,
            suspended: AtomicBool::new(false),
        }
    }

    /// Try to admit one analysis request.
    ///
    /// On success the returned guard owns the in-flight slot; hold it across
    /// the whole request and drop it when the request finishes either way.
    /// The rate-limit clock is measured between request starts (the guard's
    /// `mark_started`), so a slow request does not earn extra quiet time
    /// after it completes, and an admitted cycle that never reaches the
    /// service does not consume quota.
    pub fn try_begin(&self) -> Result<FlightGuard, GateRefusal> {
        if self.suspended.load(Ordering::SeqCst) {
            debug!("Analysis gate: suspended");
            return Err(GateRefusal::Suspended);
        }

        // Claim the in-flight slot before touching the clock so two callers
        // cannot both pass the interval check.
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Analysis gate: request already in flight");
            return Err(GateRefusal::InFlight);
        }

        let last_started = self
            .last_started
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(started) = *last_started {
            let elapsed = started.elapsed();
            if elapsed < self.min_interval {
                self.in_flight.store(false, Ordering::SeqCst);
                debug!(
                    "Analysis gate: rate limited ({:?} since last start, minimum {:?})",
                    elapsed, self.min_interval
                );
                return Err(GateRefusal::RateLimited);
            }
        }
        drop(last_started);

        Ok(FlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            last_started: Arc::clone(&self.last_started),
        })
    }

    /// Suspend or resume the gate. While suspended every `try_begin` is
    /// refused; an already-admitted request is unaffected.
    pub fn set_suspended(&self, suspended: bool) {
        self.suspended.store(suspended, Ordering::SeqCst);
        debug!("Analysis gate suspended: {}", suspended);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }
}
