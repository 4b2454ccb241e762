//! Periodic pipeline diagnostics (§10.6).
//!
//! Grounded in `audio::diagnostics`: accumulate cheap counters on the hot
//! path and only log a summary every few seconds, rather than per frame
//! (16 kHz framing would otherwise flood the log). Verbosity is gated by an
//! env var the same way that module gates its own verbose logging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Check whether verbose per-summary diagnostics logging is enabled.
pub fn diagnostics_verbose() -> bool {
    std::env::var("VOICE_FE_DIAGNOSTICS_VERBOSE").is_ok()
}

/// Accumulates capture-loop counters and logs a periodic summary.
pub struct Diagnostics {
    frames_processed: AtomicU64,
    frames_dropped: AtomicU64,
    last_summary: Mutex<Instant>,
    interval: Duration,
}

impl Diagnostics {
    pub fn new(interval: Duration) -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            last_summary: Mutex::new(Instant::now()),
            interval,
        }
    }

    /// Record that one capture frame was produced.
    pub fn record_frame(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a frame was dropped (front-end or recording ring couldn't accept it, §4.C).
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Log a summary if `interval` has elapsed since the last one.
    pub fn maybe_log_summary(&self, mic_energy: u32, ref_energy: u32, ref_active: bool) {
        let mut last = self.last_summary.lock().unwrap();
        if last.elapsed() < self.interval {
            return;
        }
        *last = Instant::now();
        let processed = self.frames_processed.load(Ordering::Relaxed);
        let dropped = self.frames_dropped.load(Ordering::Relaxed);
        if diagnostics_verbose() {
            log::info!(
                "capture summary: frames={processed} dropped={dropped} mic_energy={mic_energy} ref_energy={ref_energy} ref_active={ref_active}"
            );
        } else {
            log::debug!("capture summary: frames={processed} dropped={dropped}");
        }
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let d = Diagnostics::new(Duration::from_secs(3));
        d.record_frame();
        d.record_frame();
        d.record_dropped();
        assert_eq!(d.frames_processed(), 2);
        assert_eq!(d.frames_dropped(), 1);
    }

    #[test]
    fn summary_does_not_log_before_interval_elapses() {
        let d = Diagnostics::new(Duration::from_secs(60));
        // No assertion on log output itself (no test logger installed here);
        // this only exercises that the rate limiting path doesn't panic and
        // doesn't reset the timer before the interval elapses.
        d.maybe_log_summary(0, 0, false);
        let first = *d.last_summary.lock().unwrap();
        d.maybe_log_summary(0, 0, false);
        let second = *d.last_summary.lock().unwrap();
        assert_eq!(first, second);
    }
}
