//! Reference Manager (spec §3 "Reference Manager", §4.B).
//!
//! Holds the most recent playback samples, phase-anchored so the capture
//! loop can read a sample that is `delay_samples` behind the writer. Unlike
//! the generic [`crate::ring_buffer::RingBuffer`] (strict FIFO), reads here
//! are offset-addressed against the write cursor, so this is a hand-rolled
//! circular store — the same shape as `listening::buffer`'s `CircularBuffer`
//! (`Vec<T>` + `write_pos` + wraparound), generalized with the
//! delay/gain/freshness bookkeeping from `original_source` `modespsr.c`'s
//! `reference_manager_t`.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

struct Inner {
    data: Vec<i16>,
    capacity: usize,
    write_index: usize,
    read_index: usize,
    last_write: Option<Instant>,
    delay_samples: usize,
    gain_shift: u8,
    phase_initialized: bool,
    freshness_timeout: Duration,
}

impl Inner {
    fn anchor_read_index(&mut self) {
        let delay = self.delay_samples % self.capacity.max(1);
        self.read_index = (self.write_index + self.capacity - delay) % self.capacity;
        self.phase_initialized = true;
    }

    fn is_fresh(&self, now: Instant) -> bool {
        match self.last_write {
            Some(t) => now.saturating_duration_since(t) <= self.freshness_timeout,
            None => false,
        }
    }
}

/// Saturating left-shift used for reference-gain matching (§4.B, §9).
fn saturating_gain_shift(sample: i16, shift: u8) -> i16 {
    let shifted = (sample as i32) << shift;
    shifted.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

pub struct ReferenceManager {
    inner: Mutex<Inner>,
}

impl ReferenceManager {
    /// Create a manager with the given ring capacity (samples) and initial
    /// delay/gain/freshness settings.
    pub fn new(capacity_samples: usize, delay_samples: usize, gain_shift: u8, freshness_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                data: vec![0i16; capacity_samples.max(1)],
                capacity: capacity_samples.max(1),
                write_index: 0,
                read_index: 0,
                last_write: None,
                delay_samples,
                gain_shift,
                phase_initialized: false,
                freshness_timeout,
            }),
        }
    }

    /// Write playback samples into the store (§4.B "write").
    ///
    /// Applies the saturating gain shift, advances the write cursor, and —
    /// on the first write after construction, a `reconfigure`, or a
    /// freshness timeout — re-anchors the read cursor `delay_samples` behind
    /// the write cursor *as it stood before this write*, so the anchor lands
    /// behind the batch rather than inside it.
    pub fn write(&self, samples: &[i16]) {
        let mut inner = self.inner.lock();
        if !inner.phase_initialized {
            inner.anchor_read_index();
        }
        let gain_shift = inner.gain_shift;
        for &sample in samples {
            let scaled = saturating_gain_shift(sample, gain_shift);
            let idx = inner.write_index;
            inner.data[idx] = scaled;
            inner.write_index = (inner.write_index + 1) % inner.capacity;
        }
        inner.last_write = Some(Instant::now());
    }

    /// Read the next reference sample (§4.B "read_one").
    ///
    /// Returns 0 if not yet phase-anchored, or if the last write is older
    /// than `freshness_timeout` (in which case the phase anchor is cleared
    /// so the next write re-establishes it).
    pub fn read_one(&self) -> i16 {
        let mut sample = [0i16];
        self.read_into(&mut sample);
        sample[0]
    }

    /// Read a full frame of `out.len()` reference samples, holding the
    /// manager's lock for the whole batch (§4.C step 2, §5 discipline table:
    /// "reference mutex held across each full-frame read"). Without this, a
    /// concurrent `reconfigure` or `write` could land between individual
    /// samples and tear one capture frame across the old and new phase.
    pub fn read_into(&self, out: &mut [i16]) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        for slot in out.iter_mut() {
            if !inner.phase_initialized {
                *slot = 0;
                continue;
            }
            if !inner.is_fresh(now) {
                inner.phase_initialized = false;
                *slot = 0;
                continue;
            }
            let idx = inner.read_index;
            *slot = inner.data[idx];
            inner.read_index = (inner.read_index + 1) % inner.capacity;
        }
    }

    /// Whether the reference has been written to within `freshness_timeout`,
    /// without side effects — used by the capture loop to tag a frame's
    /// "reference recently active" flag (§4.C step 3) and by the detect
    /// loop's VAD gate (§4.D step 2).
    pub fn recently_active(&self) -> bool {
        let inner = self.inner.lock();
        inner.is_fresh(Instant::now())
    }

    /// Update delay/gain and clear the phase anchor so the next write
    /// re-establishes the invariant instead of mixing old- and new-delay
    /// samples (§4.B "reconfigure", §9).
    pub fn reconfigure(&self, delay_samples: usize, gain_shift: u8) {
        let mut inner = self.inner.lock();
        inner.delay_samples = delay_samples;
        inner.gain_shift = gain_shift;
        inner.phase_initialized = false;
    }

    /// Reset to the unwritten state: zeroed store, cursors at 0, not phase-anchored.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.data.iter_mut().for_each(|s| *s = 0);
        inner.write_index = 0;
        inner.read_index = 0;
        inner.phase_initialized = false;
        inner.last_write = None;
    }

    pub fn is_phase_initialized(&self) -> bool {
        self.inner.lock().phase_initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_manager_reads_zero() {
        let mgr = ReferenceManager::new(100, 10, 1, Duration::from_millis(100));
        assert_eq!(mgr.read_one(), 0);
        assert!(!mgr.is_phase_initialized());
    }

    #[test]
    fn phase_anchors_delay_samples_behind_writer() {
        let mgr = ReferenceManager::new(100, 3, 0, Duration::from_millis(100));
        let samples: Vec<i16> = (1..=10).collect();
        mgr.write(&samples);
        assert!(mgr.is_phase_initialized());

        // First 3 reads are the zeros that preceded the anchor point.
        assert_eq!(mgr.read_one(), 0);
        assert_eq!(mgr.read_one(), 0);
        assert_eq!(mgr.read_one(), 0);
        // Then the written samples in FIFO order.
        for expect in 1..=7 {
            assert_eq!(mgr.read_one(), expect as i16);
        }
    }

    #[test]
    fn freshness_timeout_resets_phase_and_reads_zero() {
        let mgr = ReferenceManager::new(100, 1, 0, Duration::from_millis(10));
        mgr.write(&[42]);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(mgr.read_one(), 0);
        assert!(!mgr.is_phase_initialized());
    }

    #[test]
    fn reconfigure_clears_phase_anchor() {
        let mgr = ReferenceManager::new(100, 5, 0, Duration::from_millis(100));
        mgr.write(&[1, 2, 3, 4, 5, 6]);
        assert!(mgr.is_phase_initialized());
        mgr.reconfigure(2, 0);
        assert!(!mgr.is_phase_initialized());
        mgr.write(&[7]);
        assert!(mgr.is_phase_initialized());
    }

    #[test]
    fn gain_shift_saturates_instead_of_wrapping() {
        let mgr = ReferenceManager::new(10, 0, 4, Duration::from_millis(1000));
        mgr.write(&[i16::MAX / 2, -(i16::MAX / 2)]);
        assert_eq!(mgr.read_one(), i16::MAX);
        assert_eq!(mgr.read_one(), i16::MIN);
    }

    #[test]
    fn recently_active_reflects_freshness_without_mutating_phase() {
        let mgr = ReferenceManager::new(10, 1, 0, Duration::from_millis(20));
        assert!(!mgr.recently_active());
        mgr.write(&[1]);
        assert!(mgr.recently_active());
        std::thread::sleep(Duration::from_millis(40));
        assert!(!mgr.recently_active());
        // Still phase-initialized: recently_active() doesn't clear it, only read_one() does.
        assert!(mgr.is_phase_initialized());
    }
}
