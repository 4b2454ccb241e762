//! Capture Loop (spec §4.C).
//!
//! Reads mic frames, interleaves them with delay-aligned reference samples,
//! forwards the interleaved frame to the front-end, and optionally side-taps
//! the raw mic samples into the recording ring. Isolated on its own thread
//! the way `audio::thread` isolates `CpalBackend` — except cancellation here
//! is a polled `running` flag (§5) rather than an `mpsc` command channel,
//! since this loop has nothing to respond to but "stop".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::channel::CaptureChannel;
use crate::detect::VadState;
use crate::diagnostics::Diagnostics;
use crate::frontend::AcousticFrontEnd;
use crate::reference::ReferenceManager;
use crate::ring_buffer::RingBuffer;

/// Sleep between retries after a failed or short mic read (§4.C "Failure semantics").
const RETRY_SLEEP: Duration = Duration::from_millis(5);

/// Everything the capture loop needs, bundled so `spawn` doesn't take a dozen
/// positional arguments (the same habit of bundling thread inputs into one
/// struct before handing them to `thread::spawn` used throughout this crate).
pub struct CaptureLoopResources {
    pub capture_channel: Box<dyn CaptureChannel>,
    pub reference: Arc<ReferenceManager>,
    pub front_end: Arc<dyn AcousticFrontEnd>,
    pub vad: Arc<VadState>,
    pub recording_ring: Arc<RingBuffer<i16>>,
    pub recording_enabled: Arc<AtomicBool>,
    pub diagnostics: Arc<Diagnostics>,
    pub feed_chunksize: usize,
    pub running: Arc<AtomicBool>,
}

/// Spawn the capture loop on a dedicated OS thread. Returns a handle the
/// caller joins after clearing `running`.
pub fn spawn(resources: CaptureLoopResources) -> JoinHandle<()> {
    thread::spawn(move || run(resources))
}

fn run(resources: CaptureLoopResources) {
    let CaptureLoopResources {
        mut capture_channel,
        reference,
        front_end,
        vad,
        recording_ring,
        recording_enabled,
        diagnostics,
        feed_chunksize,
        running,
    } = resources;

    log::info!("capture loop starting (feed_chunksize={feed_chunksize})");
    let mut mic = vec![0i16; feed_chunksize];
    let mut ref_frame = vec![0i16; feed_chunksize];
    let mut interleaved = vec![0i16; feed_chunksize * 2];

    while running.load(Ordering::Relaxed) {
        let n = match capture_channel.read(&mut mic) {
            Ok(n) => n,
            Err(e) => {
                log::trace!("capture read failed, retrying: {e}");
                thread::sleep(RETRY_SLEEP);
                continue;
            }
        };
        if n != feed_chunksize {
            // Short or zero-length read: transient, not a dropped frame (§4.C).
            thread::sleep(RETRY_SLEEP);
            continue;
        }

        // Read the whole frame's reference samples under one lock (§4.C step 2,
        // §5 discipline table), so a concurrent reconfigure/write can't tear
        // this frame across the old and new delay/phase.
        reference.read_into(&mut ref_frame);

        let mut mic_energy: u32 = 0;
        let mut ref_energy: u32 = 0;
        for i in 0..feed_chunksize {
            let mic_sample = mic[i];
            let ref_sample = ref_frame[i];
            interleaved[2 * i] = mic_sample;
            interleaved[2 * i + 1] = ref_sample;
            mic_energy = mic_energy.saturating_add(mic_sample.unsigned_abs() as u32);
            ref_energy = ref_energy.saturating_add(ref_sample.unsigned_abs() as u32);
        }
        let ref_active = reference.recently_active();
        vad.set_energies(mic_energy, ref_energy);

        if recording_enabled.load(Ordering::Relaxed) {
            recording_ring.write(&mic);
        }

        match front_end.feed(&interleaved) {
            Ok(()) => diagnostics.record_frame(),
            Err(e) => {
                diagnostics.record_dropped();
                log::debug!("front-end dropped a capture frame: {e}");
            }
        }

        diagnostics.maybe_log_summary(mic_energy, ref_energy, ref_active);
    }

    log::info!("capture loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_utils::FakeCaptureChannel;
    use crate::frontend::test_utils::ScriptedFrontEnd;
    use crate::ring_buffer::OverflowPolicy;
    use std::time::Duration as StdDuration;

    fn run_n_frames(mic_samples: Vec<i16>, chunksize: usize, frames: usize) -> Arc<VadState> {
        let running = Arc::new(AtomicBool::new(true));
        let vad = Arc::new(VadState::new());
        let reference = Arc::new(ReferenceManager::new(
            chunksize * 8,
            chunksize,
            0,
            StdDuration::from_millis(500),
        ));
        let front_end: Arc<dyn AcousticFrontEnd> =
            Arc::new(ScriptedFrontEnd::new(chunksize, std::iter::repeat(false)));
        let recording_ring = Arc::new(RingBuffer::<i16>::new(chunksize * 20, OverflowPolicy::Overwrite));
        let diagnostics = Arc::new(Diagnostics::new(StdDuration::from_secs(3600)));

        let resources = CaptureLoopResources {
            capture_channel: Box::new(FakeCaptureChannel::new(mic_samples)),
            reference,
            front_end,
            vad: vad.clone(),
            recording_ring,
            recording_enabled: Arc::new(AtomicBool::new(false)),
            diagnostics,
            feed_chunksize: chunksize,
            running: running.clone(),
        };

        let handle = spawn(resources);
        // Give the loop enough time to drain `frames` worth of samples, then stop it.
        thread::sleep(Duration::from_millis(20 * frames as u64));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();
        vad
    }

    #[test]
    fn records_mic_energy_from_captured_frame() {
        let chunksize = 4;
        let mic = vec![10i16, -10, 10, -10];
        let vad = run_n_frames(mic, chunksize, 1);
        let (mic_energy, _ref_energy) = vad.energies();
        assert_eq!(mic_energy, 40);
    }

    #[test]
    fn recording_tap_is_off_by_default() {
        let running = Arc::new(AtomicBool::new(true));
        let reference = Arc::new(ReferenceManager::new(32, 4, 0, StdDuration::from_millis(500)));
        let front_end: Arc<dyn AcousticFrontEnd> =
            Arc::new(ScriptedFrontEnd::new(4, std::iter::repeat(false)));
        let recording_ring = Arc::new(RingBuffer::<i16>::new(64, OverflowPolicy::Overwrite));

        let resources = CaptureLoopResources {
            capture_channel: Box::new(FakeCaptureChannel::new(vec![1i16, 2, 3, 4])),
            reference,
            front_end,
            vad: Arc::new(VadState::new()),
            recording_ring: recording_ring.clone(),
            recording_enabled: Arc::new(AtomicBool::new(false)),
            diagnostics: Arc::new(Diagnostics::new(StdDuration::from_secs(3600))),
            feed_chunksize: 4,
            running: running.clone(),
        };
        let handle = spawn(resources);
        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();
        assert_eq!(recording_ring.occupancy(), 0);
    }
}
