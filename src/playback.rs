//! Playback Loop (spec §4.E).
//!
//! Drains the playback ring at a steady chunk cadence, mirrors each chunk
//! into the Reference Manager so the Capture Loop can read a delay-aligned
//! copy of what's playing, and writes width-converted samples to the output
//! channel. Isolated on its own thread the same way as Capture (§4.C) and
//! Detect (§4.D); self-stops on idle timeout in addition to responding to
//! an externally-set stop flag (§4.E state machine).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::channel::PlaybackChannel;
use crate::reference::ReferenceManager;
use crate::ring_buffer::RingBuffer;

/// How long to sleep when the ring doesn't yet hold a full chunk (§4.E step 1).
const POLL_SLEEP: Duration = Duration::from_millis(5);

pub struct PlaybackLoopResources {
    pub playback_channel: Box<dyn PlaybackChannel>,
    pub playback_ring: Arc<RingBuffer<u8>>,
    pub reference: Arc<ReferenceManager>,
    /// Chunk size in bytes (960 = 480 samples of 16-bit mono at 16 kHz, §4.E).
    pub chunk_bytes: usize,
    pub idle_timeout: Duration,
    /// Set by `stop_playback` (§4.F); the loop polls it between chunks.
    pub stop: Arc<AtomicBool>,
    /// Cleared by the loop itself on exit, for either reason, so
    /// `is_playback_running` reflects self-stop as well as explicit stop.
    pub running: Arc<AtomicBool>,
}

pub fn spawn(resources: PlaybackLoopResources) -> JoinHandle<()> {
    resources.running.store(true, Ordering::Relaxed);
    thread::spawn(move || run(resources))
}

fn run(resources: PlaybackLoopResources) {
    let PlaybackLoopResources {
        mut playback_channel,
        playback_ring,
        reference,
        chunk_bytes,
        idle_timeout,
        stop,
        running,
    } = resources;

    log::info!("playback loop starting (chunk_bytes={chunk_bytes})");
    let mut chunk = vec![0u8; chunk_bytes];
    let mut last_activity = Instant::now();

    loop {
        if stop.load(Ordering::Relaxed) {
            log::debug!("playback loop: stop requested");
            break;
        }

        if playback_ring.occupancy() < chunk_bytes {
            if last_activity.elapsed() > idle_timeout {
                log::info!("playback loop: idle timeout elapsed, self-stopping");
                break;
            }
            thread::sleep(POLL_SLEEP);
            continue;
        }

        let n = playback_ring.read(&mut chunk);
        debug_assert_eq!(n, chunk_bytes);
        last_activity = Instant::now();

        let samples: Vec<i16> = chunk
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        reference.write(&samples);

        // MSB-align into 32-bit slots for the output channel (§6).
        let widened: Vec<i32> = samples.iter().map(|&s| (s as i32) << 16).collect();
        if let Err(e) = playback_channel.write(&widened) {
            log::error!("playback channel write failed, stopping playback loop: {e}");
            break;
        }
    }

    running.store(false, Ordering::Relaxed);
    log::info!("playback loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_utils::FakePlaybackChannel;
    use crate::ring_buffer::OverflowPolicy;
    use std::time::Duration as StdDuration;

    fn push_chunk(ring: &RingBuffer<u8>, samples: &[i16]) {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        ring.write(&bytes);
    }

    #[test]
    fn writes_width_converted_samples_and_mirrors_reference() {
        let ring = Arc::new(RingBuffer::<u8>::new(4096, OverflowPolicy::Block));
        let samples: Vec<i16> = vec![100; 480];
        push_chunk(&ring, &samples);

        let reference = Arc::new(ReferenceManager::new(2000, 10, 0, StdDuration::from_millis(500)));
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(false));

        let resources = PlaybackLoopResources {
            playback_channel: Box::new(FakePlaybackChannel::default()),
            playback_ring: ring.clone(),
            reference: reference.clone(),
            chunk_bytes: 960,
            idle_timeout: StdDuration::from_millis(50),
            stop: stop.clone(),
            running: running.clone(),
        };
        let handle = spawn(resources);
        thread::sleep(StdDuration::from_millis(150));
        handle.join().unwrap();

        assert!(!running.load(Ordering::Relaxed));
        assert!(reference.is_phase_initialized());
    }

    #[test]
    fn idle_timeout_self_stops_and_clears_running() {
        let ring = Arc::new(RingBuffer::<u8>::new(4096, OverflowPolicy::Block));
        let reference = Arc::new(ReferenceManager::new(2000, 10, 0, StdDuration::from_millis(500)));
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(false));

        let resources = PlaybackLoopResources {
            playback_channel: Box::new(FakePlaybackChannel::default()),
            playback_ring: ring,
            reference,
            chunk_bytes: 960,
            idle_timeout: StdDuration::from_millis(20),
            stop: stop.clone(),
            running: running.clone(),
        };
        let handle = spawn(resources);
        assert!(running.load(Ordering::Relaxed));
        handle.join().unwrap();
        assert!(!running.load(Ordering::Relaxed));
    }

    #[test]
    fn write_failure_stops_the_loop() {
        let ring = Arc::new(RingBuffer::<u8>::new(4096, OverflowPolicy::Block));
        push_chunk(&ring, &vec![5i16; 480]);
        let reference = Arc::new(ReferenceManager::new(2000, 10, 0, StdDuration::from_millis(500)));
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(false));

        let resources = PlaybackLoopResources {
            playback_channel: Box::new(FakePlaybackChannel {
                written: Vec::new(),
                fail_after: Some(0),
            }),
            playback_ring: ring,
            reference,
            chunk_bytes: 960,
            idle_timeout: StdDuration::from_secs(5),
            stop: stop.clone(),
            running: running.clone(),
        };
        let handle = spawn(resources);
        handle.join().unwrap();
        assert!(!running.load(Ordering::Relaxed));
    }
}
