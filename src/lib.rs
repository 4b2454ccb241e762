//! Realtime audio routing core for an embedded voice front-end.
//!
//! `VoiceFrontEnd` is the process-wide context object (§9 "Global mutable
//! audio state"): created by `init`, destroyed by `cleanup`, and the sole
//! entry point every host binding call goes through (§4.F Control Surface).
//! Modelled after `listening::manager::ListeningManager` — state coordinated
//! through one struct rather than free-standing globals or a singleton.

pub mod capture;
pub mod channel;
pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod error;
pub mod frontend;
pub mod model;
pub mod playback;
pub mod pulse;
pub mod reference;
pub mod ring_buffer;
pub mod vocabulary;

// Re-export log macros so call sites write `voice_front_end_lib::info!(...)`
// without an extra `log` dependency of their own.
pub use log::{debug, error, info, trace, warn};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;

use capture::{spawn as spawn_capture, CaptureLoopResources};
use channel::{CaptureChannel, PlaybackChannel};
use config::{AecConfig, BufferConfig, InterruptConfig, GAIN_SHIFT_MAX, GAIN_SHIFT_MIN, SAMPLE_RATE_HZ};
use detect::{spawn as spawn_detect, DetectLoopResources, InterruptGate, VadState};
use diagnostics::Diagnostics;
use error::{AecError, Result};
use frontend::AcousticFrontEnd;
use model::CommandModel;
use playback::{spawn as spawn_playback, PlaybackLoopResources};
use pulse::PulseOutput;
use reference::ReferenceManager;
use ring_buffer::{OverflowPolicy, RingBuffer};
use vocabulary::{CommandVocabulary, RecognitionResult};

/// How long `cleanup`/`stop_playback` wait for a loop thread to notice its
/// `running`/`stop` flag before giving up on the join (§5 "Cancellation / timeouts").
const FAST_LOOP_JOIN_TIMEOUT: Duration = Duration::from_millis(200);
const PLAYBACK_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Construction inputs for `init` — the capture/playback channels, the
/// front-end, the command model, the vocabulary, and the tunable configs.
/// Everything out of scope (§1) is supplied by the host as a trait object;
/// a host with no real hardware/model yet can pass the `Unconfigured*`
/// placeholders and get a clean `ChannelError` instead of undefined behavior.
pub struct VoiceFrontEndInit {
    pub capture_channel: Box<dyn CaptureChannel>,
    pub front_end: Arc<dyn AcousticFrontEnd>,
    pub model: Box<dyn CommandModel>,
    pub pulse: Box<dyn PulseOutput>,
    pub vocabulary: CommandVocabulary,
    pub aec_config: AecConfig,
    pub buffer_config: BufferConfig,
    pub interrupt_config: InterruptConfig,
}

struct RunningLoops {
    capture_running: Arc<AtomicBool>,
    capture_thread: JoinHandle<()>,
    detect_running: Arc<AtomicBool>,
    detect_thread: JoinHandle<()>,
}

struct PlaybackLoopHandle {
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Process-wide state (§3 "Process-wide state", §9). All loops and every
/// Control Surface operation go through this one struct. The Playback Loop
/// is started/stopped independently of `init`/`cleanup` via
/// `start_playback`/`stop_playback` since it has its own stopped/running
/// lifecycle (§4.E).
pub struct VoiceFrontEnd {
    reference: Arc<ReferenceManager>,
    recording_ring: Arc<RingBuffer<i16>>,
    recording_enabled: Arc<AtomicBool>,
    playback_ring: Arc<RingBuffer<u8>>,
    result_sender: Mutex<Option<SyncSender<RecognitionResult>>>,
    result_receiver: Mutex<Receiver<RecognitionResult>>,
    vad: Arc<VadState>,
    interrupt_gate: Arc<InterruptGate>,
    aec_config: Arc<Mutex<AecConfig>>,
    buffer_config: BufferConfig,
    vocabulary: CommandVocabulary,
    diagnostics: Arc<Diagnostics>,

    loops: Mutex<Option<RunningLoops>>,
    playback: Mutex<Option<PlaybackLoopHandle>>,
}

impl VoiceFrontEnd {
    /// `init` (§4.F): allocates the ring buffers, creates the mutexes, and
    /// starts the Capture and Detect loops. Returns a configuration error
    /// without touching any shared state if `gain_shift` is out of range.
    pub fn init(init: VoiceFrontEndInit) -> Result<Self> {
        let VoiceFrontEndInit {
            capture_channel,
            front_end,
            model,
            pulse,
            vocabulary,
            aec_config,
            buffer_config,
            interrupt_config,
        } = init;

        if !(GAIN_SHIFT_MIN..=GAIN_SHIFT_MAX).contains(&aec_config.gain_shift) {
            return Err(AecError::InvalidGainShift(aec_config.gain_shift).into());
        }
        let delay_samples = aec_config.delay_samples();
        check_delay_fits(aec_config.delay_ms, delay_samples, buffer_config.reference_capacity_samples)?;

        let reference = Arc::new(ReferenceManager::new(
            buffer_config.reference_capacity_samples,
            delay_samples,
            aec_config.gain_shift,
            aec_config.freshness_timeout,
        ));
        let recording_ring = Arc::new(RingBuffer::<i16>::new(
            buffer_config.recording_capacity_samples,
            OverflowPolicy::Overwrite,
        ));
        let playback_ring = Arc::new(RingBuffer::<u8>::new(
            buffer_config.playback_capacity_bytes,
            OverflowPolicy::Block,
        ));
        let (result_sender, result_receiver) = mpsc::sync_channel(buffer_config.result_queue_depth);
        let vad = Arc::new(VadState::new());
        let interrupt_gate = Arc::new(InterruptGate::new(interrupt_config));
        let aec_config = Arc::new(Mutex::new(aec_config));
        let diagnostics = Arc::new(Diagnostics::new(Duration::from_secs(3)));
        let recording_enabled = Arc::new(AtomicBool::new(false));

        let capture_running = Arc::new(AtomicBool::new(true));
        let capture_thread = spawn_capture(CaptureLoopResources {
            capture_channel,
            reference: reference.clone(),
            front_end: front_end.clone(),
            vad: vad.clone(),
            recording_ring: recording_ring.clone(),
            recording_enabled: recording_enabled.clone(),
            diagnostics: diagnostics.clone(),
            feed_chunksize: front_end.feed_chunksize(),
            running: capture_running.clone(),
        });

        let detect_running = Arc::new(AtomicBool::new(true));
        let detect_thread = spawn_detect(DetectLoopResources {
            front_end,
            model,
            reference: reference.clone(),
            vad: vad.clone(),
            interrupt_gate: interrupt_gate.clone(),
            aec_config: aec_config.clone(),
            vocabulary,
            result_sender: result_sender.clone(),
            pulse,
            running: detect_running.clone(),
        });

        log::info!("voice front-end initialized");

        Ok(Self {
            reference,
            recording_ring,
            recording_enabled,
            playback_ring,
            result_sender: Mutex::new(Some(result_sender)),
            result_receiver: Mutex::new(result_receiver),
            vad,
            interrupt_gate,
            aec_config,
            buffer_config,
            vocabulary,
            diagnostics,
            loops: Mutex::new(Some(RunningLoops {
                capture_running,
                capture_thread,
                detect_running,
                detect_thread,
            })),
            playback: Mutex::new(None),
        })
    }

    /// `cleanup` (§4.F): stop all loops and wait bounded. Safe to call more
    /// than once; a second call is a no-op.
    pub fn cleanup(&self) {
        self.stop_playback();

        if let Some(loops) = self.loops.lock().take() {
            loops.capture_running.store(false, Ordering::Relaxed);
            loops.detect_running.store(false, Ordering::Relaxed);
            join_with_timeout(loops.capture_thread, FAST_LOOP_JOIN_TIMEOUT, "capture");
            join_with_timeout(loops.detect_thread, FAST_LOOP_JOIN_TIMEOUT, "detect");
            log::info!("voice front-end cleaned up");
        }
        // Dropping the sender unblocks a `listen` call mid-recv with a
        // disconnected-channel error, which `listen` turns into `timeout`
        // rather than hanging past the caller's requested timeout.
        self.result_sender.lock().take();
    }

    /// `listen(timeout_ms)` (§4.F): dequeue one Recognition Result.
    pub fn listen(&self, timeout: Duration) -> RecognitionResult {
        match self.result_receiver.lock().recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => RecognitionResult::Timeout,
        }
    }

    /// `get_commands()` (§4.F): id -> phrase mapping.
    pub fn get_commands(&self) -> std::collections::HashMap<u32, String> {
        self.vocabulary.get_commands()
    }

    /// `feed_reference(samples)` (§4.F): direct reference write, for hosts
    /// that drive playback externally instead of through `feed_playback`.
    pub fn feed_reference(&self, samples: &[i16]) {
        self.reference.write(samples);
    }

    /// `start_recording()` (§4.F): clears the recording ring, then enables the tap.
    pub fn start_recording(&self) {
        self.recording_ring.clear();
        self.recording_enabled.store(true, Ordering::Relaxed);
    }

    /// `stop_recording()` (§4.F).
    pub fn stop_recording(&self) {
        self.recording_enabled.store(false, Ordering::Relaxed);
    }

    /// `read_audio(buffer)` (§4.F): non-blocking pull from the recording ring.
    pub fn read_audio(&self, buffer: &mut [i16]) -> usize {
        self.recording_ring.read(buffer)
    }

    /// `start_playback()` (§4.F): clears the playback ring and spawns the
    /// loop. No-op if the loop is already running.
    pub fn start_playback(&self, playback_channel: Box<dyn PlaybackChannel>) {
        let mut slot = self.playback.lock();
        if slot.is_some() {
            return;
        }
        self.playback_ring.clear();
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(false));
        let thread = spawn_playback(PlaybackLoopResources {
            playback_channel,
            playback_ring: self.playback_ring.clone(),
            reference: self.reference.clone(),
            chunk_bytes: config::PLAYBACK_CHUNK_BYTES,
            idle_timeout: self.buffer_config.playback_idle_timeout,
            stop: stop.clone(),
            running: running.clone(),
        });
        *slot = Some(PlaybackLoopHandle {
            stop,
            running,
            thread,
        });
    }

    /// `stop_playback()` (§4.F): request stop and wait bounded. No-op if not running.
    pub fn stop_playback(&self) {
        if let Some(handle) = self.playback.lock().take() {
            handle.stop.store(true, Ordering::Relaxed);
            join_with_timeout(handle.thread, PLAYBACK_JOIN_TIMEOUT, "playback");
        }
    }

    /// `is_playback_running()` (§4.F).
    pub fn is_playback_running(&self) -> bool {
        match self.playback.lock().as_ref() {
            Some(handle) => handle.running.load(Ordering::Relaxed),
            None => false,
        }
    }

    /// `feed_playback(bytes)` (§4.F): non-blocking push, short-counts on full.
    pub fn feed_playback(&self, bytes: &[u8]) -> usize {
        self.playback_ring.write(bytes)
    }

    /// `check_vad()` (§4.F).
    pub fn check_vad(&self) -> bool {
        self.vad.is_speaking()
    }

    /// `set_aec_params(delay_ms, gain_shift, energy_ratio)` (§4.F): clamps
    /// `gain_shift` to the documented sane range and rejects out-of-range
    /// requests rather than silently saturating (§9).
    pub fn set_aec_params(&self, delay_ms: u32, gain_shift: u8, energy_ratio: u32) -> Result<()> {
        if !(GAIN_SHIFT_MIN..=GAIN_SHIFT_MAX).contains(&gain_shift) {
            return Err(AecError::InvalidGainShift(gain_shift).into());
        }
        let delay_samples = config::delay_ms_to_samples(delay_ms);
        check_delay_fits(delay_ms, delay_samples, self.buffer_config.reference_capacity_samples)?;
        let mut cfg = self.aec_config.lock();
        cfg.delay_ms = delay_ms;
        cfg.gain_shift = gain_shift;
        cfg.energy_threshold_ratio = energy_ratio;
        drop(cfg);
        self.reference.reconfigure(delay_samples, gain_shift);
        log::info!(
            "AEC params updated: delay_ms={delay_ms} gain_shift={gain_shift} energy_ratio={energy_ratio}"
        );
        Ok(())
    }

    /// `set_interrupt_params(min_interrupt_energy, cooldown_ms, enabled)` (§4.F, §10.7).
    pub fn set_interrupt_params(&self, min_interrupt_energy: u32, cooldown: Duration, enabled: bool) {
        self.interrupt_gate.reconfigure(InterruptConfig {
            enabled,
            min_interrupt_energy,
            cooldown,
        });
    }

    /// Cumulative capture diagnostics (§10.6): `(frames_processed, frames_dropped)`.
    pub fn diagnostics_snapshot(&self) -> (u64, u64) {
        (self.diagnostics.frames_processed(), self.diagnostics.frames_dropped())
    }
}

impl Drop for VoiceFrontEnd {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn join_with_timeout(thread: JoinHandle<()>, timeout: Duration, name: &str) {
    // `JoinHandle` has no timed join; loops are expected to notice a cleared
    // running/stop flag within a handful of milliseconds (§5's poll
    // interval), so a short sleep-then-join keeps `cleanup`/`stop_playback`
    // from hanging indefinitely on a stuck loop.
    let start = std::time::Instant::now();
    while !thread.is_finished() && start.elapsed() < timeout {
        std::thread::sleep(Duration::from_millis(5));
    }
    if let Err(e) = thread.join() {
        log::error!("{name} loop thread panicked: {e:?}");
    }
}

/// Reject a delay that would wrap around the reference ring instead of
/// landing the requested number of samples behind the writer (§9).
fn check_delay_fits(delay_ms: u32, delay_samples: usize, reference_capacity_samples: usize) -> Result<()> {
    if delay_samples > reference_capacity_samples {
        let capacity_ms = (reference_capacity_samples as u64 * 1000 / SAMPLE_RATE_HZ as u64) as u32;
        return Err(AecError::DelayExceedsCapacity { delay_ms, capacity_ms }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel::test_utils::{FakeCaptureChannel, FakePlaybackChannel};
    use frontend::test_utils::ScriptedFrontEnd;
    use model::test_utils::ScriptedCommandModel;
    use model::ModelOutcome;
    use pulse::test_utils::CountingPulseOutput;
    use vocabulary::CommandId;

    const VOCAB: CommandVocabulary = CommandVocabulary::new(&["hey cat", "open the light"]);

    fn init_with(
        capture_samples: Vec<i16>,
        vad_script: Vec<bool>,
        model_script: Vec<ModelOutcome>,
    ) -> VoiceFrontEnd {
        let chunksize = 4;
        VoiceFrontEnd::init(VoiceFrontEndInit {
            capture_channel: Box::new(FakeCaptureChannel::new(capture_samples)),
            front_end: Arc::new(ScriptedFrontEnd::new(chunksize, vad_script)),
            model: Box::new(ScriptedCommandModel::new(model_script)),
            pulse: Box::new(CountingPulseOutput::default()),
            vocabulary: VOCAB,
            aec_config: AecConfig::default(),
            buffer_config: BufferConfig {
                recording_capacity_samples: 64,
                reference_capacity_samples: 4096,
                playback_capacity_bytes: 4096,
                result_queue_depth: 4,
                playback_idle_timeout: Duration::from_millis(50),
            },
            interrupt_config: InterruptConfig::default(),
        })
        .unwrap()
    }

    #[test]
    fn listen_times_out_with_no_commands_detected() {
        let fe = init_with(vec![0i16; 400], vec![false; 100], vec![ModelOutcome::Detecting; 100]);
        assert_eq!(fe.listen(Duration::from_millis(50)), RecognitionResult::Timeout);
        assert!(!fe.check_vad());
        fe.cleanup();
    }

    #[test]
    fn wake_detection_is_published_to_listen() {
        let fe = init_with(
            vec![1i16; 400],
            vec![true; 100],
            vec![ModelOutcome::Detected {
                top: CommandId::WAKE,
                probabilities: vec![(CommandId::WAKE, 0.99)],
            }],
        );
        assert_eq!(fe.listen(Duration::from_millis(500)), RecognitionResult::Wake);
        fe.cleanup();
    }

    #[test]
    fn set_aec_params_rejects_out_of_range_gain_shift() {
        let fe = init_with(vec![], vec![], vec![]);
        let err = fe.set_aec_params(30, 200, 8).unwrap_err();
        assert!(matches!(
            err,
            error::VoiceFrontEndError::Aec(AecError::InvalidGainShift(200))
        ));
        fe.cleanup();
    }

    #[test]
    fn set_aec_params_rejects_delay_exceeding_reference_capacity() {
        let fe = init_with(vec![], vec![], vec![]);
        // 1000ms @ 16kHz = 16_000 samples, past init_with's 4096-sample ring.
        let err = fe.set_aec_params(1000, 1, 8).unwrap_err();
        assert!(matches!(
            err,
            error::VoiceFrontEndError::Aec(AecError::DelayExceedsCapacity {
                delay_ms: 1000,
                ..
            })
        ));
        fe.cleanup();
    }

    #[test]
    fn recording_round_trips_through_the_ring() {
        let fe = init_with(vec![7i16; 400], vec![false; 100], vec![ModelOutcome::Detecting; 100]);
        fe.start_recording();
        std::thread::sleep(Duration::from_millis(60));
        fe.stop_recording();
        let mut buf = [0i16; 64];
        let n = fe.read_audio(&mut buf);
        assert!(n > 0);
        assert!(buf[..n].iter().all(|&s| s == 7));
        fe.cleanup();
    }

    #[test]
    fn playback_self_stops_after_idle_timeout() {
        let fe = init_with(vec![], vec![], vec![]);
        fe.start_playback(Box::new(FakePlaybackChannel::default()));
        fe.feed_playback(&vec![0u8; 960]);
        std::thread::sleep(Duration::from_millis(200));
        assert!(!fe.is_playback_running());
        fe.cleanup();
    }

    #[test]
    fn get_commands_exposes_the_vocabulary() {
        let fe = init_with(vec![], vec![], vec![]);
        let commands = fe.get_commands();
        assert_eq!(commands.get(&0), Some(&"hey cat".to_string()));
        fe.cleanup();
    }
}
