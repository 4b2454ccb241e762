//! Detect Loop, VAD state, and the barge-in interrupt gate (spec §4.D, §10.7).
//!
//! Grounded in `recording::vad` and `listening::detector`'s debounce/gating
//! shape, generalized with the playback-energy suppression term and the
//! interrupt gate from `original_source` `modespsr_aec.h`'s `can_interrupt()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::{AecConfig, InterruptConfig};
use crate::frontend::AcousticFrontEnd;
use crate::model::{CommandModel, ModelOutcome};
use crate::pulse::PulseOutput;
use crate::reference::ReferenceManager;
use crate::vocabulary::{CommandVocabulary, RecognitionResult};

/// Sleep between retries after a failed front-end fetch (§7 "transient I/O errors").
const RETRY_SLEEP: Duration = Duration::from_millis(5);

struct VadInner {
    speaking: bool,
    debounce_streak: u32,
    mic_energy: u32,
    ref_energy: u32,
}

/// VAD State (spec §3): the boolean "speaking" flag plus debounce streak and
/// the two most recent frame energies. Energies are written by the Capture
/// Loop (§4.C step 3); `speaking` and the streak are written only by the
/// Detect Loop (§4.D step 2); `check_vad()` reads an instantaneous snapshot.
pub struct VadState {
    inner: Mutex<VadInner>,
}

impl VadState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VadInner {
                speaking: false,
                debounce_streak: 0,
                mic_energy: 0,
                ref_energy: 0,
            }),
        }
    }

    /// Capture Loop: record this frame's energies (§4.C step 3).
    pub fn set_energies(&self, mic_energy: u32, ref_energy: u32) {
        let mut inner = self.inner.lock();
        inner.mic_energy = mic_energy;
        inner.ref_energy = ref_energy;
    }

    /// Detect Loop: read the energies cached by the Capture Loop (§4.D step 2).
    pub fn energies(&self) -> (u32, u32) {
        let inner = self.inner.lock();
        (inner.mic_energy, inner.ref_energy)
    }

    /// Host: snapshot the speaking flag (`check_vad`, §4.F).
    pub fn is_speaking(&self) -> bool {
        self.inner.lock().speaking
    }

    /// Detect Loop: apply the qualifies/debounce update for one frame (§4.D
    /// step 2). Returns the resulting speaking flag.
    fn update(&self, qualifies: bool, debounce_needed: u32) -> bool {
        let mut inner = self.inner.lock();
        inner.debounce_streak = if qualifies {
            inner.debounce_streak + 1
        } else {
            0
        };
        inner.speaking = inner.debounce_streak >= debounce_needed;
        inner.speaking
    }
}

impl Default for VadState {
    fn default() -> Self {
        Self::new()
    }
}

struct GateInner {
    config: InterruptConfig,
    last_interrupt: Option<Instant>,
}

/// Barge-in interrupt gate (§10.7, supplemented from `original_source`).
///
/// Only applies while the reference is recently active (playback audible);
/// detections arriving with no playback in progress are never gated.
pub struct InterruptGate {
    inner: Mutex<GateInner>,
}

impl InterruptGate {
    pub fn new(config: InterruptConfig) -> Self {
        Self {
            inner: Mutex::new(GateInner {
                config,
                last_interrupt: None,
            }),
        }
    }

    pub fn reconfigure(&self, config: InterruptConfig) {
        self.inner.lock().config = config;
    }

    /// Decide whether a detection may be published (§4.D step 4). Records
    /// the acceptance time on success so the cooldown applies to the *next*
    /// detection.
    fn admit(&self, ref_recently_active: bool, mic_energy: u32) -> bool {
        if !ref_recently_active {
            return true;
        }
        let mut inner = self.inner.lock();
        if !inner.config.enabled {
            return true;
        }
        if mic_energy < inner.config.min_interrupt_energy {
            return false;
        }
        let now = Instant::now();
        if let Some(last) = inner.last_interrupt {
            if now.saturating_duration_since(last) < inner.config.cooldown {
                return false;
            }
        }
        inner.last_interrupt = Some(now);
        true
    }
}

/// Everything the detect loop needs (see `capture::CaptureLoopResources` for
/// the same bundling idiom).
pub struct DetectLoopResources {
    pub front_end: Arc<dyn AcousticFrontEnd>,
    pub model: Box<dyn CommandModel>,
    pub reference: Arc<ReferenceManager>,
    pub vad: Arc<VadState>,
    pub interrupt_gate: Arc<InterruptGate>,
    pub aec_config: Arc<Mutex<AecConfig>>,
    pub vocabulary: CommandVocabulary,
    pub result_sender: SyncSender<RecognitionResult>,
    pub pulse: Box<dyn PulseOutput>,
    pub running: Arc<AtomicBool>,
}

pub fn spawn(resources: DetectLoopResources) -> JoinHandle<()> {
    thread::spawn(move || run(resources))
}

fn run(resources: DetectLoopResources) {
    let DetectLoopResources {
        front_end,
        mut model,
        reference,
        vad,
        interrupt_gate,
        aec_config,
        vocabulary,
        result_sender,
        mut pulse,
        running,
    } = resources;

    log::info!("detect loop starting");

    while running.load(Ordering::Relaxed) {
        let frame = match front_end.fetch() {
            Ok(frame) => frame,
            Err(e) => {
                log::trace!("detect fetch failed, retrying: {e}");
                thread::sleep(RETRY_SLEEP);
                continue;
            }
        };

        let (mic_energy, ref_energy) = vad.energies();
        let ref_active = reference.recently_active();
        let (ratio, debounce_needed) = {
            let cfg = aec_config.lock();
            (cfg.energy_threshold_ratio, cfg.vad_debounce_needed)
        };
        let suppressed = ref_active && ref_energy > ratio.saturating_mul(mic_energy);
        let qualifies = frame.is_speech && !suppressed;
        vad.update(qualifies, debounce_needed);

        let outcome = match model.submit(&frame.samples) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("command model fetch failed, stopping detect loop: {e}");
                break;
            }
        };

        match outcome {
            ModelOutcome::Detecting | ModelOutcome::Timeout => {}
            ModelOutcome::Detected { top, probabilities } => {
                log::debug!("command model detected top-k: {probabilities:?}");
                if !interrupt_gate.admit(ref_active, mic_energy) {
                    log::debug!(
                        "dropped detection {top:?}: barge-in gate rejected it (ref_active={ref_active}, mic_energy={mic_energy})"
                    );
                    continue;
                }
                let result = RecognitionResult::from_command_id(top.0, &vocabulary);
                if result_sender.try_send(result).is_err() {
                    log::warn!("result queue full or closed, dropping a recognition result");
                }
                pulse.pulse();
            }
        }
    }

    log::info!("detect loop stopped");
}
