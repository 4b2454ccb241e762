//! Tunable parameters and their documented defaults (spec §6, §10.3).
//!
//! Mirrors the shape of other per-subsystem config structs in this
//! codebase's lineage (`WakeWordDetectorConfig`, `VadConfig`,
//! `MatcherConfig`): a plain struct with a `Default` impl carrying the
//! documented defaults below, plus `with_*` constructors for tests that need
//! something else.

/// Sample rate used throughout the pipeline. Changing it after `init` is a
/// non-goal (§1) — the value is fixed at construction time only.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Sane range for `gain_shift` (see §9 rationale on saturating left-shift).
pub const GAIN_SHIFT_MIN: u8 = 0;
pub const GAIN_SHIFT_MAX: u8 = 8;

/// Acoustic-echo-cancellation and VAD-gating parameters (spec §3 "AEC Parameters").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AecConfig {
    /// Delay between a playback sample and its echo arriving at the mic.
    pub delay_ms: u32,
    /// Saturating left-shift applied to reference samples before storage.
    pub gain_shift: u8,
    /// VAD is suppressed while `ref_energy > energy_threshold_ratio * mic_energy`
    /// and the reference is recently active.
    pub energy_threshold_ratio: u32,
    /// Consecutive qualifying frames required before `check_vad()` asserts.
    pub vad_debounce_needed: u32,
    /// Opaque mode passed through to the acoustic front-end's own VAD mode knob.
    pub vad_mode: u32,
    /// Maximum age of the last reference write before reads return zero.
    pub freshness_timeout: std::time::Duration,
}

impl Default for AecConfig {
    fn default() -> Self {
        Self {
            delay_ms: 30,
            gain_shift: 1,
            energy_threshold_ratio: 8,
            vad_debounce_needed: 6,
            vad_mode: 0,
            freshness_timeout: std::time::Duration::from_millis(100),
        }
    }
}

impl AecConfig {
    /// `delay_ms` converted to samples at `SAMPLE_RATE_HZ`.
    pub fn delay_samples(&self) -> usize {
        delay_ms_to_samples(self.delay_ms)
    }
}

/// Convert a delay in milliseconds to samples at `SAMPLE_RATE_HZ`. Shared by
/// `AecConfig::delay_samples` and the Control Surface's capacity check on
/// `set_aec_params`.
pub fn delay_ms_to_samples(delay_ms: u32) -> usize {
    (delay_ms as usize * SAMPLE_RATE_HZ as usize) / 1000
}

/// Sizes for the four process-wide ring buffers (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    /// Recording ring capacity, in samples.
    pub recording_capacity_samples: usize,
    /// Reference manager ring capacity, in samples.
    pub reference_capacity_samples: usize,
    /// Playback ring capacity, in bytes.
    pub playback_capacity_bytes: usize,
    /// Result queue depth, in Recognition Results.
    pub result_queue_depth: usize,
    /// How long the playback loop waits for data before it self-stops.
    pub playback_idle_timeout: std::time::Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            recording_capacity_samples: SAMPLE_RATE_HZ as usize * 10,
            reference_capacity_samples: SAMPLE_RATE_HZ as usize * 3,
            playback_capacity_bytes: 128 * 1024,
            result_queue_depth: 10,
            playback_idle_timeout: std::time::Duration::from_secs(8),
        }
    }
}

/// One capture frame's worth of mono samples, dimensioned by the front-end
/// (spec §3 "Capture Frame"). 30 ms at 16 kHz.
pub const FEED_CHUNKSIZE: usize = 480;

/// Playback chunk size: 30 ms of 16-bit mono audio at 16 kHz, in bytes.
pub const PLAYBACK_CHUNK_BYTES: usize = FEED_CHUNKSIZE * 2;

/// Barge-in / interrupt gate parameters (spec §10.7, supplemented from
/// `original_source` `modespsr_aec.h`'s `audio_config_t`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterruptConfig {
    /// Whether a detection arriving while playback is active may be accepted
    /// as a barge-in at all.
    pub enabled: bool,
    /// Minimum mic energy (sum of absolute sample values over a frame) for a
    /// detection during active playback to be treated as real rather than
    /// AEC residual noise.
    pub min_interrupt_energy: u32,
    /// Minimum time between two accepted barge-ins.
    pub cooldown: std::time::Duration,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interrupt_energy: 2_000,
            cooldown: std::time::Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_samples_matches_spec_default() {
        // 30ms @ 16kHz = 480 samples.
        assert_eq!(AecConfig::default().delay_samples(), 480);
    }

    #[test]
    fn delay_samples_scales_with_delay_ms() {
        let cfg = AecConfig {
            delay_ms: 60,
            ..AecConfig::default()
        };
        assert_eq!(cfg.delay_samples(), 960);
    }
}
