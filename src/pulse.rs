//! One-shot GPIO pulse output (spec §1, §4.D step 4).
//!
//! Out of scope as a driver (§1) — grounded in `original_source`
//! `modespsr.c`'s `init_pulse_gpio()`/`send_pulse()` (set pin high, hold for
//! `PULSE_DURATION_MS`, set low) only to the extent of defining the trait
//! the detect loop fires into when a command is recognized.

/// Fired once per recognized command (§4.D step 4).
pub trait PulseOutput: Send {
    fn pulse(&mut self);
}

/// No-op pulse output: the default when a host has no external signalling
/// wired up.
#[derive(Debug, Default)]
pub struct NoopPulseOutput;

impl PulseOutput for NoopPulseOutput {
    fn pulse(&mut self) {}
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Records how many times it fired, for assertions.
    #[derive(Debug, Default)]
    pub struct CountingPulseOutput {
        pub count: usize,
    }

    impl PulseOutput for CountingPulseOutput {
        fn pulse(&mut self) {
            self.count += 1;
        }
    }
}
