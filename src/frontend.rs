//! Acoustic front-end boundary (spec §1, §3 "Interleaved Frame").
//!
//! The AEC/noise-suppression/VAD algorithms inside the front-end are
//! explicitly out of scope (§1) — the capture and detect loops only need to
//! feed it interleaved stereo frames and fetch processed mono frames back.
//! Shaped after the habit of wrapping an external model behind a narrow
//! trait (`listening::detector::WakeWordDetector` around
//! `parakeet_rs::ParakeetTDT`) and the `recording::vad::create_vad` factory
//! pattern for constructing one from a config struct.
//!
//! Unlike the capture/playback channels (each touched by exactly one loop),
//! one front-end instance is fed by the Capture Loop and fetched from by the
//! Detect Loop concurrently (§2 data flow), so the trait takes `&self` and
//! implementations are responsible for their own internal synchronization —
//! the same contract a real AEC/NS engine designed for a feed task and a
//! fetch task already has to satisfy.

use crate::error::FrontEndError;

/// What the front-end hands back after processing one interleaved frame
/// (§4.D steps 1-3): its own speech/non-speech verdict, plus the cleaned
/// mono samples to hand onward to the command model.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    /// The front-end's own VAD verdict for this frame, before this crate's
    /// playback-energy suppression and debounce gating are applied.
    pub is_speech: bool,
    /// Cleaned mono samples, `feed_chunksize` long.
    pub samples: Vec<i16>,
}

/// The AEC + noise-suppression + VAD acoustic front-end (§1).
pub trait AcousticFrontEnd: Send + Sync {
    /// Samples per mono capture frame this front-end expects (§3 "Capture Frame").
    fn feed_chunksize(&self) -> usize;

    /// Submit one interleaved (mic, ref) stereo frame, `2 * feed_chunksize` samples.
    fn feed(&self, interleaved: &[i16]) -> Result<(), FrontEndError>;

    /// Block for the next processed frame corresponding to a prior `feed` call.
    fn fetch(&self) -> Result<ProcessedFrame, FrontEndError>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Front-end test double: echoes the mic channel of whatever it was fed
    /// back out as the processed frame, with a scripted sequence of VAD
    /// verdicts the test controls directly.
    pub struct ScriptedFrontEnd {
        chunksize: usize,
        inner: Mutex<Inner>,
    }

    struct Inner {
        vad_script: VecDeque<bool>,
        pending: VecDeque<ProcessedFrame>,
    }

    impl ScriptedFrontEnd {
        pub fn new(chunksize: usize, vad_script: impl IntoIterator<Item = bool>) -> Self {
            Self {
                chunksize,
                inner: Mutex::new(Inner {
                    vad_script: vad_script.into_iter().collect(),
                    pending: VecDeque::new(),
                }),
            }
        }
    }

    impl AcousticFrontEnd for ScriptedFrontEnd {
        fn feed_chunksize(&self) -> usize {
            self.chunksize
        }

        fn feed(&self, interleaved: &[i16]) -> Result<(), FrontEndError> {
            let mic: Vec<i16> = interleaved.iter().step_by(2).copied().collect();
            let mut inner = self.inner.lock();
            let is_speech = inner.vad_script.pop_front().unwrap_or(false);
            inner.pending.push_back(ProcessedFrame {
                is_speech,
                samples: mic,
            });
            Ok(())
        }

        fn fetch(&self) -> Result<ProcessedFrame, FrontEndError> {
            self.inner
                .lock()
                .pending
                .pop_front()
                .ok_or_else(|| FrontEndError::FetchFailed("no frame pending".to_string()))
        }
    }
}
