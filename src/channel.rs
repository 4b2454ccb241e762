//! Capture/playback hardware channel boundaries (spec §1, §6, §10.4).
//!
//! PDM and standard serial-audio drivers are out of scope for this core —
//! the capture and detect/playback loops only need *some* blocking
//! read/write channel. Shaped like `AudioCaptureBackend` in `audio::thread`:
//! a narrow interface hiding a non-`Send` hardware resource isolated on its
//! own thread, generalized to cover both capture and playback and stripped
//! of the cpal/CoreAudio specifics that don't apply to a PDM/I2S embedded
//! target.

use crate::error::ChannelError;

/// Blocking source of mono 16-bit PCM samples from the PDM microphone (§4.C step 1).
pub trait CaptureChannel: Send {
    /// Block until samples are available and fill as much of `buf` as
    /// possible. A short or zero read is not an error by itself — the
    /// capture loop treats it as transient and retries after a short sleep
    /// (§4.C "Failure semantics").
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, ChannelError>;
}

/// Blocking sink for 32-bit MSB-aligned PCM samples to the serial-audio
/// output (§4.E step 4, §6 "Audio formats").
pub trait PlaybackChannel: Send {
    /// Block until `samples` have been written in full. A write error is
    /// fatal (§7) — the playback loop exits and leaves the system stopped.
    fn write(&mut self, samples: &[i32]) -> Result<(), ChannelError>;
}

/// Placeholder production capture channel.
///
/// Documents the PDM binding point named in §6 ("clock pin and data pin
/// named in config") without implementing the driver itself, which is
/// explicitly out of scope (§1). A host linking real hardware support
/// supplies its own `CaptureChannel` and never needs to touch this type.
#[derive(Debug, Default)]
pub struct UnconfiguredCaptureChannel;

impl CaptureChannel for UnconfiguredCaptureChannel {
    fn read(&mut self, _buf: &mut [i16]) -> Result<usize, ChannelError> {
        Err(ChannelError::OpenFailed(
            "no PDM capture driver linked for this build".to_string(),
        ))
    }
}

/// Placeholder production playback channel; see [`UnconfiguredCaptureChannel`].
#[derive(Debug, Default)]
pub struct UnconfiguredPlaybackChannel;

impl PlaybackChannel for UnconfiguredPlaybackChannel {
    fn write(&mut self, _samples: &[i32]) -> Result<(), ChannelError> {
        Err(ChannelError::OpenFailed(
            "no serial-audio playback driver linked for this build".to_string(),
        ))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory capture channel backed by a queue of pre-seeded samples.
    /// Returns a short read of 0 once drained, so callers can exercise the
    /// capture loop's "zero-length read -> sleep and retry" path. Paces
    /// reads with a small per-call sleep so tests that toggle state (e.g.
    /// `start_recording`) shortly after spawning the capture loop have a
    /// realistic window to land before the fake source drains — a real PDM
    /// channel would block for roughly a frame period per read, not return
    /// instantly.
    #[derive(Debug)]
    pub struct FakeCaptureChannel {
        pending: VecDeque<i16>,
        pub read_pacing: std::time::Duration,
    }

    impl Default for FakeCaptureChannel {
        fn default() -> Self {
            Self {
                pending: VecDeque::new(),
                read_pacing: std::time::Duration::from_millis(1),
            }
        }
    }

    impl FakeCaptureChannel {
        pub fn new(samples: impl IntoIterator<Item = i16>) -> Self {
            Self {
                pending: samples.into_iter().collect(),
                ..Self::default()
            }
        }

        pub fn push(&mut self, samples: &[i16]) {
            self.pending.extend(samples.iter().copied());
        }
    }

    impl CaptureChannel for FakeCaptureChannel {
        fn read(&mut self, buf: &mut [i16]) -> Result<usize, ChannelError> {
            std::thread::sleep(self.read_pacing);
            let mut n = 0;
            while n < buf.len() {
                match self.pending.pop_front() {
                    Some(sample) => {
                        buf[n] = sample;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    /// In-memory playback sink that records every sample it is asked to write.
    #[derive(Debug, Default)]
    pub struct FakePlaybackChannel {
        pub written: Vec<i32>,
        pub fail_after: Option<usize>,
    }

    impl PlaybackChannel for FakePlaybackChannel {
        fn write(&mut self, samples: &[i32]) -> Result<(), ChannelError> {
            if let Some(limit) = self.fail_after {
                if self.written.len() >= limit {
                    return Err(ChannelError::Io("simulated output failure".to_string()));
                }
            }
            self.written.extend_from_slice(samples);
            Ok(())
        }
    }
}
