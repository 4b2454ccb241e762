//! Command-recognition model boundary (spec §1, §4.D step 3).
//!
//! Grounded in `parakeet::manager::TranscriptionManager`'s shape: a
//! lazily-loaded model wrapped behind a narrow result type, with errors
//! distinguishing "not loaded" from "call failed". The actual recognition
//! algorithm is out of scope (§1) — the detect loop only needs
//! `{detecting, timeout, detected}` back per frame.

use crate::error::ModelError;
use crate::vocabulary::CommandId;

/// Result of submitting one processed frame to the command model (§4.D step 3).
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutcome {
    /// Still accumulating evidence; no decision yet this frame.
    Detecting,
    /// The open listening window elapsed with no command recognized.
    /// Swallowed by the detect loop (§4.D) — emitted here only so tests can
    /// assert it is not forwarded to the host.
    Timeout,
    /// A command was recognized. `top` is the top-1 id; `probabilities` is
    /// the full top-k ranking (highest first) for diagnostic logging.
    Detected {
        top: CommandId,
        probabilities: Vec<(CommandId, f32)>,
    },
}

/// The command-recognition model (§1).
pub trait CommandModel: Send {
    /// Submit one processed mono frame (`frontend::ProcessedFrame::samples`).
    fn submit(&mut self, samples: &[i16]) -> Result<ModelOutcome, ModelError>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;
    use std::collections::VecDeque;

    /// Model test double driven by a scripted sequence of outcomes, one per
    /// `submit` call, repeating `Detecting` once the script is exhausted.
    #[derive(Default)]
    pub struct ScriptedCommandModel {
        script: VecDeque<ModelOutcome>,
    }

    impl ScriptedCommandModel {
        pub fn new(script: impl IntoIterator<Item = ModelOutcome>) -> Self {
            Self {
                script: script.into_iter().collect(),
            }
        }
    }

    impl CommandModel for ScriptedCommandModel {
        fn submit(&mut self, _samples: &[i16]) -> Result<ModelOutcome, ModelError> {
            Ok(self.script.pop_front().unwrap_or(ModelOutcome::Detecting))
        }
    }
}
