//! Compile-time command vocabulary and the results the detect loop publishes
//! (spec §3 "Recognition Result", §6, §10.5).
//!
//! Grounded in the static-definition half of `voice_commands::registry`,
//! simplified to a compile-time ordered list indexed by a numeric id rather
//! than a dynamically persisted, `Uuid`-keyed registry — the black-box
//! command model (§1) is what produces ids, this crate only needs to label
//! them.

use std::collections::HashMap;

/// Identifies a command in the vocabulary. Id 0 is always the wake phrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub u32);

impl CommandId {
    /// The reserved wake-word id.
    pub const WAKE: CommandId = CommandId(0);

    pub fn is_wake(self) -> bool {
        self == Self::WAKE
    }
}

/// A fixed, compile-time ordered list of phrases; index == `CommandId`.
///
/// Index 0 is the wake phrase. This is deliberately `&'static str` rather
/// than an owned, reloadable registry: the vocabulary is baked into the
/// command-recognition model at build time (§6), so there is nothing to
/// persist or mutate at runtime.
#[derive(Debug, Clone, Copy)]
pub struct CommandVocabulary {
    phrases: &'static [&'static str],
}

impl CommandVocabulary {
    /// Build a vocabulary from an ordered phrase list. Panics if empty —
    /// a vocabulary with no wake phrase is a configuration bug, not a
    /// runtime condition to handle gracefully.
    pub const fn new(phrases: &'static [&'static str]) -> Self {
        assert!(!phrases.is_empty(), "command vocabulary must include at least the wake phrase");
        Self { phrases }
    }

    /// Look up the phrase for a command id.
    pub fn phrase(&self, id: CommandId) -> Option<&'static str> {
        self.phrases.get(id.0 as usize).copied()
    }

    /// All commands as an id -> phrase mapping (`get_commands`, §4.F).
    pub fn get_commands(&self) -> HashMap<u32, String> {
        self.phrases
            .iter()
            .enumerate()
            .map(|(id, phrase)| (id as u32, phrase.to_string()))
            .collect()
    }
}

/// The tagged record a completed detection turns into (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionResult {
    /// Command id 0: the wake phrase.
    Wake,
    /// Any other command id, with its phrase resolved from the vocabulary.
    Command { id: CommandId, phrase: String },
    /// No result arrived within the caller's `listen` timeout.
    Timeout,
}

impl RecognitionResult {
    /// Build a Recognition Result from a raw command id, per spec §3/§4.D:
    /// id 0 is tagged wake, everything else is tagged command.
    pub fn from_command_id(id: u32, vocabulary: &CommandVocabulary) -> Self {
        let command_id = CommandId(id);
        if command_id.is_wake() {
            RecognitionResult::Wake
        } else {
            let phrase = vocabulary
                .phrase(command_id)
                .unwrap_or("<unknown>")
                .to_string();
            RecognitionResult::Command {
                id: command_id,
                phrase,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCAB: CommandVocabulary = CommandVocabulary::new(&["hey cat", "open the light", "close the light"]);

    #[test]
    fn id_zero_is_wake() {
        assert_eq!(
            RecognitionResult::from_command_id(0, &VOCAB),
            RecognitionResult::Wake
        );
    }

    #[test]
    fn nonzero_id_is_command_with_resolved_phrase() {
        assert_eq!(
            RecognitionResult::from_command_id(1, &VOCAB),
            RecognitionResult::Command {
                id: CommandId(1),
                phrase: "open the light".to_string(),
            }
        );
    }

    #[test]
    fn get_commands_maps_id_to_phrase() {
        let commands = VOCAB.get_commands();
        assert_eq!(commands.get(&0), Some(&"hey cat".to_string()));
        assert_eq!(commands.len(), 3);
    }

    #[test]
    fn unknown_id_resolves_to_placeholder_phrase() {
        match RecognitionResult::from_command_id(99, &VOCAB) {
            RecognitionResult::Command { id, phrase } => {
                assert_eq!(id, CommandId(99));
                assert_eq!(phrase, "<unknown>");
            }
            other => panic!("expected Command, got {other:?}"),
        }
    }
}
