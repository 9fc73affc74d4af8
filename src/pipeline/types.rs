//! Data types shared by the scheduler and the synchronizer.

use crate::directive::{Command, Directive};
use serde::Serialize;

/// A directive placed on the speech timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedDirective {
    pub directive: Directive,
    /// Word the directive follows in the speakable text.
    pub word_index: usize,
    /// Estimated onset as a fraction of the whole utterance, in [0, 1].
    pub normalized_onset: f64,
    /// Onset in seconds of real audio, once the audio duration is known.
    pub resolved_onset: Option<f64>,
    /// One-shot latch. Set when the command is handed to the scheduler.
    pub fired: bool,
}

impl TimedDirective {
    pub fn new(directive: Directive, word_index: usize, normalized_onset: f64) -> Self {
        Self {
            directive,
            word_index,
            normalized_onset,
            resolved_onset: None,
            fired: false,
        }
    }

    pub fn command(&self) -> &Command {
        &self.directive.command
    }

    /// Whether the play-head at `position` has crossed an unfired onset.
    pub fn is_due(&self, position: f64) -> bool {
        !self.fired && self.resolved_onset.is_some_and(|onset| onset <= position)
    }
}

/// How an enqueued command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Executed to completion, including any hold or pattern.
    Completed,
    /// Not executed: unknown kind, missing value or unplayable pattern.
    Skipped,
    /// Dropped before execution because a full stop happened after enqueue.
    Discarded,
    /// Started, then cut short by a full stop.
    Cancelled,
}
