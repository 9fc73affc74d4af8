//! Playback synchronizer: fires directives as the play-head crosses them.
//!
//! When a message is prepared each directive is pinned to the word it
//! follows and given an estimated onset as a fraction of the utterance. Once
//! the real audio duration is known the fractions become seconds, and every
//! position update enqueues the directives whose onset has been reached.
//! Each directive fires at most once per loaded resource; seeking backward
//! does not re-fire it.

use super::scheduler::CommandScheduler;
use super::types::TimedDirective;
use crate::directive::{Directive, SpeakableText, speakable};
use crate::speech::estimate;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// A message ready for synthesis.
#[derive(Debug, Clone)]
pub struct PreparedMessage {
    pub speakable: SpeakableText,
    pub timeline: Vec<TimedDirective>,
}

pub struct PlaybackSynchronizer {
    scheduler: Arc<CommandScheduler>,
    words_per_minute: f64,
    timeline: Mutex<Vec<TimedDirective>>,
}

impl PlaybackSynchronizer {
    pub fn new(scheduler: Arc<CommandScheduler>, words_per_minute: f64) -> Self {
        Self {
            scheduler,
            words_per_minute,
            timeline: Mutex::new(Vec::new()),
        }
    }

    fn timeline_mut(&self) -> MutexGuard<'_, Vec<TimedDirective>> {
        match self.timeline.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace the timeline with the directives of a new message.
    ///
    /// Performs a full stop first, so nothing from the previous message keeps
    /// running.
    pub fn prepare_message(&self, text: &str, directives: Vec<Directive>) -> PreparedMessage {
        self.scheduler.full_stop();

        let speakable = speakable(text);
        let estimate = estimate(&speakable.text, self.words_per_minute);

        let timeline: Vec<TimedDirective> = directives
            .into_iter()
            .map(|directive| {
                let word_index = speakable.word_index_at(directive.source_offset);
                let onset = estimate.normalized_onset(word_index);
                TimedDirective::new(directive, word_index, onset)
            })
            .collect();

        info!(
            "Prepared message: {} words, ~{:.2}s estimated, {} directives",
            speakable.words.len(),
            estimate.total_seconds,
            timeline.len()
        );
        for timed in &timeline {
            debug!(
                "  {} at word {} ({:.3})",
                timed.command().kind.as_str(),
                timed.word_index,
                timed.normalized_onset
            );
        }

        *self.timeline_mut() = timeline.clone();
        PreparedMessage {
            speakable,
            timeline,
        }
    }

    /// A new resource started loading: every latch opens again.
    pub fn on_resource_loading(&self) {
        for timed in self.timeline_mut().iter_mut() {
            timed.fired = false;
            timed.resolved_onset = None;
        }
    }

    /// The resource is playable and lasts `duration_secs`.
    pub fn on_resource_ready(&self, duration_secs: f64) {
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            debug!("Ignoring unusable audio duration {}", duration_secs);
            return;
        }
        for timed in self.timeline_mut().iter_mut() {
            timed.resolved_onset = Some(timed.normalized_onset * duration_secs);
        }
    }

    /// The play-head is at `position` seconds. Returns how many directives fired.
    pub fn on_position(&self, position: f64) -> usize {
        let due: Vec<_> = {
            let mut timeline = self.timeline_mut();
            timeline
                .iter_mut()
                .filter(|timed| timed.is_due(position))
                .map(|timed| {
                    timed.fired = true;
                    timed.command().clone()
                })
                .collect()
        };

        let fired = due.len();
        for command in due {
            debug!("Firing {} at {:.2}s", command.kind.as_str(), position);
            // Completion is tracked by the scheduler; nobody waits here.
            drop(self.scheduler.enqueue(command));
        }
        fired
    }

    /// Stop everything and forget the timeline.
    pub fn reset(&self) {
        self.scheduler.full_stop();
        self.timeline_mut().clear();
    }

    pub fn timeline(&self) -> Vec<TimedDirective> {
        self.timeline_mut().clone()
    }

    pub fn scheduler(&self) -> &Arc<CommandScheduler> {
        &self.scheduler
    }
}
