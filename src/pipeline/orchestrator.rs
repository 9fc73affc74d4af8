//! Message pipeline: assistant text in, synchronized speech and actuation out.

use super::error::{Notifier, Severity};
use super::synchronizer::{PlaybackSynchronizer, PreparedMessage};
use crate::audio::{PcmContainer, PlaybackClock, PlaybackState, PlaybackStatus};
use crate::audio::{combine, parse_container};
use crate::config::SpeechConfig;
use crate::directive::DirectiveParser;
use crate::error::Result;
use crate::speech::{SpeechSynthesizer, chunk_text};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A chat message as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantMessage {
    pub text: String,
    /// Authored by the user rather than the assistant. Such messages are
    /// ignored.
    pub from_user: bool,
}

impl AssistantMessage {
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_user: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_user: true,
        }
    }
}

/// Result of speaking one message.
#[derive(Debug, Clone)]
pub struct SpokenMessage {
    pub prepared: PreparedMessage,
    /// Combined audio after gain.
    pub audio: PcmContainer,
    /// Fragments that made it into the combined audio.
    pub fragments: usize,
    pub duration_secs: f64,
}

pub struct MessagePipeline {
    speech: SpeechConfig,
    parser: DirectiveParser,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    synchronizer: Arc<PlaybackSynchronizer>,
    clock: Arc<PlaybackClock>,
    notifier: Arc<dyn Notifier>,
    output_path: Option<PathBuf>,
    pending: Mutex<Option<JoinHandle<()>>>,
    follower: JoinHandle<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MessagePipeline {
    /// Build the pipeline and start forwarding play-head updates to the
    /// synchronizer. Must be called inside a tokio runtime.
    pub fn new(
        speech: SpeechConfig,
        parser: DirectiveParser,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        synchronizer: Arc<PlaybackSynchronizer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let clock = Arc::new(PlaybackClock::new(speech.playback_speed));
        let follower = tokio::spawn(follow_playhead(
            clock.subscribe(),
            Arc::clone(&synchronizer),
        ));
        Self {
            speech,
            parser,
            synthesizer,
            synchronizer,
            clock,
            notifier,
            output_path: None,
            pending: Mutex::new(None),
            follower,
        }
    }

    /// Also write every combined WAV to `path`.
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Accept a message from the host.
    ///
    /// User messages are ignored. Assistant messages are debounced: a newer
    /// message arriving within the debounce window replaces the older one,
    /// including one whose synthesis is still in flight. Returns whether the
    /// message was accepted.
    pub fn handle_message(self: &Arc<Self>, message: AssistantMessage) -> bool {
        if message.from_user {
            debug!("Ignoring user-authored message");
            return false;
        }

        let this = Arc::clone(self);
        let delay = Duration::from_millis(self.speech.message_debounce_ms);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = this.speak(&message.text).await {
                this.notifier
                    .notify(Severity::Error, &format!("Failed to speak message: {e}"));
            }
        });

        if let Some(previous) = lock(&self.pending).replace(task) {
            previous.abort();
        }
        true
    }

    /// Speak `text` now and start synchronized playback.
    ///
    /// Returns `None` when there is nothing to play: no speakable words, or
    /// every fragment failed.
    pub async fn speak(&self, text: &str) -> Result<Option<SpokenMessage>> {
        let directives = self.parser.extract(text);
        let prepared = self.synchronizer.prepare_message(text, directives);
        self.clock.stop();

        if prepared.speakable.is_empty() {
            debug!("Message has no speakable text");
            return Ok(None);
        }

        let chunks = chunk_text(&prepared.speakable.text, self.speech.chunk_char_limit);
        let mut fragments = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            debug!("Synthesizing chunk {}/{} ({} chars)", i + 1, chunks.len(), chunk.len());
            let bytes = match self.synthesizer.synthesize(chunk).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.notifier
                        .notify(Severity::Warning, &format!("Speech fragment skipped: {e}"));
                    continue;
                }
            };
            match parse_container(&bytes) {
                Ok(container) => fragments.push(container),
                Err(e) => {
                    self.notifier
                        .notify(Severity::Warning, &format!("Speech fragment skipped: {e}"));
                }
            }
        }

        let Some(mut audio) = combine(&fragments, self.speech.silence_ms) else {
            self.notifier
                .notify(Severity::Error, "No audio generated for message");
            return Ok(None);
        };
        audio.apply_gain(self.speech.output_volume);

        if let Some(path) = &self.output_path {
            audio.write_to(path)?;
            debug!("Wrote combined audio to {}", path.display());
        }

        let duration_secs = audio.duration_secs();
        self.synchronizer.on_resource_loading();
        self.clock.load(duration_secs);
        self.synchronizer.on_resource_ready(duration_secs);
        self.clock.play();
        info!(
            "Playing {:.2}s of speech from {} fragment(s)",
            duration_secs,
            fragments.len()
        );

        Ok(Some(SpokenMessage {
            prepared,
            audio,
            fragments: fragments.len(),
            duration_secs,
        }))
    }

    /// Stop playback, cancel actuation and forget the current message.
    pub fn stop_playback(&self) {
        if let Some(pending) = lock(&self.pending).take() {
            pending.abort();
        }
        self.clock.stop();
        self.synchronizer.reset();
    }

    pub fn pause(&self) {
        self.clock.pause();
    }

    pub fn resume(&self) {
        self.clock.resume();
    }

    pub fn status(&self) -> PlaybackStatus {
        self.clock.status()
    }

    /// Wait until playback ends or is stopped, then until the commands it
    /// fired have run.
    pub async fn wait_finished(&self) {
        let mut rx = self.clock.subscribe();
        let last = match rx
            .wait_for(|s| matches!(s.state, PlaybackState::Ended | PlaybackState::Idle))
            .await
        {
            Ok(status) => *status,
            Err(_) => return,
        };
        // The follower may not have seen the final position yet.
        if last.state == PlaybackState::Ended {
            self.synchronizer.on_position(last.position);
        }
        self.synchronizer.scheduler().idle().await;
    }

    /// Wait for the debounced message currently pending, if any.
    pub async fn flush(&self) {
        let pending = lock(&self.pending).take();
        if let Some(task) = pending
            && let Err(e) = task.await
            && !e.is_cancelled()
        {
            warn!("Message task failed: {}", e);
        }
    }

    pub fn synchronizer(&self) -> &Arc<PlaybackSynchronizer> {
        &self.synchronizer
    }
}

impl Drop for MessagePipeline {
    fn drop(&mut self) {
        self.follower.abort();
        if let Some(pending) = lock(&self.pending).take() {
            pending.abort();
        }
    }
}

async fn follow_playhead(
    mut rx: watch::Receiver<PlaybackStatus>,
    synchronizer: Arc<PlaybackSynchronizer>,
) {
    while rx.changed().await.is_ok() {
        let status = *rx.borrow_and_update();
        if matches!(status.state, PlaybackState::Playing | PlaybackState::Ended) {
            synchronizer.on_position(status.position);
        }
    }
}
