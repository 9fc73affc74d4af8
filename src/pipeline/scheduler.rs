//! Command scheduler: a single-flight, generation-stamped queue.
//!
//! One worker task executes commands in order, one at a time. Each entry is
//! stamped with the generation current at enqueue; entries from an older
//! generation are discarded before dispatch. A full stop bumps the
//! generation, aborts the pattern, drains the queue and stops the actuator.

use super::error::{Notifier, Severity};
use super::generation::{Generation, GenerationToken};
use super::pattern::{PatternEnd, PatternEngine, smooth};
use super::types::CommandOutcome;
use crate::actuator::ActuatorSession;
use crate::defaults::PATTERN_DURATION_SECS;
use crate::directive::{Command, DirectiveKind};
use crate::error::HapticError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct QueuedCommand {
    command: Command,
    generation: u64,
    done: oneshot::Sender<CommandOutcome>,
}

impl QueuedCommand {
    fn finish(self, outcome: CommandOutcome) {
        if self.done.send(outcome).is_err() {
            debug!("Nobody waiting on {} command", self.command.kind.as_str());
        }
    }
}

/// Completion signal for one enqueued command.
pub struct CommandTicket {
    rx: oneshot::Receiver<CommandOutcome>,
}

impl CommandTicket {
    /// Wait for the command to finish. A command lost to shutdown counts as
    /// discarded.
    pub async fn outcome(self) -> CommandOutcome {
        self.rx.await.unwrap_or(CommandOutcome::Discarded)
    }
}

struct Shared {
    queue: Mutex<VecDeque<QueuedCommand>>,
    wake: Notify,
    /// Commands queued or executing.
    pending: watch::Sender<usize>,
    generation: Generation,
    session: Arc<ActuatorSession>,
    patterns: Arc<PatternEngine>,
    notifier: Arc<dyn Notifier>,
}

pub struct CommandScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl CommandScheduler {
    /// Create the scheduler and spawn its worker. Must be called inside a
    /// tokio runtime.
    pub fn new(
        session: Arc<ActuatorSession>,
        patterns: Arc<PatternEngine>,
        generation: Generation,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (pending, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            pending,
            generation,
            session,
            patterns,
            notifier,
        });
        let worker = tokio::spawn(Arc::clone(&shared).run());
        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Append `command`, stamped with the current generation.
    pub fn enqueue(&self, command: Command) -> CommandTicket {
        let (done, rx) = oneshot::channel();
        let generation = self.shared.generation.current();
        debug!(
            "Queueing {} command (generation {})",
            command.kind.as_str(),
            generation
        );
        lock(&self.shared.queue).push_back(QueuedCommand {
            command,
            generation,
            done,
        });
        self.shared.pending.send_modify(|n| *n += 1);
        self.shared.wake.notify_one();
        CommandTicket { rx }
    }

    /// Bump the generation, abort the pattern, drain the queue and stop the
    /// actuator.
    pub fn full_stop(&self) {
        self.shared.full_stop();
    }

    pub fn generation(&self) -> &Generation {
        &self.shared.generation
    }

    pub fn pending(&self) -> usize {
        *self.shared.pending.borrow()
    }

    /// Wait until nothing is queued or executing.
    pub async fn idle(&self) {
        let mut pending = self.shared.pending.subscribe();
        if pending.wait_for(|n| *n == 0).await.is_err() {
            debug!("Scheduler closed while waiting for idle");
        }
    }

    /// Full stop, then end the worker.
    pub fn close(&self) {
        self.full_stop();
        if let Some(worker) = lock(&self.worker).take() {
            worker.abort();
        }
        self.shared.pending.send_replace(0);
    }
}

impl Drop for CommandScheduler {
    fn drop(&mut self) {
        if let Some(worker) = lock(&self.worker).take() {
            worker.abort();
        }
    }
}

impl Shared {
    async fn run(self: Arc<Self>) {
        loop {
            match self.next_live() {
                Some(entry) => {
                    let token = self.generation.token_for(entry.generation);
                    let outcome = self.execute(&entry.command, &token).await;
                    debug!(
                        "{} command finished: {:?}",
                        entry.command.kind.as_str(),
                        outcome
                    );
                    entry.finish(outcome);
                    self.release(1);
                }
                None => self.wake.notified().await,
            }
        }
    }

    /// Pop the head, discarding stale entries in front of it.
    fn next_live(&self) -> Option<QueuedCommand> {
        let current = self.generation.current();
        let mut stale = Vec::new();
        let next = {
            let mut queue = lock(&self.queue);
            loop {
                match queue.pop_front() {
                    Some(entry) if entry.generation < current => stale.push(entry),
                    other => break other,
                }
            }
        };
        let discarded = stale.len();
        for entry in stale {
            entry.finish(CommandOutcome::Discarded);
        }
        self.release(discarded);
        next
    }

    fn release(&self, count: usize) {
        if count > 0 {
            self.pending.send_modify(|n| *n = n.saturating_sub(count));
        }
    }

    fn full_stop(&self) {
        let generation = self.generation.bump();
        self.patterns.stop();
        let drained: Vec<QueuedCommand> = lock(&self.queue).drain(..).collect();
        let discarded = drained.len();
        for entry in drained {
            entry.finish(CommandOutcome::Discarded);
        }
        self.release(discarded);
        self.session.stop_all();
        info!(
            "Full stop (generation {}, {} queued commands dropped)",
            generation, discarded
        );
    }

    async fn execute(&self, command: &Command, token: &GenerationToken) -> CommandOutcome {
        // A full stop can land between popping the entry and running it.
        if !token.is_live() {
            return CommandOutcome::Discarded;
        }

        if command.kind == DirectiveKind::Unknown {
            let warning = HapticError::UnknownDirective {
                key: command.raw_key.clone().unwrap_or_default(),
            };
            self.notifier.notify(Severity::Warning, &warning.to_string());
            return CommandOutcome::Skipped;
        }

        if !command.is_custom_pattern() {
            self.patterns.stop();
        }

        match command.kind {
            DirectiveKind::Stop => {
                self.full_stop();
                CommandOutcome::Completed
            }
            DirectiveKind::Pattern => self.run_pattern(command, token).await,
            _ => self.run_primitive(command, token).await,
        }
    }

    async fn run_pattern(&self, command: &Command, token: &GenerationToken) -> CommandOutcome {
        if !command.is_custom_pattern() {
            let name = command.pattern_name.as_deref().unwrap_or("");
            self.notifier.notify(
                Severity::Warning,
                &format!("Pattern not recognized: [{}]", name),
            );
            return CommandOutcome::Skipped;
        }

        let steps = smooth(&command.intensity_series);
        if steps.is_empty() {
            return CommandOutcome::Completed;
        }

        let total = command
            .hold()
            .unwrap_or(Duration::from_secs_f64(PATTERN_DURATION_SECS));
        let done = self.patterns.start(steps, total, token.clone());

        tokio::select! {
            end = done => match end {
                Ok(PatternEnd::Finished) => CommandOutcome::Completed,
                _ => CommandOutcome::Cancelled,
            },
            _ = token.cancelled() => CommandOutcome::Cancelled,
        }
    }

    async fn run_primitive(&self, command: &Command, token: &GenerationToken) -> CommandOutcome {
        let kind = command.kind;
        let Some(value) = command.value else {
            self.notifier.notify(
                Severity::Warning,
                &format!("Missing value for [{}], command ignored", kind.as_str()),
            );
            return CommandOutcome::Skipped;
        };
        let actuator_index = command.actuator_index.unwrap_or(0);
        if !token.is_live() {
            return CommandOutcome::Discarded;
        }

        let dispatch = match kind {
            DirectiveKind::Vibrate => self.session.vibrate(value),
            DirectiveKind::Oscillate => self.session.oscillate(value, actuator_index),
            DirectiveKind::Linear => {
                let seconds = command.duration.filter(|s| s.is_finite()).unwrap_or(0.0);
                self.session.linear(value, seconds)
            }
            DirectiveKind::Rotate => self.session.rotate(value, true),
            DirectiveKind::Scalar => self.session.scalar(value, actuator_index),
            DirectiveKind::Stop | DirectiveKind::Pattern | DirectiveKind::Unknown => {
                return CommandOutcome::Skipped;
            }
        };
        debug!("{} {} -> {:?}", kind.as_str(), value, dispatch);

        let Some(hold) = command.hold() else {
            return CommandOutcome::Completed;
        };

        tokio::select! {
            _ = tokio::time::sleep(hold) => {
                if token.is_live() {
                    self.session.stop_all();
                    CommandOutcome::Completed
                } else {
                    CommandOutcome::Cancelled
                }
            }
            _ = token.cancelled() => CommandOutcome::Cancelled,
        }
    }
}
