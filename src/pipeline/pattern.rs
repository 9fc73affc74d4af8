//! Pattern sub-engine: ramped intensity sequences on a fixed cadence.
//!
//! A sparse series of target intensities is expanded into ramps, then played
//! through the session's continuous-level primitive. While a pattern runs it
//! owns the actuator; starting another pattern or stopping the engine aborts
//! the running one.

use super::generation::GenerationToken;
use crate::actuator::ActuatorSession;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// Shortest step the engine will schedule.
const MIN_STEP: Duration = Duration::from_millis(1);

/// Number of ramp steps between two intensities.
///
/// Small jumps get few steps and big jumps many, so large transitions stay
/// smooth without flooding the device with tiny changes.
pub fn ramp_steps(from: f64, to: f64) -> usize {
    let diff = (to - from).abs();
    if diff <= 0.2 {
        4
    } else if diff <= 0.5 {
        8
    } else {
        16
    }
}

/// Expand a series into ramped steps.
///
/// Output starts with the first value, then each segment's ramp ending
/// exactly on the next target. Length is `1 + Σ ramp_steps` for a non-empty
/// series.
pub fn smooth(series: &[f64]) -> Vec<f64> {
    let Some(&first) = series.first() else {
        return Vec::new();
    };
    let mut out = vec![first];
    for pair in series.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let steps = ramp_steps(from, to);
        out.extend((1..=steps).map(|i| from + (to - from) * (i as f64 / steps as f64)));
    }
    out
}

/// Interval between steps when `steps` values are spread over `total`.
///
/// The first value plays immediately and the closing stop comes one interval
/// after the last, so the run ends exactly at `total`.
pub fn step_interval(total: Duration, steps: usize) -> Duration {
    let steps = u32::try_from(steps.max(1)).unwrap_or(u32::MAX);
    (total / steps).max(MIN_STEP)
}

/// How a pattern run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternEnd {
    Finished,
    Cancelled,
}

pub struct PatternEngine {
    session: Arc<ActuatorSession>,
    active: Mutex<Option<JoinHandle<()>>>,
}

impl PatternEngine {
    pub fn new(session: Arc<ActuatorSession>) -> Self {
        Self {
            session,
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Play `steps` over `total`, replacing any running pattern.
    ///
    /// The first step is applied immediately and each following one an
    /// interval later. One interval after the last step the actuator is
    /// stopped and the returned receiver resolves. If the run is aborted the
    /// receiver's sender is dropped.
    pub fn start(
        &self,
        steps: Vec<f64>,
        total: Duration,
        token: GenerationToken,
    ) -> oneshot::Receiver<PatternEnd> {
        self.stop();
        let (done_tx, done_rx) = oneshot::channel();

        if steps.is_empty() {
            if done_tx.send(PatternEnd::Finished).is_err() {
                debug!("Pattern listener went away");
            }
            return done_rx;
        }

        let interval = step_interval(total, steps.len());
        debug!(
            "Starting pattern: {} steps every {:?}",
            steps.len(),
            interval
        );

        let session = Arc::clone(&self.session);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut end = PatternEnd::Finished;

            for level in steps {
                ticker.tick().await;
                if !token.is_live() {
                    end = PatternEnd::Cancelled;
                    break;
                }
                session.apply_continuous(level);
            }

            if end == PatternEnd::Finished {
                ticker.tick().await;
                if token.is_live() {
                    session.stop_all();
                } else {
                    end = PatternEnd::Cancelled;
                }
            }

            if done_tx.send(end).is_err() {
                debug!("Pattern listener went away");
            }
        });

        *self.active() = Some(handle);
        done_rx
    }

    /// Abort the running pattern, if any.
    pub fn stop(&self) {
        if let Some(handle) = self.active().take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active().as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PatternEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
