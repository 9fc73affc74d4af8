//! Virtual play-head for the combined speech audio.
//!
//! The clock does not output sound. It advances a position at a fixed tick
//! rate, scaled by the playback speed, and publishes it on a `watch` channel
//! so the synchronizer can fire directives as the position moves.

use crate::defaults::PLAYBACK_TICK_MS;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing loaded, or stopped.
    Idle,
    /// A resource is loaded and its duration known.
    Ready,
    Playing,
    Paused,
    Ended,
}

/// Snapshot of the play-head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Seconds from the start of the resource.
    pub position: f64,
    pub duration: f64,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            position: 0.0,
            duration: 0.0,
        }
    }
}

pub struct PlaybackClock {
    speed: f64,
    tick: Duration,
    status: Arc<watch::Sender<PlaybackStatus>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackClock {
    pub fn new(speed: f64) -> Self {
        Self::with_tick(speed, Duration::from_millis(PLAYBACK_TICK_MS))
    }

    pub fn with_tick(speed: f64, tick: Duration) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            1.0
        };
        let (status, _) = watch::channel(PlaybackStatus::default());
        Self {
            speed,
            tick,
            status: Arc::new(status),
            ticker: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    /// Load a new resource of `duration_secs`, replacing the current one.
    pub fn load(&self, duration_secs: f64) {
        self.halt();
        self.status.send_replace(PlaybackStatus {
            state: PlaybackState::Ready,
            position: 0.0,
            duration: duration_secs.max(0.0),
        });
        debug!("Playback resource loaded ({:.2}s)", duration_secs);
    }

    /// Start advancing from the current position.
    pub fn play(&self) {
        let current = self.status();
        if matches!(current.state, PlaybackState::Idle | PlaybackState::Playing) {
            return;
        }
        let start_position = if current.state == PlaybackState::Ended {
            0.0
        } else {
            current.position
        };

        self.halt();
        self.status.send_modify(|s| {
            s.state = PlaybackState::Playing;
            s.position = start_position;
        });

        let status = Arc::clone(&self.status);
        let tick = self.tick;
        let step = tick.as_secs_f64() * self.speed;
        let duration = current.duration;

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + tick, tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks: u64 = 0;
            loop {
                interval.tick().await;
                ticks += 1;
                let position = (start_position + ticks as f64 * step).min(duration);
                let ended = position >= duration;
                status.send_modify(|s| {
                    s.position = position;
                    if ended {
                        s.state = PlaybackState::Ended;
                    }
                });
                if ended {
                    break;
                }
            }
        });
        self.set_ticker(Some(handle));
    }

    pub fn pause(&self) {
        if self.status().state != PlaybackState::Playing {
            return;
        }
        self.halt();
        self.status.send_modify(|s| s.state = PlaybackState::Paused);
    }

    pub fn resume(&self) {
        if self.status().state == PlaybackState::Paused {
            self.play();
        }
    }

    /// Stop and unload.
    pub fn stop(&self) {
        self.halt();
        self.status.send_replace(PlaybackStatus::default());
    }

    fn halt(&self) {
        self.set_ticker(None);
    }

    fn set_ticker(&self, handle: Option<JoinHandle<()>>) {
        let mut guard = match self.ticker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = std::mem::replace(&mut *guard, handle) {
            previous.abort();
        }
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        self.halt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> PlaybackClock {
        PlaybackClock::with_tick(1.0, Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_to_the_end() {
        let clock = clock();
        clock.load(0.35);
        clock.play();

        tokio::time::sleep(Duration::from_millis(250)).await;
        let status = clock.status();
        assert_eq!(status.state, PlaybackState::Playing);
        assert!((status.position - 0.2).abs() < 1e-9);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let status = clock.status();
        assert_eq!(status.state, PlaybackState::Ended);
        assert!((status.position - 0.35).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_scales_position() {
        let clock = PlaybackClock::with_tick(2.0, Duration::from_millis(100));
        clock.load(10.0);
        clock.play();

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!((clock.status().position - 0.6).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_and_resume_continues() {
        let clock = clock();
        clock.load(5.0);
        clock.play();
        tokio::time::sleep(Duration::from_millis(250)).await;

        clock.pause();
        let paused_at = clock.status().position;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(clock.status().position, paused_at);
        assert_eq!(clock.status().state, PlaybackState::Paused);

        clock.resume();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!((clock.status().position - (paused_at + 0.1)).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_resets_to_idle() {
        let clock = clock();
        clock.load(5.0);
        clock.play();
        tokio::time::sleep(Duration::from_millis(250)).await;

        clock.stop();
        assert_eq!(clock.status(), PlaybackStatus::default());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(clock.status().position, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_without_resource_is_ignored() {
        let clock = clock();
        clock.play();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(clock.status().state, PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_updates() {
        let clock = clock();
        let mut rx = clock.subscribe();
        clock.load(1.0);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state, PlaybackState::Ready);

        clock.play();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state, PlaybackState::Playing);
    }
}
