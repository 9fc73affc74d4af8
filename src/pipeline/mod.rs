//! Synchronization pipeline from assistant text to actuator commands.
//!
//! Directives extracted from a message are placed on the speech timeline by
//! the [`PlaybackSynchronizer`], fired into the single-flight
//! [`CommandScheduler`] as the play-head passes them, and executed against the
//! actuator session. A generation counter invalidates queued and running work
//! on every full stop.

pub mod context;
pub mod error;
pub mod generation;
pub mod orchestrator;
pub mod pattern;
pub mod scheduler;
pub mod synchronizer;
pub mod types;

pub use context::SessionContext;
pub use error::{CollectingNotifier, LogNotifier, Notifier, Severity};
pub use generation::{Generation, GenerationToken};
pub use orchestrator::{AssistantMessage, MessagePipeline, SpokenMessage};
pub use pattern::{PatternEnd, PatternEngine, ramp_steps, smooth, step_interval};
pub use scheduler::{CommandScheduler, CommandTicket};
pub use synchronizer::{PlaybackSynchronizer, PreparedMessage};
pub use types::{CommandOutcome, TimedDirective};
