//! hapticsync - Drive a haptic actuator in time with synthesized speech
//!
//! Inline `{key:value}` directives in assistant text are turned into actuator
//! commands and fired as the spoken audio reaches them.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod actuator;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod directive;
pub mod error;
pub mod pipeline;
pub mod speech;

// Composition root - needs the CLI and the HTTP synthesizer
#[cfg(all(feature = "cli", feature = "http"))]
pub mod app;

// Core seams (parse → schedule → actuate)
pub use actuator::{ActuatorSession, ConnectionState};
pub use directive::{Command, Directive, DirectiveKind, DirectiveParser, extract_directives};
pub use speech::SpeechSynthesizer;

// Pipeline
pub use pipeline::{
    AssistantMessage, CommandScheduler, MessagePipeline, Notifier, PlaybackSynchronizer,
    SessionContext,
};

// Error handling
pub use error::{HapticError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
