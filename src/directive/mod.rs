//! Inline actuator directives embedded in generated text.
//!
//! A directive is a `{key[:value](;key[:value])*}` block. The parser turns
//! each block into a [`Command`] and remembers where in the source text the
//! block started so the synchronizer can place it on the speech timeline.

pub mod parser;
pub mod speakable;

pub use parser::{DirectiveParser, extract_directives};
pub use speakable::{SpeakableText, SpokenWord, speakable};

use serde::Serialize;
use std::time::Duration;

/// Command keywords accepted as the first key of a block.
pub const COMMAND_KEYWORDS: [&str; 7] = [
    "vibrate",
    "oscillate",
    "linear",
    "rotate",
    "scalar",
    "stop",
    "pattern",
];

/// Pattern name that plays an explicit intensity series.
pub const CUSTOM_PATTERN: &str = "custom";

/// What a directive asks the actuator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Vibrate,
    Oscillate,
    Linear,
    Rotate,
    Scalar,
    Stop,
    Pattern,
    Unknown,
}

impl DirectiveKind {
    /// Map a lowercase key to a command kind.
    pub fn from_keyword(key: &str) -> Option<Self> {
        match key {
            "vibrate" => Some(Self::Vibrate),
            "oscillate" => Some(Self::Oscillate),
            "linear" => Some(Self::Linear),
            "rotate" => Some(Self::Rotate),
            "scalar" => Some(Self::Scalar),
            "stop" => Some(Self::Stop),
            "pattern" => Some(Self::Pattern),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vibrate => "vibrate",
            Self::Oscillate => "oscillate",
            Self::Linear => "linear",
            Self::Rotate => "rotate",
            Self::Scalar => "scalar",
            Self::Stop => "stop",
            Self::Pattern => "pattern",
            Self::Unknown => "unknown",
        }
    }
}

/// A parsed directive without its position in the source text.
///
/// This is what the command scheduler executes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub kind: DirectiveKind,
    /// First key of the block, lowercased. Kept for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_key: Option<String>,
    /// Level, position or speed. `None` when absent or unparseable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Seconds. `None` when absent or unparseable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actuator_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intensity_series: Vec<f64>,
}

impl Command {
    /// A command of the given kind with every optional field empty.
    pub fn new(kind: DirectiveKind) -> Self {
        Self {
            kind,
            raw_key: Some(kind.as_str().to_string()),
            value: None,
            duration: None,
            actuator_index: None,
            pattern_name: None,
            intensity_series: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// A `pattern:custom` command over the given series.
    pub fn custom_pattern(series: Vec<f64>, duration: f64) -> Self {
        let mut command = Self::new(DirectiveKind::Pattern);
        command.pattern_name = Some(CUSTOM_PATTERN.to_string());
        command.intensity_series = series;
        command.duration = Some(duration);
        command
    }

    pub fn is_custom_pattern(&self) -> bool {
        self.kind == DirectiveKind::Pattern && self.pattern_name.as_deref() == Some(CUSTOM_PATTERN)
    }

    /// How long to hold the command before the deferred stop.
    ///
    /// Only positive durations that fit a `Duration` produce a hold.
    pub fn hold(&self) -> Option<Duration> {
        self.duration
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// A command plus the character offset of its `{` in the origin text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Directive {
    #[serde(flatten)]
    pub command: Command,
    pub source_offset: usize,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        self.command.kind
    }
}
