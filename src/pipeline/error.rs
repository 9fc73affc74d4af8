//! User-facing notifications for non-fatal failures.
//!
//! Per-directive and per-fragment failures never abort the pipeline. They are
//! logged and surfaced through a [`Notifier`], which the host can route to a
//! toast, a status line or a test collector.

use std::fmt;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// How loudly a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Trait for surfacing non-blocking notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Notifier that forwards to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }
    }
}

/// Notifier that records every notification. Used in tests.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, m)| m).collect()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push((severity, message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_display() {
        assert_eq!(Severity::Info.to_string(), "info");
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Error.to_string(), "error");
    }

    #[test]
    fn test_log_notifier() {
        let notifier = LogNotifier;
        // Just ensure it doesn't panic
        notifier.notify(Severity::Warning, "test warning");
    }

    #[test]
    fn test_collecting_notifier_keeps_order() {
        let notifier = CollectingNotifier::new();
        notifier.notify(Severity::Error, "first");
        notifier.notify(Severity::Info, "second");

        assert_eq!(
            notifier.entries(),
            vec![
                (Severity::Error, "first".to_string()),
                (Severity::Info, "second".to_string()),
            ]
        );
        assert_eq!(notifier.messages(), vec!["first", "second"]);
    }
}
