//! Run-level diagnostic log
//!
//! Warnings are kept once per distinct message so a missing resource that is
//! looked up every step does not flood the log.

use ahash::AHashSet;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    seen: AHashSet<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning unless the same message was already recorded
    ///
    /// Returns true if the warning was new.
    pub fn warn(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if !self.seen.insert(message.clone()) {
            return false;
        }
        tracing::warn!("{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Warning,
            message,
        });
        true
    }

    /// Record an error; errors are never de-duplicated
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.entries.push(Diagnostic {
            severity: Severity::Error,
            message,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_warnings_suppressed() {
        let mut diagnostics = Diagnostics::new();
        assert!(diagnostics.warn("missing Finance"));
        assert!(!diagnostics.warn("missing Finance"));
        assert!(diagnostics.warn("missing Land"));
        assert_eq!(diagnostics.warnings().count(), 2);
    }

    #[test]
    fn test_errors_always_recorded() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error("stop");
        diagnostics.error("stop");
        assert_eq!(diagnostics.errors().count(), 2);
        assert!(!diagnostics.is_empty());
    }
}
