//! Collected warnings and notes.
//!
//! Nothing recorded here stops a run. Each entry is logged through `tracing`
//! when it is recorded and kept so callers can report or escalate them later.

use serde::Serialize;

use crate::error::{BuildError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Informational, e.g. a dependency reinterpreted as a library.
    Note,
    Warning,
    /// A configuration error that was skipped; fatal only when escalated.
    ConfigError,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Note => "note",
            Level::Warning => "warning",
            Level::ConfigError => "config-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub level: Level,
    pub module: Option<String>,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}: [{}] {}", self.level.as_str(), module, self.message),
            None => write!(f, "{}: {}", self.level.as_str(), self.message),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, module: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{}", message);
        self.push(Level::Note, module, message);
    }

    pub fn warn(&mut self, module: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.push(Level::Warning, module, message);
    }

    /// Records a non-fatal configuration error (offending module and key).
    pub fn config_error(&mut self, module: &str, key: &str, message: impl Into<String>) {
        let message = format!("{}: {}", key, message.into());
        tracing::warn!("configuration error in {}: {}", module, message);
        self.push(Level::ConfigError, Some(module), message);
    }

    fn push(&mut self, level: Level, module: Option<&str>, message: String) {
        self.entries.push(Diagnostic {
            level,
            module: module.map(str::to_string),
            message,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.level != Level::Note)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Escalates the first recorded configuration error when `strict` is set.
    pub fn into_result(self, strict: bool) -> Result<Diagnostics> {
        if strict {
            if let Some(first) = self.entries.iter().find(|d| d.level == Level::ConfigError) {
                let (key, message) = first
                    .message
                    .split_once(": ")
                    .unwrap_or(("", first.message.as_str()));
                return Err(BuildError::config(
                    first.module.clone().unwrap_or_default(),
                    key,
                    message,
                ));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.note(Some("core"), "first");
        diagnostics.warn(None, "second");

        let messages: Vec<_> = diagnostics.entries().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_strict_escalates_config_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.config_error("core", "CCFLAGS", "expected a list");

        let err = diagnostics.clone().into_result(true).unwrap_err();
        match err {
            BuildError::Config { module, key, message } => {
                assert_eq!(module, "core");
                assert_eq!(key, "CCFLAGS");
                assert_eq!(message, "expected a list");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(diagnostics.into_result(false).is_ok());
    }

    #[test]
    fn test_display_includes_module() {
        let diagnostic = Diagnostic {
            level: Level::Warning,
            module: Some("app".to_string()),
            message: "no sources".to_string(),
        };
        assert_eq!(diagnostic.to_string(), "warning: [app] no sources");
    }
}
