use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Configuration error in {module} ({key}): {message}")]
    Config {
        module: String,
        key: String,
        message: String,
    },

    #[error("Couldn't find module '{dependency}' required by module '{module}'{}", suggestion_suffix(.suggestion))]
    UnresolvedDependency {
        module: String,
        dependency: String,
        suggestion: Option<String>,
    },

    #[error("Circular dependency detected when processing module '{module}': {}", .chain.join(" -> "))]
    CircularDependency { module: String, chain: Vec<String> },

    #[error("Couldn't find library '{library}' required by module '{module}'")]
    MissingLibrary { module: String, library: String },

    #[error("Source root {path} does not exist for module '{module}'")]
    MissingSourceRoot { module: String, path: PathBuf },

    #[error("Maximum traversal depth {depth} exceeded at module '{module}'")]
    MaxDepthExceeded { module: String, depth: usize },

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Profile error: {0}")]
    Profile(String),

    #[error("Module '{module}' has sources but no output path")]
    MissingOutputPath { module: String },

    #[error("Emitter failed for module '{module}': {message}")]
    Emit { module: String, message: String },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{}'?)", name),
        None => String::new(),
    }
}

impl BuildError {
    pub fn config(module: impl Into<String>, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            module: module.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn manifest(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True for errors that abort the whole run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Config { .. })
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message_lists_chain() {
        let err = BuildError::CircularDependency {
            module: "a".to_string(),
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected when processing module 'a': a -> b -> a"
        );
    }

    #[test]
    fn test_unresolved_dependency_suggestion() {
        let err = BuildError::UnresolvedDependency {
            module: "app".to_string(),
            dependency: "corr".to_string(),
            suggestion: Some("core".to_string()),
        };
        assert!(err.to_string().ends_with("(did you mean 'core'?)"));

        let err = BuildError::UnresolvedDependency {
            module: "app".to_string(),
            dependency: "zzz".to_string(),
            suggestion: None,
        };
        assert!(err.to_string().ends_with("required by module 'app'"));
    }

    #[test]
    fn test_config_errors_are_not_fatal() {
        assert!(!BuildError::config("m", "CCFLAGS", "bad").is_fatal());
        assert!(BuildError::Profile("x".into()).is_fatal());
    }
}
