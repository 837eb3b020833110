//! Proctoring error types.
//!
//! Distinguishes configuration errors from operational errors raised while a
//! session is being set up or run. Policy violations are not errors: they are
//! reported as [`crate::events::ProctorEvent`]s. The `thiserror` crate is used
//! for ergonomic error definitions.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The detection model a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectorKind {
    /// Body pose estimation.
    Pose,
    /// Face landmark estimation.
    Face,
    /// Object detection.
    Object,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorKind::Pose => write!(f, "pose"),
            DetectorKind::Face => write!(f, "face"),
            DetectorKind::Object => write!(f, "object"),
        }
    }
}

/// Errors raised while loading or validating a [`crate::config::ProctorConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("Config I/O error for {path}: {description}")]
    Io { path: String, description: String },

    /// The configuration text is not valid TOML for the expected schema.
    #[error("Config parse error: {0}")]
    Parse(String),

    /// A field holds a value the proctoring policy cannot operate with.
    #[error("Invalid config value for '{field}': {description}")]
    InvalidValue { field: String, description: String },
}

/// Main error type for proctoring operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProctorError {
    /// The candidate denied camera/microphone access. Fatal to session start.
    #[error("Media access denied: {0}")]
    MediaAccessDenied(String),

    /// A detection model failed to load; its modality is disabled.
    #[error("{detector} detector unavailable: {reason}")]
    DetectorUnavailable {
        detector: DetectorKind,
        reason: String,
    },

    /// A single detection call failed; the tick is skipped.
    #[error("{detector} detection failed: {reason}")]
    DetectorFailure {
        detector: DetectorKind,
        reason: String,
    },

    /// The question source could not supply questions.
    #[error("Question source error: {0}")]
    QuestionSource(String),

    /// The evaluation sink rejected or failed to evaluate the answers.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Every generation model exhausted its retries.
    #[error("Generation failed after {attempts} attempts: {last_error}")]
    Generation { attempts: u32, last_error: String },

    /// HTTP transport failure talking to a remote collaborator.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for ProctorError {
    fn from(err: reqwest::Error) -> Self {
        ProctorError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_unavailable_display() {
        let err = ProctorError::DetectorUnavailable {
            detector: DetectorKind::Face,
            reason: "model not bundled".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "face detector unavailable: model not bundled"
        );
    }

    #[test]
    fn generation_error_display() {
        let err = ProctorError::Generation {
            attempts: 6,
            last_error: "quota exceeded".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Generation failed after 6 attempts: quota exceeded"
        );
    }

    #[test]
    fn proctor_error_from_config_error() {
        let config_err = ConfigError::InvalidValue {
            field: "posture.window".to_string(),
            description: "must be at least 1".to_string(),
        };
        let err = ProctorError::from(config_err.clone());
        match err {
            ProctorError::Config(inner) => assert_eq!(inner, config_err),
            _ => panic!("Incorrect ProctorError variant"),
        }
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::Io {
            path: "proctor.toml".to_string(),
            description: "not found".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Config I/O error for proctor.toml: not found"
        );
    }
}
