//! Session configuration.
//!
//! A [`ProctorConfig`] groups every tunable threshold and interval. Defaults
//! come from [`crate::constants`]; deployments can override them from a TOML
//! file. Durations are written in milliseconds.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::constants::{
    DEFAULT_QUESTION_COUNT, LOOK_AWAY_YAW_PERCENT, MAX_STRIKES, MAX_WARNINGS,
    MIN_KEYPOINT_CONFIDENCE, MIN_POSE_SCORE, OBJECT_CHECK_INTERVAL, PHONE_MIN_SCORE,
    POSE_CHECK_INTERVAL, POSTURE_SEVERE_ANGLE, POSTURE_WARN_ANGLE, POSTURE_WINDOW,
    QUESTION_DURATION, REQUIRED_CONSECUTIVE_FRAMES, STRIKE_COOLDOWN,
};
use crate::error::ConfigError;

/// Sampler and countdown schedule.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub pose_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub detection_interval: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub question_duration: Duration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            pose_interval: POSE_CHECK_INTERVAL,
            detection_interval: OBJECT_CHECK_INTERVAL,
            question_duration: QUESTION_DURATION,
        }
    }
}

/// Posture aggregation and gating thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosturePolicy {
    /// Rolling-average window, in samples.
    pub window: usize,
    /// Average angle (degrees) above which posture earns a warning.
    pub warn_angle: f64,
    /// Average angle (degrees) above which a tick extends the severe streak.
    pub severe_angle: f64,
    /// Severe streak length that requests a `posture-severe` strike.
    pub required_consecutive_frames: u32,
    /// Minimum overall pose score.
    pub min_pose_score: f64,
    /// Minimum confidence for each required keypoint.
    pub min_keypoint_confidence: f64,
}

impl Default for PosturePolicy {
    fn default() -> Self {
        Self {
            window: POSTURE_WINDOW,
            warn_angle: POSTURE_WARN_ANGLE,
            severe_angle: POSTURE_SEVERE_ANGLE,
            required_consecutive_frames: REQUIRED_CONSECUTIVE_FRAMES,
            min_pose_score: MIN_POSE_SCORE,
            min_keypoint_confidence: MIN_KEYPOINT_CONFIDENCE,
        }
    }
}

/// Face and object thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionPolicy {
    /// Normalized yaw magnitude counted as looking away.
    pub look_away_yaw_percent: f64,
    /// Score a phone detection must exceed.
    pub phone_min_score: f64,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            look_away_yaw_percent: LOOK_AWAY_YAW_PERCENT,
            phone_min_score: PHONE_MIN_SCORE,
        }
    }
}

/// Warning ladder, strike limit and cooldown.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationPolicy {
    pub max_warnings: u32,
    pub max_strikes: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub strike_cooldown: Duration,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            max_warnings: MAX_WARNINGS,
            max_strikes: MAX_STRIKES,
            strike_cooldown: STRIKE_COOLDOWN,
        }
    }
}

/// What the interview is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    pub domain: Option<String>,
    pub level: Option<String>,
    pub question_count: usize,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            domain: None,
            level: Some("medium".to_string()),
            question_count: DEFAULT_QUESTION_COUNT,
        }
    }
}

/// Complete configuration of a proctored session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    pub sampling: SamplingConfig,
    pub posture: PosturePolicy,
    pub detection: DetectionPolicy,
    pub escalation: EscalationPolicy,
    pub interview: InterviewConfig,
}

impl ProctorConfig {
    /// Reads and validates a configuration from a TOML file.
    ///
    /// # Errors
    /// - [`ConfigError::Io`] - The file could not be read
    /// - [`ConfigError::Parse`] - The file is not valid TOML for this schema
    /// - [`ConfigError::InvalidValue`] - A value failed [`Self::validate`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            description: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ProctorConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            description: e.to_string(),
        })
    }

    /// Rejects configurations the state machine cannot run with.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidValue`] - Naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.posture.window == 0 {
            return Err(invalid("posture.window", "must hold at least one sample"));
        }
        if self.posture.warn_angle >= self.posture.severe_angle {
            return Err(invalid(
                "posture.warn_angle",
                "must be below posture.severe_angle",
            ));
        }
        if self.posture.required_consecutive_frames == 0 {
            return Err(invalid(
                "posture.required_consecutive_frames",
                "must be at least 1",
            ));
        }
        if self.sampling.pose_interval.is_zero() {
            return Err(invalid("sampling.pose_interval", "must be non-zero"));
        }
        if self.sampling.detection_interval <= self.sampling.pose_interval {
            return Err(invalid(
                "sampling.detection_interval",
                "must be longer than sampling.pose_interval",
            ));
        }
        if self.sampling.question_duration < Duration::from_secs(1) {
            return Err(invalid(
                "sampling.question_duration",
                "must be at least one second",
            ));
        }
        if self.escalation.max_strikes == 0 {
            return Err(invalid("escalation.max_strikes", "must be at least 1"));
        }
        if self.interview.question_count == 0 {
            return Err(invalid("interview.question_count", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, description: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        description: description.to_string(),
    }
}
