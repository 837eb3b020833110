//! Proctoring policy constants and detector thresholds.
//!
//! These values are the defaults behind [`crate::config::ProctorConfig`].
//! Code that needs a threshold at runtime should read it from the config so
//! that tests and deployments can tune it; the constants exist so the
//! defaults live in one place.

use std::time::Duration;

// --- Sampling Schedule ---

/// Interval between pose-sampler ticks.
pub const POSE_CHECK_INTERVAL: Duration = Duration::from_millis(900);
/// Interval between face/object-sampler ticks. Must exceed the pose interval.
pub const OBJECT_CHECK_INTERVAL: Duration = Duration::from_millis(1600);
/// Hard per-question answer window.
pub const QUESTION_DURATION: Duration = Duration::from_secs(60);
/// Resolution of the per-question countdown.
pub const COUNTDOWN_RESOLUTION: Duration = Duration::from_secs(1);
/// Remaining seconds at or below which the countdown is flagged urgent.
pub const COUNTDOWN_URGENT_SECS: u32 = 10;

// --- Posture Policy ---

/// Number of spine-tilt samples averaged by the posture aggregator.
pub const POSTURE_WINDOW: usize = 20;
/// Rolling average (degrees) above which posture is "poor".
pub const POSTURE_WARN_ANGLE: f64 = 20.0;
/// Rolling average (degrees) above which posture is "severe".
pub const POSTURE_SEVERE_ANGLE: f64 = 30.0;
/// Consecutive severe ticks that trigger a `posture-severe` strike request.
pub const REQUIRED_CONSECUTIVE_FRAMES: u32 = 3;
/// Overall pose score below which a pose is treated as undetected.
pub const MIN_POSE_SCORE: f64 = 0.4;
/// Per-keypoint confidence below which a required keypoint is unusable.
pub const MIN_KEYPOINT_CONFIDENCE: f64 = 0.6;

// --- Face / Object Policy ---

/// Normalized yaw magnitude (percent of inter-eye distance) counted as looking away.
pub const LOOK_AWAY_YAW_PERCENT: f64 = 18.0;
/// Object-detector score a "phone" detection must exceed.
pub const PHONE_MIN_SCORE: f64 = 0.8;
/// Class-name fragment identifying a phone detection (matched case-insensitively).
pub const PHONE_CLASS_FRAGMENT: &str = "phone";

/// Face-mesh vertex used as the left eye when named landmarks are absent.
pub const MESH_LEFT_EYE_VERTEX: usize = 33;
/// Face-mesh vertex used as the right eye when named landmarks are absent.
pub const MESH_RIGHT_EYE_VERTEX: usize = 263;
/// Face-mesh vertex used as the nose tip when named landmarks are absent.
pub const MESH_NOSE_TIP_VERTEX: usize = 1;

// --- Escalation Policy ---

/// Warnings tolerated per violation type before a strike is requested.
pub const MAX_WARNINGS: u32 = 2;
/// Strikes that terminate the session.
pub const MAX_STRIKES: u32 = 3;
/// Minimum spacing between two admitted strikes sharing a reason.
pub const STRIKE_COOLDOWN: Duration = Duration::from_millis(10_000);

// --- Question Generation ---

/// Questions requested per interview.
pub const DEFAULT_QUESTION_COUNT: usize = 5;
/// HR questions mixed ahead of generated technical questions.
pub const HR_QUESTIONS_PER_INTERVIEW: usize = 2;
/// Attempts per model identifier before falling through to the next model.
pub const GENERATION_RETRIES_PER_MODEL: u32 = 3;
/// Base of the exponential backoff between generation attempts (`base * 2^attempt`).
pub const GENERATION_BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Model identifiers tried in order by the question generator.
pub const GENERATION_MODELS: [&str; 2] = ["gemini-2.5-flash", "gemini-2.5-pro"];
/// Generated lines shorter than this are not accepted as questions.
pub const MIN_GENERATED_QUESTION_LEN: usize = 10;

/// Response recorded when the candidate submits a blank answer.
pub const NO_ANSWER_PLACEHOLDER: &str = "No answer provided";
