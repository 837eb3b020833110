//! `proctorstar`: violation detection and strike escalation for proctored interviews.
//!
//! The crate watches a candidate through pose, face and object detectors,
//! classifies each measurement against fixed thresholds, and escalates
//! sustained violations from warnings to strikes. Three strikes end the
//! session.
//!
//! ## Core Concepts
//!
//! - **[`ProctorSession`]**: Runs one interview: setup, sampling, countdown,
//!   termination or completion and evaluation.
//! - **[`SessionState`]**: The synchronous core. Applies one measurement at a
//!   time and returns the [`ProctorEvent`]s it caused.
//! - **[`EscalationEngine`]**: Per-type warning ladders, the severe posture
//!   streak and cooldown-gated strike admission.
//! - **Collaborators**: Detectors, media, question and evaluation services
//!   are traits in [`traits`]; UI rendering is a [`ProctorObserver`].
//!
//! ## Quick Start
//!
//! ```rust
//! use proctorstar::detection::ObjectDetection;
//! use proctorstar::{ProctorConfig, ProctorEvent, SessionState};
//! use std::time::Instant;
//!
//! let mut state = SessionState::new(&ProctorConfig::default());
//! let phone = [ObjectDetection::new("cell phone", 0.93)];
//! let now = Instant::now();
//!
//! for _ in 0..2 {
//!     let events = state.observe_objects(&phone, now);
//!     assert!(matches!(events[0], ProctorEvent::Warning { .. }));
//! }
//! let events = state.observe_objects(&phone, now);
//! assert!(events.iter().any(ProctorEvent::is_strike));
//! assert_eq!(state.escalation().strikes(), 1);
//! ```

pub mod classifier;
pub mod config;
pub mod constants;
pub mod detection;
pub mod error;
pub mod escalation;
pub mod evaluation;
pub mod events;
pub mod posture;
pub mod questions;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod time;
pub mod traits;
pub mod types;

pub use config::ProctorConfig;
pub use error::{ConfigError, DetectorKind, ProctorError};
pub use escalation::{Escalation, EscalationEngine, SevereEscalation, StrikeDecision};
pub use events::{ProctorEvent, StatusLevel, TerminalAction};
pub use session::{Collaborators, ProctorSession, SessionInput, SessionOutcome};
pub use state::{SamplerReport, SessionState};
pub use time::mock_clock::MockClock;
pub use traits::ProctorObserver;
pub use types::{BrowserSignal, StrikeCount, StrikeReason, ViolationType, WarningCount};
