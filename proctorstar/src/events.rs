//! Events emitted to the UI observer.
//!
//! Every user-visible state change the session produces is one
//! [`ProctorEvent`]. Rendering them is the observer's concern.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::error::DetectorKind;
use crate::types::{StrikeReason, ViolationType};

/// Severity class of a proctoring status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Good,
    Warning,
    Poor,
}

/// Actions offered on the terminal screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminalAction {
    ReturnHome,
    Reload,
}

/// Choices shown once a session is terminated.
pub const TERMINAL_ACTIONS: [TerminalAction; 2] =
    [TerminalAction::ReturnHome, TerminalAction::Reload];

/// Everything the session reports outward.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProctorEvent {
    /// Status line update (`Good`, `Undetected`, `Awaiting Video`, ...).
    Status {
        level: StatusLevel,
        title: String,
        detail: String,
    },
    /// A violation type climbed one step of its warning ladder.
    Warning {
        violation: ViolationType,
        count: u32,
        max_warnings: u32,
        message: String,
    },
    /// A strike was admitted.
    StrikeIssued {
        reason: StrikeReason,
        strikes: u32,
        max_strikes: u32,
    },
    /// A strike request was dropped by the per-reason cooldown.
    StrikeDebounced {
        reason: StrikeReason,
        #[serde_as(as = "DurationMilliSeconds<u64>")]
        remaining: Duration,
    },
    /// A detection model failed to load; its modality is off for the session.
    ModelUnavailable { detector: DetectorKind },
    /// Loader/progress text during setup.
    SetupProgress { message: String },
    /// A question is being shown.
    QuestionShown {
        index: usize,
        total: usize,
        text: String,
    },
    /// One countdown step.
    Countdown { remaining_secs: u32, urgent: bool },
    /// Transient notification.
    Toast { message: String },
    /// The strike limit ended the session.
    Terminated {
        reason: StrikeReason,
        actions: Vec<TerminalAction>,
    },
    /// Every question was answered.
    Completed { answered: usize },
}

impl ProctorEvent {
    pub(crate) fn status(
        level: StatusLevel,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        ProctorEvent::Status {
            level,
            title: title.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn toast(message: impl Into<String>) -> Self {
        ProctorEvent::Toast {
            message: message.into(),
        }
    }

    /// Whether this event admitted a strike.
    pub fn is_strike(&self) -> bool {
        matches!(self, ProctorEvent::StrikeIssued { .. })
    }
}
