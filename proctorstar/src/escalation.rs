//! The strike/warning escalation engine.
//!
//! Each violation type climbs its own warning ladder. A "bad" judgment
//! increments the type's counter; once it exceeds `max_warnings` a strike is
//! requested and the counter returns to zero. Severe posture bypasses the
//! ladder through a consecutive-tick streak with its own strike reason.
//!
//! Strike requests pass a per-reason cooldown gate before they count. A
//! request dropped by the gate still consumed the warnings that produced it,
//! so one sustained violation cannot turn every tick into a strike.
//!
//! Reaching `max_strikes` terminates the engine. Termination is final: every
//! later report is ignored and the strike count never moves again.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::EscalationPolicy;
use crate::constants::REQUIRED_CONSECUTIVE_FRAMES;
use crate::types::{SevereStreak, StrikeCount, StrikeReason, ViolationType, WarningCount};

/// Outcome of a strike request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeDecision {
    /// The strike counted.
    Admitted {
        strikes: StrikeCount,
        /// This strike reached the limit and ended the session.
        terminated: bool,
    },
    /// The same reason struck too recently.
    Debounced { remaining: Duration },
    /// The session had already terminated.
    Ignored,
}

impl StrikeDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, StrikeDecision::Admitted { .. })
    }
}

/// Outcome of a "bad" judgment for one violation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Still within the warning ladder.
    Warned { count: WarningCount },
    /// Warnings exhausted; a strike was requested and the counter reset.
    StrikeRequested(StrikeDecision),
    /// The session had already terminated.
    Ignored,
}

/// Outcome of a severe posture tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SevereEscalation {
    /// The streak grew but has not reached the limit.
    Streak(SevereStreak),
    /// The streak reached the limit; a `posture-severe` strike was requested.
    StrikeRequested(StrikeDecision),
    /// The session had already terminated.
    Ignored,
}

/// Per-session escalation state.
#[derive(Debug, Clone)]
pub struct EscalationEngine {
    policy: EscalationPolicy,
    required_consecutive_frames: u32,
    warnings: [WarningCount; ViolationType::ALL.len()],
    severe_streak: SevereStreak,
    strikes: StrikeCount,
    last_strike_at: HashMap<StrikeReason, Instant>,
    terminated_by: Option<StrikeReason>,
}

impl EscalationEngine {
    /// Creates a zeroed engine.
    ///
    /// # Parameters
    /// - `policy`: Warning ladder length, strike limit and cooldown
    /// - `required_consecutive_frames`: Severe streak that requests a strike
    pub fn new(policy: EscalationPolicy, required_consecutive_frames: u32) -> Self {
        Self {
            policy,
            required_consecutive_frames: required_consecutive_frames.max(1),
            warnings: [WarningCount::ZERO; ViolationType::ALL.len()],
            severe_streak: SevereStreak::ZERO,
            strikes: StrikeCount::ZERO,
            last_strike_at: HashMap::new(),
            terminated_by: None,
        }
    }

    /// Records a "bad" judgment for `kind`.
    ///
    /// The counter is incremented before the threshold check. Past
    /// `max_warnings` a strike is requested for the type's reason and the
    /// counter resets to zero regardless of whether the strike is admitted.
    pub fn report_violation(&mut self, kind: ViolationType, now: Instant) -> Escalation {
        if self.is_terminated() {
            return Escalation::Ignored;
        }

        let count = self.warnings[kind.index()].incremented();
        if count <= self.policy.max_warnings {
            self.warnings[kind.index()] = count;
            debug!(violation = %kind, count = count.value(), "warning issued");
            return Escalation::Warned { count };
        }

        self.warnings[kind.index()] = WarningCount::ZERO;
        Escalation::StrikeRequested(self.request_strike(kind.strike_reason(), now))
    }

    /// Records a clean judgment for `kind`, resetting only that type's counter.
    pub fn report_clean(&mut self, kind: ViolationType) {
        if self.is_terminated() {
            return;
        }
        self.warnings[kind.index()] = WarningCount::ZERO;
    }

    /// Records a tick above the severe posture threshold.
    ///
    /// When the streak reaches `required_consecutive_frames`, a
    /// `posture-severe` strike is requested and both the streak and the
    /// moderate posture counter reset.
    pub fn report_severe_posture(&mut self, now: Instant) -> SevereEscalation {
        if self.is_terminated() {
            return SevereEscalation::Ignored;
        }

        self.severe_streak = self.severe_streak.incremented();
        if self.severe_streak < self.required_consecutive_frames {
            return SevereEscalation::Streak(self.severe_streak);
        }

        self.severe_streak = SevereStreak::ZERO;
        self.warnings[ViolationType::Posture.index()] = WarningCount::ZERO;
        SevereEscalation::StrikeRequested(self.request_strike(StrikeReason::PostureSevere, now))
    }

    /// Ends the current severe streak.
    pub fn break_severe_streak(&mut self) {
        if self.is_terminated() {
            return;
        }
        self.severe_streak = SevereStreak::ZERO;
    }

    /// Requests a strike for `reason`, subject to the per-reason cooldown.
    ///
    /// A strike is admitted only if strictly more than `strike_cooldown` has
    /// elapsed since the last admitted strike with the same reason.
    pub fn request_strike(&mut self, reason: StrikeReason, now: Instant) -> StrikeDecision {
        if self.is_terminated() {
            return StrikeDecision::Ignored;
        }

        if let Some(last) = self.last_strike_at.get(&reason) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed <= self.policy.strike_cooldown {
                let remaining = self.policy.strike_cooldown - elapsed;
                debug!(%reason, ?remaining, "strike debounced by cooldown");
                return StrikeDecision::Debounced { remaining };
            }
        }

        self.strikes = self.strikes.incremented();
        self.last_strike_at.insert(reason, now);
        let terminated = self.strikes >= self.policy.max_strikes;
        if terminated {
            self.terminated_by = Some(reason);
        }
        info!(
            %reason,
            strikes = self.strikes.value(),
            max_strikes = self.policy.max_strikes,
            terminated,
            "strike admitted"
        );
        StrikeDecision::Admitted {
            strikes: self.strikes,
            terminated,
        }
    }

    /// Current warning count for `kind`.
    pub fn warnings(&self, kind: ViolationType) -> WarningCount {
        self.warnings[kind.index()]
    }

    pub fn severe_streak(&self) -> SevereStreak {
        self.severe_streak
    }

    pub fn strikes(&self) -> StrikeCount {
        self.strikes
    }

    /// When `reason` last produced an admitted strike.
    pub fn last_strike_at(&self, reason: StrikeReason) -> Option<Instant> {
        self.last_strike_at.get(&reason).copied()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated_by.is_some()
    }

    /// The reason whose strike reached the limit.
    pub fn terminated_by(&self) -> Option<StrikeReason> {
        self.terminated_by
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }
}

impl Default for EscalationEngine {
    fn default() -> Self {
        Self::new(EscalationPolicy::default(), REQUIRED_CONSECUTIVE_FRAMES)
    }
}
