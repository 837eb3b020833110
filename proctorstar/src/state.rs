//! Per-session proctoring state.
//!
//! [`SessionState`] owns the posture aggregator and escalation engine for one
//! session and turns sampler reports into [`ProctorEvent`]s. It is
//! synchronous: the session controller applies reports one at a time from its
//! event loop, which is what makes each report run to completion without
//! locks. Simulations drive it directly with a mock clock.

use std::time::Instant;

use tracing::debug;

use crate::classifier::{
    FaceJudgment, PoseMeasurement, PostureJudgment, find_phone, judge_faces, judge_posture,
    measure_pose,
};
use crate::config::{DetectionPolicy, PosturePolicy, ProctorConfig};
use crate::detection::{FaceDetection, ObjectDetection, Pose};
use crate::escalation::{Escalation, EscalationEngine, SevereEscalation, StrikeDecision};
use crate::events::{ProctorEvent, StatusLevel, TERMINAL_ACTIONS};
use crate::posture::PostureAggregator;
use crate::types::{BrowserSignal, StrikeReason, ViolationType};

/// One measurement delivered by a sampler task.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplerReport {
    /// The pose sampler found no ready video frame.
    AwaitingVideo,
    /// Pose estimate, or `None` when the detector found no pose.
    Pose(Option<Pose>),
    /// Faces found in a frame.
    Faces(Vec<FaceDetection>),
    /// Objects found in a frame.
    Objects(Vec<ObjectDetection>),
}

/// Explicit, zero-initialized state of one proctored session.
#[derive(Debug, Clone)]
pub struct SessionState {
    posture_policy: PosturePolicy,
    detection_policy: DetectionPolicy,
    posture: PostureAggregator,
    escalation: EscalationEngine,
    finished: bool,
}

impl SessionState {
    /// Creates fresh state for a session using `config`'s thresholds.
    pub fn new(config: &ProctorConfig) -> Self {
        Self {
            posture_policy: config.posture.clone(),
            detection_policy: config.detection.clone(),
            posture: PostureAggregator::new(config.posture.window),
            escalation: EscalationEngine::new(
                config.escalation.clone(),
                config.posture.required_consecutive_frames,
            ),
            finished: false,
        }
    }

    /// Applies one sampler report.
    ///
    /// Reports arriving after termination or completion are discarded
    /// without touching any counter.
    pub fn apply(&mut self, report: SamplerReport, now: Instant) -> Vec<ProctorEvent> {
        match report {
            SamplerReport::AwaitingVideo => self.observe_awaiting_video(),
            SamplerReport::Pose(pose) => self.observe_pose(pose.as_ref(), now),
            SamplerReport::Faces(faces) => self.observe_faces(&faces, now),
            SamplerReport::Objects(objects) => self.observe_objects(&objects, now),
        }
    }

    /// Pose tick without a usable frame. Changes no counters.
    pub fn observe_awaiting_video(&mut self) -> Vec<ProctorEvent> {
        if !self.is_active() {
            return Vec::new();
        }
        vec![ProctorEvent::status(
            StatusLevel::Warning,
            "Awaiting Video",
            "Camera feed not ready for pose analysis.",
        )]
    }

    /// Pose tick.
    ///
    /// An undetected pose ends the severe streak and clears the moderate
    /// posture counter; nothing is recorded in the rolling buffer.
    pub fn observe_pose(&mut self, pose: Option<&Pose>, now: Instant) -> Vec<ProctorEvent> {
        if !self.is_active() {
            debug!("discarding pose report after session end");
            return Vec::new();
        }

        let angle = match measure_pose(pose, &self.posture_policy) {
            PoseMeasurement::Tilt(angle) => angle,
            PoseMeasurement::Undetected(cause) => {
                self.escalation.break_severe_streak();
                self.escalation.report_clean(ViolationType::Posture);
                return vec![ProctorEvent::status(
                    StatusLevel::Poor,
                    "Undetected",
                    cause.guidance(),
                )];
            }
        };

        self.posture.record_angle(angle);
        let average = self.posture.current_average();
        debug!(angle, average, "posture sample recorded");

        let mut events = Vec::new();
        match judge_posture(average, &self.posture_policy) {
            PostureJudgment::Severe => {
                events.push(ProctorEvent::status(
                    StatusLevel::Poor,
                    "Violation",
                    format!("Severe slouch detected (Avg Angle: {average:.1}°)."),
                ));
                if let SevereEscalation::StrikeRequested(decision) =
                    self.escalation.report_severe_posture(now)
                {
                    self.push_strike_events(StrikeReason::PostureSevere, decision, &mut events);
                }
            }
            PostureJudgment::Poor => {
                self.escalation.break_severe_streak();
                self.escalate(
                    ViolationType::Posture,
                    format!("Poor posture detected (Avg Angle: {average:.1}°). Sit up straight."),
                    now,
                    &mut events,
                );
            }
            PostureJudgment::Good => {
                self.escalation.break_severe_streak();
                self.escalation.report_clean(ViolationType::Posture);
                events.push(ProctorEvent::status(
                    StatusLevel::Good,
                    "Good",
                    format!(
                        "Good posture maintained. (Avg Angle: {average:.1}° - less than {}°)",
                        self.posture_policy.warn_angle
                    ),
                ));
            }
        }
        events
    }

    /// Face tick: face presence and look-away.
    pub fn observe_faces(&mut self, faces: &[FaceDetection], now: Instant) -> Vec<ProctorEvent> {
        if !self.is_active() {
            debug!("discarding face report after session end");
            return Vec::new();
        }

        let mut events = Vec::new();
        match judge_faces(faces, &self.detection_policy) {
            FaceJudgment::Absent => {
                self.escalate(
                    ViolationType::FaceAbsent,
                    "Face not visible to camera".to_string(),
                    now,
                    &mut events,
                );
            }
            FaceJudgment::Present {
                yaw_percent,
                looking_away,
            } => {
                self.escalation.report_clean(ViolationType::FaceAbsent);
                if looking_away {
                    self.escalate(
                        ViolationType::LookAway,
                        format!("Looking away ({yaw_percent:.1}% yaw)"),
                        now,
                        &mut events,
                    );
                } else {
                    self.escalation.report_clean(ViolationType::LookAway);
                }
            }
            FaceJudgment::Unmeasurable => {
                self.escalation.report_clean(ViolationType::FaceAbsent);
            }
        }
        events
    }

    /// Object tick: phone detection.
    pub fn observe_objects(
        &mut self,
        detections: &[ObjectDetection],
        now: Instant,
    ) -> Vec<ProctorEvent> {
        if !self.is_active() {
            debug!("discarding object report after session end");
            return Vec::new();
        }

        let mut events = Vec::new();
        match find_phone(detections, &self.detection_policy) {
            Some(phone) => {
                let message = format!(
                    "Prohibited device detected (phone, Score: {:.0}%)",
                    phone.score * 100.0
                );
                self.escalate(ViolationType::Phone, message, now, &mut events);
            }
            None => self.escalation.report_clean(ViolationType::Phone),
        }
        events
    }

    /// Browser event: tab switch, focus loss or fullscreen exit.
    pub fn observe_browser(&mut self, signal: BrowserSignal, now: Instant) -> Vec<ProctorEvent> {
        if !self.is_active() {
            return Vec::new();
        }
        let mut events = Vec::new();
        self.escalate(
            signal.violation(),
            signal.description().to_string(),
            now,
            &mut events,
        );
        events
    }

    /// Stops accepting reports after normal completion.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Still accepting reports.
    pub fn is_active(&self) -> bool {
        !self.finished && !self.escalation.is_terminated()
    }

    pub fn is_terminated(&self) -> bool {
        self.escalation.is_terminated()
    }

    pub fn posture(&self) -> &PostureAggregator {
        &self.posture
    }

    pub fn escalation(&self) -> &EscalationEngine {
        &self.escalation
    }

    fn escalate(
        &mut self,
        kind: ViolationType,
        message: String,
        now: Instant,
        events: &mut Vec<ProctorEvent>,
    ) {
        let max_warnings = self.escalation.policy().max_warnings;
        match self.escalation.report_violation(kind, now) {
            Escalation::Warned { count } => {
                events.push(ProctorEvent::Warning {
                    violation: kind,
                    count: count.value(),
                    max_warnings,
                    message: format!("{message} ({})", count.of(max_warnings)),
                });
            }
            Escalation::StrikeRequested(decision) => {
                events.push(ProctorEvent::status(
                    StatusLevel::Poor,
                    "Violation",
                    format!("{message} - strike given."),
                ));
                self.push_strike_events(kind.strike_reason(), decision, events);
            }
            Escalation::Ignored => {}
        }
    }

    fn push_strike_events(
        &self,
        reason: StrikeReason,
        decision: StrikeDecision,
        events: &mut Vec<ProctorEvent>,
    ) {
        let max_strikes = self.escalation.policy().max_strikes;
        match decision {
            StrikeDecision::Admitted {
                strikes,
                terminated,
            } => {
                events.push(ProctorEvent::StrikeIssued {
                    reason,
                    strikes: strikes.value(),
                    max_strikes,
                });
                events.push(ProctorEvent::toast(format!(
                    "Rule violation: {reason} ({})",
                    strikes.of(max_strikes)
                )));
                if terminated {
                    events.push(ProctorEvent::Terminated {
                        reason,
                        actions: TERMINAL_ACTIONS.to_vec(),
                    });
                }
            }
            StrikeDecision::Debounced { remaining } => {
                events.push(ProctorEvent::StrikeDebounced { reason, remaining });
            }
            StrikeDecision::Ignored => {}
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(&ProctorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Keypoint;
    use crate::types::Point;

    fn pose_with_tilt(degrees: f64) -> Pose {
        let radians = degrees.to_radians();
        let hip = Point::new(100.0, 300.0);
        let shoulder = Point::new(hip.x + 200.0 * radians.sin(), hip.y - 200.0 * radians.cos());
        let kp = |part: &str, p: Point| Keypoint {
            part: part.to_string(),
            position: p,
            confidence: 0.9,
        };
        Pose {
            score: 0.9,
            keypoints: vec![
                kp("nose", Point::new(shoulder.x, shoulder.y - 40.0)),
                kp("leftShoulder", Point::new(shoulder.x - 30.0, shoulder.y)),
                kp("rightShoulder", Point::new(shoulder.x + 30.0, shoulder.y)),
                kp("leftHip", Point::new(hip.x - 25.0, hip.y)),
                kp("rightHip", Point::new(hip.x + 25.0, hip.y)),
            ],
        }
    }

    #[test]
    fn good_posture_emits_good_status() {
        let mut state = SessionState::default();
        let events = state.observe_pose(Some(&pose_with_tilt(5.0)), Instant::now());
        assert!(matches!(
            events.as_slice(),
            [ProctorEvent::Status {
                level: StatusLevel::Good,
                ..
            }]
        ));
        assert!((state.posture().current_average() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn undetected_pose_clears_posture_counters() {
        let mut state = SessionState::default();
        let now = Instant::now();
        state.observe_pose(Some(&pose_with_tilt(25.0)), now);
        assert_eq!(state.escalation().warnings(ViolationType::Posture), 1);

        let events = state.observe_pose(None, now);
        assert_eq!(state.escalation().warnings(ViolationType::Posture), 0);
        assert_eq!(state.escalation().severe_streak(), 0);
        assert_eq!(state.posture().len(), 1);
        assert!(matches!(
            &events[0],
            ProctorEvent::Status { title, .. } if title == "Undetected"
        ));
    }

    #[test]
    fn awaiting_video_changes_nothing() {
        let mut state = SessionState::default();
        let now = Instant::now();
        state.observe_pose(Some(&pose_with_tilt(25.0)), now);
        state.observe_awaiting_video();
        assert_eq!(state.escalation().warnings(ViolationType::Posture), 1);
    }

    #[test]
    fn face_seen_clears_face_absent_warning() {
        let mut state = SessionState::default();
        let now = Instant::now();
        state.observe_faces(&[], now);
        assert_eq!(state.escalation().warnings(ViolationType::FaceAbsent), 1);
        state.observe_faces(&[FaceDetection::default()], now);
        assert_eq!(state.escalation().warnings(ViolationType::FaceAbsent), 0);
    }

    #[test]
    fn browser_signal_escalates_its_type() {
        let mut state = SessionState::default();
        let events = state.observe_browser(BrowserSignal::WindowBlurred, Instant::now());
        assert!(matches!(
            &events[0],
            ProctorEvent::Warning {
                violation: ViolationType::FocusLost,
                count: 1,
                ..
            }
        ));
    }

    #[test]
    fn finished_state_discards_reports() {
        let mut state = SessionState::default();
        state.finish();
        let events = state.apply(SamplerReport::Faces(Vec::new()), Instant::now());
        assert!(events.is_empty());
        assert_eq!(state.escalation().warnings(ViolationType::FaceAbsent), 0);
    }
}
