//! Core library for the Proctorstar Deterministic Simulator.
//!
//! Replays synthetic candidate behaviour through [`SessionState`] on a mock
//! clock at the real sampler cadence, and checks the escalation invariants
//! after every tick. Everything is derived from the configured seed, so any
//! failing run can be replayed exactly.

use proctorstar::detection::{FaceDetection, Keypoint, ObjectDetection, Pose};
use proctorstar::time::Clock;
use proctorstar::types::Point;
use proctorstar::{
    BrowserSignal, MockClock, ProctorConfig, ProctorEvent, SessionState, StrikeReason,
    ViolationType,
};

use rand::prelude::*;
use rand::rngs::StdRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Configuration for a simulation scenario.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub seed: u64,
    /// Simulated session length.
    pub duration: Duration,
    /// Chance per pose tick that a slouching episode starts.
    pub slouch_probability: f64,
    /// Share of slouching episodes that are severe.
    pub severe_share: f64,
    /// Chance per pose tick that the detector loses the candidate.
    pub undetected_probability: f64,
    /// Chance per detection tick that the candidate looks away.
    pub look_away_probability: f64,
    /// Chance per detection tick that the candidate leaves the frame.
    pub face_absent_probability: f64,
    /// Chance per detection tick that a phone appears.
    pub phone_probability: f64,
    /// Chance per detection tick of a browser focus/visibility event.
    pub browser_event_probability: f64,
    /// Chance that an ongoing episode continues into the next tick.
    pub persistence: f64,
    /// Thresholds and limits under test.
    pub proctor: ProctorConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            duration: Duration::from_secs(300),
            slouch_probability: 0.05,
            severe_share: 0.3,
            undetected_probability: 0.02,
            look_away_probability: 0.05,
            face_absent_probability: 0.02,
            phone_probability: 0.02,
            browser_event_probability: 0.01,
            persistence: 0.8,
            proctor: ProctorConfig::default(),
        }
    }
}

/// A behaviour that switches on with some probability and tends to persist.
#[derive(Debug, Clone, Copy, Default)]
struct Episode {
    active: bool,
}

impl Episode {
    fn step(&mut self, rng: &mut StdRng, start_probability: f64, persistence: f64) -> bool {
        self.active = if self.active {
            rng.random_bool(persistence)
        } else {
            rng.random_bool(start_probability)
        };
        self.active
    }
}

/// Synthetic detector output for one detection tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSample {
    pub faces: Vec<FaceDetection>,
    pub objects: Vec<ObjectDetection>,
    pub browser: Option<BrowserSignal>,
}

/// Generates detector output deterministically from a seed.
pub struct SignalGenerator {
    rng: StdRng,
    config: SimConfig,
    slouch: Episode,
    severe: bool,
    undetected: Episode,
    look_away: Episode,
    face_absent: Episode,
    phone: Episode,
}

impl SignalGenerator {
    /// Creates a generator seeded from `config.seed`.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config: config.clone(),
            slouch: Episode::default(),
            severe: false,
            undetected: Episode::default(),
            look_away: Episode::default(),
            face_absent: Episode::default(),
            phone: Episode::default(),
        }
    }

    /// Pose detector output for the next pose tick.
    pub fn next_pose(&mut self) -> Option<Pose> {
        let persistence = self.config.persistence;
        if self.undetected.step(
            &mut self.rng,
            self.config.undetected_probability,
            persistence,
        ) {
            // Missing person and low-confidence person both count as undetected.
            return self
                .rng
                .random_bool(0.5)
                .then(|| pose_with_tilt(5.0, 0.2, 0.9));
        }

        let was_slouching = self.slouch.active;
        let slouching = self
            .slouch
            .step(&mut self.rng, self.config.slouch_probability, persistence);
        if slouching && !was_slouching {
            self.severe = self.rng.random_bool(self.config.severe_share);
        }

        let angle = match (slouching, self.severe) {
            (false, _) => self.rng.random_range(0.0..15.0),
            (true, false) => self.rng.random_range(22.0..29.0),
            (true, true) => self.rng.random_range(33.0..50.0),
        };
        Some(pose_with_tilt(angle, 0.9, 0.95))
    }

    /// Face, object and browser signals for the next detection tick.
    pub fn next_detection(&mut self) -> DetectionSample {
        let persistence = self.config.persistence;

        let faces = if self.face_absent.step(
            &mut self.rng,
            self.config.face_absent_probability,
            persistence,
        ) {
            Vec::new()
        } else if self.look_away.step(
            &mut self.rng,
            self.config.look_away_probability,
            persistence,
        ) {
            let yaw = self.rng.random_range(20.0..45.0);
            vec![face_with_yaw(if self.rng.random_bool(0.5) { yaw } else { -yaw })]
        } else {
            vec![face_with_yaw(self.rng.random_range(-10.0..10.0))]
        };

        let mut objects = vec![ObjectDetection::new("person", 0.97)];
        if self
            .phone
            .step(&mut self.rng, self.config.phone_probability, persistence)
        {
            objects.push(ObjectDetection::new(
                "cell phone",
                self.rng.random_range(0.81..0.99),
            ));
        } else if self.rng.random_bool(0.05) {
            // Weak phone-like detections below the score gate.
            objects.push(ObjectDetection::new(
                "cell phone",
                self.rng.random_range(0.3..0.8),
            ));
        }

        let browser = self
            .rng
            .random_bool(self.config.browser_event_probability)
            .then(|| {
                *[
                    BrowserSignal::TabHidden,
                    BrowserSignal::WindowBlurred,
                    BrowserSignal::FullscreenExited,
                ]
                .choose(&mut self.rng)
                .unwrap_or(&BrowserSignal::TabHidden)
            });

        DetectionSample {
            faces,
            objects,
            browser,
        }
    }
}

/// Pose with the spine `degrees` off vertical.
pub fn pose_with_tilt(degrees: f64, score: f64, keypoint_confidence: f64) -> Pose {
    let radians = degrees.to_radians();
    let hip = Point::new(320.0, 400.0);
    let shoulder = Point::new(hip.x + 180.0 * radians.sin(), hip.y - 180.0 * radians.cos());
    let keypoint = |part: &str, position: Point| Keypoint {
        part: part.to_string(),
        position,
        confidence: keypoint_confidence,
    };
    Pose {
        score,
        keypoints: vec![
            keypoint("nose", Point::new(shoulder.x, shoulder.y - 50.0)),
            keypoint("leftShoulder", Point::new(shoulder.x - 40.0, shoulder.y)),
            keypoint("rightShoulder", Point::new(shoulder.x + 40.0, shoulder.y)),
            keypoint("leftHip", Point::new(hip.x - 30.0, hip.y)),
            keypoint("rightHip", Point::new(hip.x + 30.0, hip.y)),
        ],
    }
}

/// Face whose nose is `yaw_percent` of the eye distance off-centre.
pub fn face_with_yaw(yaw_percent: f64) -> FaceDetection {
    let left_eye = Point::new(280.0, 200.0);
    let right_eye = Point::new(360.0, 200.0);
    let mut annotations = HashMap::new();
    annotations.insert("leftEyeUpper0".to_string(), vec![left_eye; 4]);
    annotations.insert("rightEyeUpper0".to_string(), vec![right_eye; 4]);
    annotations.insert(
        "noseTip".to_string(),
        vec![Point::new(320.0 - yaw_percent * 0.8, 240.0)],
    );
    FaceDetection {
        annotations,
        mesh: Vec::new(),
    }
}

/// Summary of a completed simulation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimReport {
    pub pose_ticks: usize,
    pub detection_ticks: usize,
    pub warnings: usize,
    pub strikes: usize,
    pub debounced: usize,
    pub strikes_by_reason: HashMap<StrikeReason, usize>,
    pub terminated_by: Option<StrikeReason>,
    /// Simulated time at which the session terminated.
    pub terminated_at: Option<Duration>,
    pub final_posture_average: f64,
}

/// Invariant violations detected during a simulation run.
#[derive(Debug)]
pub enum SimError {
    InvalidConfig(String),
    StrikeBoundExceeded {
        at: Duration,
        strikes: u32,
    },
    WarningLadderOverflow {
        at: Duration,
        violation: ViolationType,
        count: u32,
    },
    CooldownViolated {
        at: Duration,
        reason: StrikeReason,
        since_previous: Duration,
    },
    StrikeAfterTermination {
        at: Duration,
        reason: StrikeReason,
    },
    EventsAfterTermination {
        at: Duration,
        events: usize,
    },
    StrikeCountMismatch {
        at: Duration,
        reported: usize,
        engine: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Pose,
    Detection,
}

/// Orchestrates a single deterministic simulation run.
pub struct ProctorSimulator {
    config: SimConfig,
    mock_clock: Arc<MockClock>,
    start: Instant,
    state: SessionState,
    generator: SignalGenerator,
    admitted_at: HashMap<StrikeReason, Instant>,
    report: SimReport,
}

impl ProctorSimulator {
    /// Creates a new simulation instance.
    ///
    /// # Parameters
    /// - `config`: Complete simulation configuration
    ///
    /// # Errors
    /// - [`SimError::InvalidConfig`] - The proctoring thresholds are inconsistent
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config
            .proctor
            .validate()
            .map_err(|e| SimError::InvalidConfig(e.to_string()))?;

        let initial_time = Instant::now();
        let mock_clock = Arc::new(MockClock::new(initial_time));
        let state = SessionState::new(&config.proctor);
        let generator = SignalGenerator::new(&config);

        Ok(Self {
            config,
            mock_clock,
            start: initial_time,
            state,
            generator,
            admitted_at: HashMap::new(),
            report: SimReport::default(),
        })
    }

    /// Runs the whole simulated session, checking invariants after every tick.
    ///
    /// Ticks keep flowing after termination; the session must ignore them.
    ///
    /// # Errors
    /// Returns the first invariant violation observed.
    pub fn run(mut self) -> Result<SimReport, SimError> {
        let pose_interval = self.config.proctor.sampling.pose_interval;
        let detection_interval = self.config.proctor.sampling.detection_interval;
        let mut next_pose = pose_interval;
        let mut next_detection = detection_interval;

        loop {
            let (due, tick) = if next_pose <= next_detection {
                (next_pose, Tick::Pose)
            } else {
                (next_detection, Tick::Detection)
            };
            if due > self.config.duration {
                break;
            }
            self.advance_to(due);

            let was_terminated = self.state.is_terminated();
            let now = self.mock_clock.now();
            let events = match tick {
                Tick::Pose => {
                    next_pose += pose_interval;
                    self.report.pose_ticks += 1;
                    let pose = self.generator.next_pose();
                    self.state.observe_pose(pose.as_ref(), now)
                }
                Tick::Detection => {
                    next_detection += detection_interval;
                    self.report.detection_ticks += 1;
                    let sample = self.generator.next_detection();
                    let mut events = self.state.observe_faces(&sample.faces, now);
                    events.extend(self.state.observe_objects(&sample.objects, now));
                    if let Some(signal) = sample.browser {
                        events.extend(self.state.observe_browser(signal, now));
                    }
                    events
                }
            };
            trace!(?tick, at = ?due, events = events.len(), "tick applied");

            self.check_tick(due, now, was_terminated, &events)?;
        }

        self.report.final_posture_average = self.state.posture().current_average();
        debug!(
            seed = self.config.seed,
            strikes = self.report.strikes,
            terminated = self.report.terminated_by.is_some(),
            "simulation finished"
        );
        Ok(self.report)
    }

    fn advance_to(&self, due: Duration) {
        let elapsed = self.mock_clock.now().saturating_duration_since(self.start);
        if let Some(step) = due.checked_sub(elapsed) {
            self.mock_clock.advance(step);
        }
    }

    fn check_tick(
        &mut self,
        at: Duration,
        now: Instant,
        was_terminated: bool,
        events: &[ProctorEvent],
    ) -> Result<(), SimError> {
        if was_terminated && !events.is_empty() {
            return Err(SimError::EventsAfterTermination {
                at,
                events: events.len(),
            });
        }

        let cooldown = self.config.proctor.escalation.strike_cooldown;
        for event in events {
            match event {
                ProctorEvent::Warning { .. } => self.report.warnings += 1,
                ProctorEvent::StrikeDebounced { .. } => self.report.debounced += 1,
                ProctorEvent::StrikeIssued { reason, .. } => {
                    if was_terminated {
                        return Err(SimError::StrikeAfterTermination {
                            at,
                            reason: *reason,
                        });
                    }
                    if let Some(previous) = self.admitted_at.insert(*reason, now) {
                        let since_previous = now.saturating_duration_since(previous);
                        if since_previous <= cooldown {
                            return Err(SimError::CooldownViolated {
                                at,
                                reason: *reason,
                                since_previous,
                            });
                        }
                    }
                    self.report.strikes += 1;
                    *self.report.strikes_by_reason.entry(*reason).or_default() += 1;
                }
                ProctorEvent::Terminated { reason, .. } => {
                    self.report.terminated_by = Some(*reason);
                    self.report.terminated_at = Some(at);
                }
                _ => {}
            }
        }

        let escalation = self.state.escalation();
        let policy = escalation.policy();
        if escalation.strikes() > policy.max_strikes {
            return Err(SimError::StrikeBoundExceeded {
                at,
                strikes: escalation.strikes().value(),
            });
        }
        if escalation.strikes() != self.report.strikes as u32 {
            return Err(SimError::StrikeCountMismatch {
                at,
                reported: self.report.strikes,
                engine: escalation.strikes().value(),
            });
        }
        for violation in ViolationType::ALL {
            let count = escalation.warnings(violation);
            if count > policy.max_warnings {
                return Err(SimError::WarningLadderOverflow {
                    at,
                    violation,
                    count: count.value(),
                });
            }
        }
        Ok(())
    }
}

