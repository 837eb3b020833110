//! The session controller.
//!
//! [`ProctorSession::run`] drives one interview from setup to its end:
//!
//! 1. **Setup**: acquire the camera (denial is fatal), load each detection
//!    model independently, fetch the questions.
//! 2. **Active**: sampler tasks report measurements over a channel; the
//!    controller's event loop applies them to the [`SessionState`] along with
//!    candidate input and the per-question countdown.
//! 3. **End**: the strike limit terminates the session, or the last answer
//!    completes it and the answers go out for evaluation.
//!
//! The event loop is the only place session state is mutated.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, interval_at};
use tracing::{debug, error, info, warn};

use crate::config::{ProctorConfig, SamplingConfig};
use crate::constants::{COUNTDOWN_RESOLUTION, COUNTDOWN_URGENT_SECS};
use crate::error::{DetectorKind, ProctorError};
use crate::evaluation::{AnswerRecord, Evaluation, EvaluationRequest, PostureSummary};
use crate::events::{ProctorEvent, StatusLevel};
use crate::questions::default_questions;
use crate::scheduler::PeriodicTask;
use crate::state::{SamplerReport, SessionState};
use crate::time::{Clock, TokioClock};
use crate::traits::{
    EvaluationSink, FaceDetector, MediaDevices, MediaStream, ModelLoader, ObjectDetector,
    PoseDetector, ProctorObserver, QuestionSource,
};
use crate::types::{BrowserSignal, StrikeCount, StrikeReason};

const REPORT_CHANNEL_CAPACITY: usize = 64;

/// Candidate-side input delivered to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    /// Replaces the draft answer to the current question.
    UpdateDraft(String),
    /// Records the draft and moves to the next question.
    SubmitAnswer,
    /// A browser focus/visibility/fullscreen event.
    Browser(BrowserSignal),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The strike limit was reached.
    Terminated {
        reason: StrikeReason,
        strikes: StrikeCount,
        answers: Vec<AnswerRecord>,
    },
    /// Every question was answered.
    Completed {
        answers: Vec<AnswerRecord>,
        posture_average: f64,
        /// `None` when the evaluation service failed.
        evaluation: Option<Evaluation>,
    },
}

impl SessionOutcome {
    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionOutcome::Terminated { .. })
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        match self {
            SessionOutcome::Terminated { answers, .. } | SessionOutcome::Completed { answers, .. } => {
                answers
            }
        }
    }
}

/// External collaborators of a session.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaDevices>,
    pub models: Arc<dyn ModelLoader>,
    pub questions: Arc<dyn QuestionSource>,
    pub evaluator: Arc<dyn EvaluationSink>,
    pub observer: Arc<dyn ProctorObserver>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("media", &self.media)
            .field("models", &self.models)
            .field("questions", &self.questions)
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}

/// Detectors that loaded successfully. A `None` modality is off for the session.
#[derive(Debug, Clone, Default)]
struct Detectors {
    pose: Option<Arc<dyn PoseDetector>>,
    face: Option<Arc<dyn FaceDetector>>,
    objects: Option<Arc<dyn ObjectDetector>>,
}

/// One proctored interview session.
#[derive(Debug)]
pub struct ProctorSession {
    config: ProctorConfig,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
}

impl ProctorSession {
    /// Creates a session.
    ///
    /// # Errors
    /// - [`ProctorError::Config`] - `config` failed validation
    pub fn new(config: ProctorConfig, collaborators: Collaborators) -> Result<Self, ProctorError> {
        config.validate()?;
        Ok(Self {
            config,
            collaborators,
            clock: Arc::new(TokioClock),
        })
    }

    /// Replaces the clock used for strike cooldowns.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ProctorConfig {
        &self.config
    }

    /// Runs the session to its end.
    ///
    /// # Parameters
    /// - `inputs`: Candidate input. Closing the channel is allowed; the
    ///   countdown still advances through the remaining questions.
    ///
    /// # Errors
    /// - [`ProctorError::MediaAccessDenied`] - The camera could not be acquired
    pub async fn run(
        self,
        inputs: mpsc::Receiver<SessionInput>,
    ) -> Result<SessionOutcome, ProctorError> {
        let media = self.acquire_media().await?;
        let detectors = self.load_detectors().await;
        let questions = self.load_questions().await;

        info!(
            questions = questions.len(),
            pose = detectors.pose.is_some(),
            face = detectors.face.is_some(),
            objects = detectors.objects.is_some(),
            "session active"
        );
        let interview = Interview {
            state: SessionState::new(&self.config),
            session: &self,
            media,
            samplers: Vec::new(),
            questions,
            current: 0,
            draft: String::new(),
            answers: Vec::new(),
            remaining_secs: 0,
        };
        Ok(interview.run(&detectors, inputs).await)
    }

    fn emit(&self, event: ProctorEvent) {
        self.collaborators.observer.on_event(&event);
    }

    async fn acquire_media(&self) -> Result<Arc<dyn MediaStream>, ProctorError> {
        self.emit(ProctorEvent::SetupProgress {
            message: "Requesting camera access...".to_string(),
        });
        match self.collaborators.media.acquire().await {
            Ok(stream) => Ok(stream),
            Err(e) => {
                error!(error = %e, "camera acquisition failed");
                self.emit(ProctorEvent::status(
                    StatusLevel::Poor,
                    "Camera Blocked",
                    "Camera access is required. Please allow camera and refresh.",
                ));
                self.emit(ProctorEvent::toast("Camera permission required"));
                Err(match e {
                    ProctorError::MediaAccessDenied(_) => e,
                    other => ProctorError::MediaAccessDenied(other.to_string()),
                })
            }
        }
    }

    async fn load_detectors(&self) -> Detectors {
        self.emit(ProctorEvent::SetupProgress {
            message: "Loading ML models...".to_string(),
        });
        let models = &self.collaborators.models;
        Detectors {
            pose: self.loaded(DetectorKind::Pose, models.load_pose().await),
            face: self.loaded(DetectorKind::Face, models.load_face().await),
            objects: self.loaded(DetectorKind::Object, models.load_objects().await),
        }
    }

    fn loaded<T: ?Sized>(
        &self,
        detector: DetectorKind,
        result: Result<Arc<T>, ProctorError>,
    ) -> Option<Arc<T>> {
        match result {
            Ok(model) => {
                debug!(%detector, "detector loaded");
                Some(model)
            }
            Err(e) => {
                warn!(%detector, error = %e, "detector unavailable; modality disabled");
                self.emit(ProctorEvent::ModelUnavailable { detector });
                None
            }
        }
    }

    async fn load_questions(&self) -> Vec<String> {
        self.emit(ProctorEvent::SetupProgress {
            message: "Generating interview questions...".to_string(),
        });
        let interview = &self.config.interview;
        let fetched = self
            .collaborators
            .questions
            .fetch_questions(
                interview.domain.as_deref(),
                interview.level.as_deref(),
                interview.question_count,
            )
            .await;

        match fetched {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => {
                warn!("question source returned no questions; using defaults");
                default_questions(interview.question_count)
            }
            Err(e) => {
                warn!(error = %e, "question fetch failed; using defaults");
                self.emit(ProctorEvent::toast(
                    "Could not load tailored questions. Using general questions.",
                ));
                default_questions(interview.question_count)
            }
        }
    }
}

/// The active phase of a session.
struct Interview<'a> {
    session: &'a ProctorSession,
    state: SessionState,
    media: Arc<dyn MediaStream>,
    samplers: Vec<PeriodicTask>,
    questions: Vec<String>,
    current: usize,
    draft: String,
    answers: Vec<AnswerRecord>,
    remaining_secs: u32,
}

impl Interview<'_> {
    async fn run(
        mut self,
        detectors: &Detectors,
        mut inputs: mpsc::Receiver<SessionInput>,
    ) -> SessionOutcome {
        let (report_tx, mut report_rx) = mpsc::channel(REPORT_CHANNEL_CAPACITY);
        self.samplers = spawn_samplers(
            &self.session.config.sampling,
            &self.media,
            detectors,
            &report_tx,
        );

        let mut countdown = interval_at(
            Instant::now() + COUNTDOWN_RESOLUTION,
            COUNTDOWN_RESOLUTION,
        );
        self.show_question();
        let mut inputs_open = true;

        loop {
            tokio::select! {
                Some(report) = report_rx.recv() => {
                    let events = self.state.apply(report, self.session.clock.now());
                    if let Some(outcome) = self.dispatch(events) {
                        return outcome;
                    }
                }
                input = inputs.recv(), if inputs_open => match input {
                    None => {
                        debug!("input channel closed");
                        inputs_open = false;
                    }
                    Some(SessionInput::UpdateDraft(text)) => self.draft = text,
                    Some(SessionInput::SubmitAnswer) => {
                        if let Some(outcome) = self.advance(&mut countdown).await {
                            return outcome;
                        }
                    }
                    Some(SessionInput::Browser(signal)) => {
                        let events = self.state.observe_browser(signal, self.session.clock.now());
                        if let Some(outcome) = self.dispatch(events) {
                            return outcome;
                        }
                    }
                },
                _ = countdown.tick() => {
                    self.remaining_secs = self.remaining_secs.saturating_sub(1);
                    self.session.emit(ProctorEvent::Countdown {
                        remaining_secs: self.remaining_secs,
                        urgent: self.remaining_secs <= COUNTDOWN_URGENT_SECS,
                    });
                    if self.remaining_secs == 0 {
                        debug!(question = self.current, "countdown expired");
                        if let Some(outcome) = self.advance(&mut countdown).await {
                            return outcome;
                        }
                    }
                }
            }
        }
    }

    /// Emits `events`; returns the outcome if they ended the session.
    fn dispatch(&mut self, events: Vec<ProctorEvent>) -> Option<SessionOutcome> {
        for event in &events {
            self.session.emit(event.clone());
        }
        let reason = self.state.escalation().terminated_by()?;
        Some(self.terminate(reason))
    }

    fn show_question(&mut self) {
        let duration = self.session.config.sampling.question_duration.as_secs();
        self.remaining_secs = u32::try_from(duration).unwrap_or(u32::MAX);
        self.session.emit(ProctorEvent::QuestionShown {
            index: self.current,
            total: self.questions.len(),
            text: self.questions[self.current].clone(),
        });
        self.session.emit(ProctorEvent::Countdown {
            remaining_secs: self.remaining_secs,
            urgent: false,
        });
    }

    /// Records the draft for the current question and moves on.
    async fn advance(&mut self, countdown: &mut Interval) -> Option<SessionOutcome> {
        let record = AnswerRecord::from_draft(self.questions[self.current].clone(), &self.draft);
        debug!(
            question = self.current,
            blank = record.is_blank(),
            "answer recorded"
        );
        self.answers.push(record);
        self.draft.clear();
        self.current += 1;

        if self.current < self.questions.len() {
            self.show_question();
            countdown.reset();
            None
        } else {
            Some(self.complete().await)
        }
    }

    fn stop_samplers(&mut self) {
        for sampler in &self.samplers {
            sampler.stop();
        }
    }

    fn terminate(&mut self, reason: StrikeReason) -> SessionOutcome {
        self.stop_samplers();
        self.media.stop();
        let strikes = self.state.escalation().strikes();
        info!(%reason, strikes = strikes.value(), "session terminated");
        SessionOutcome::Terminated {
            reason,
            strikes,
            answers: std::mem::take(&mut self.answers),
        }
    }

    async fn complete(&mut self) -> SessionOutcome {
        self.stop_samplers();
        self.state.finish();
        let posture_average = self.state.posture().current_average();
        info!(
            answered = self.answers.len(),
            posture_average, "interview completed"
        );
        self.session.emit(ProctorEvent::Completed {
            answered: self.answers.len(),
        });

        let request = EvaluationRequest {
            answers: self.answers.clone(),
            posture: PostureSummary::from_average(posture_average),
            domain: self.session.config.interview.domain.clone(),
        };
        let evaluation = match self.session.collaborators.evaluator.evaluate(&request).await {
            Ok(evaluation) => Some(evaluation),
            Err(e) => {
                warn!(error = %e, "evaluation failed");
                self.session
                    .emit(ProctorEvent::toast("Evaluation failed. Please try again later."));
                None
            }
        };
        self.media.stop();

        SessionOutcome::Completed {
            answers: std::mem::take(&mut self.answers),
            posture_average,
            evaluation,
        }
    }
}

/// Starts the posture sampler and the face/object sampler.
///
/// A sampler only runs if at least one of its detectors loaded.
fn spawn_samplers(
    sampling: &SamplingConfig,
    media: &Arc<dyn MediaStream>,
    detectors: &Detectors,
    reports: &mpsc::Sender<SamplerReport>,
) -> Vec<PeriodicTask> {
    let mut samplers = Vec::with_capacity(2);

    if let Some(pose) = &detectors.pose {
        let (media, pose, reports) = (media.clone(), pose.clone(), reports.clone());
        samplers.push(PeriodicTask::spawn(
            "pose-sampler",
            sampling.pose_interval,
            move || {
                let (media, pose, reports) = (media.clone(), pose.clone(), reports.clone());
                async move {
                    let report = match media.current_frame() {
                        None => SamplerReport::AwaitingVideo,
                        Some(frame) => match pose.estimate_pose(&frame).await {
                            Ok(estimate) => SamplerReport::Pose(estimate),
                            Err(e) => {
                                warn!(error = %e, "pose detection failed; tick skipped");
                                return;
                            }
                        },
                    };
                    send_report(&reports, report).await;
                }
            },
        ));
    }

    if detectors.face.is_some() || detectors.objects.is_some() {
        let (media, face, objects, reports) = (
            media.clone(),
            detectors.face.clone(),
            detectors.objects.clone(),
            reports.clone(),
        );
        samplers.push(PeriodicTask::spawn(
            "detection-sampler",
            sampling.detection_interval,
            move || {
                let (media, face, objects, reports) =
                    (media.clone(), face.clone(), objects.clone(), reports.clone());
                async move {
                    let Some(frame) = media.current_frame() else {
                        return;
                    };
                    if let Some(face) = face {
                        match face.estimate_faces(&frame).await {
                            Ok(faces) => send_report(&reports, SamplerReport::Faces(faces)).await,
                            Err(e) => warn!(error = %e, "face detection failed; tick skipped"),
                        }
                    }
                    if let Some(objects) = objects {
                        match objects.detect_objects(&frame).await {
                            Ok(found) => send_report(&reports, SamplerReport::Objects(found)).await,
                            Err(e) => warn!(error = %e, "object detection failed; tick skipped"),
                        }
                    }
                }
            },
        ));
    }

    samplers
}

async fn send_report(reports: &mpsc::Sender<SamplerReport>, report: SamplerReport) {
    if reports.send(report).await.is_err() {
        debug!("session ended; dropping sampler report");
    }
}
