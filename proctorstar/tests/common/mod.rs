//! Shared fixtures for proctorstar integration tests.
//!
//! Builders for detector output with known geometry, scripted collaborators
//! that replay queued results, and an observer that records every event.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use proctorstar::detection::{
    FaceDetection, Keypoint, LEFT_HIP, LEFT_SHOULDER, NOSE, ObjectDetection, Pose, RIGHT_HIP,
    RIGHT_SHOULDER, VideoFrame,
};
use proctorstar::evaluation::{Evaluation, EvaluationRequest};
use proctorstar::traits::{
    EvaluationSink, FaceDetector, MediaDevices, MediaStream, ModelLoader, ObjectDetector,
    PoseDetector, QuestionSource,
};
use proctorstar::types::Point;
use proctorstar::{Collaborators, ProctorError, ProctorEvent, ProctorObserver};

/// A pose whose spine deviates from vertical by `degrees`, with confident keypoints.
pub fn pose_with_tilt(degrees: f64) -> Pose {
    let radians = degrees.to_radians();
    let hip = Point::new(320.0, 400.0);
    let shoulder = Point::new(
        hip.x + 180.0 * radians.sin(),
        hip.y - 180.0 * radians.cos(),
    );
    let keypoint = |part: &str, position: Point| Keypoint {
        part: part.to_string(),
        position,
        confidence: 0.95,
    };
    Pose {
        score: 0.9,
        keypoints: vec![
            keypoint(NOSE, Point::new(shoulder.x, shoulder.y - 50.0)),
            keypoint(LEFT_SHOULDER, Point::new(shoulder.x - 40.0, shoulder.y)),
            keypoint(RIGHT_SHOULDER, Point::new(shoulder.x + 40.0, shoulder.y)),
            keypoint(LEFT_HIP, Point::new(hip.x - 30.0, hip.y)),
            keypoint(RIGHT_HIP, Point::new(hip.x + 30.0, hip.y)),
        ],
    }
}

/// A face whose nose sits `yaw_percent` of the eye distance off the eye midpoint.
pub fn face_with_yaw(yaw_percent: f64) -> FaceDetection {
    let left_eye = Point::new(280.0, 200.0);
    let right_eye = Point::new(360.0, 200.0);
    let mid_x = (left_eye.x + right_eye.x) / 2.0;
    let nose_tip = Point::new(mid_x - yaw_percent / 100.0 * 80.0, 240.0);

    let mut annotations = HashMap::new();
    annotations.insert("leftEyeUpper0".to_string(), vec![left_eye; 7]);
    annotations.insert("rightEyeUpper0".to_string(), vec![right_eye; 7]);
    annotations.insert("noseTip".to_string(), vec![nose_tip]);
    FaceDetection {
        annotations,
        mesh: Vec::new(),
    }
}

pub fn phone(score: f64) -> ObjectDetection {
    ObjectDetection::new("cell phone", score)
}

pub fn frame() -> VideoFrame {
    VideoFrame::new(640, 480, vec![0u8; 16])
}

/// Records every event in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ProctorEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<ProctorEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn strike_count(&self) -> usize {
        self.events().iter().filter(|e| e.is_strike()).count()
    }

    pub fn count_matching(&self, predicate: impl Fn(&ProctorEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl ProctorObserver for RecordingObserver {
    fn on_event(&self, event: &ProctorEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Pops one queued result per call; repeats `idle` once the queue is empty.
#[derive(Debug)]
pub struct Script<T: Clone> {
    queue: Mutex<VecDeque<Result<T, ProctorError>>>,
    idle: T,
}

impl<T: Clone> Script<T> {
    pub fn new(idle: T) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            idle,
        }
    }

    pub fn push(&self, item: T) {
        self.queue.lock().unwrap().push_back(Ok(item));
    }

    pub fn push_err(&self, err: ProctorError) {
        self.queue.lock().unwrap().push_back(Err(err));
    }

    fn next(&self) -> Result<T, ProctorError> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.idle.clone()))
    }
}

#[derive(Debug)]
pub struct ScriptedPose(pub Script<Option<Pose>>);

#[async_trait]
impl PoseDetector for ScriptedPose {
    async fn estimate_pose(&self, _frame: &VideoFrame) -> Result<Option<Pose>, ProctorError> {
        self.0.next()
    }
}

#[derive(Debug)]
pub struct ScriptedFaces(pub Script<Vec<FaceDetection>>);

#[async_trait]
impl FaceDetector for ScriptedFaces {
    async fn estimate_faces(&self, _frame: &VideoFrame) -> Result<Vec<FaceDetection>, ProctorError> {
        self.0.next()
    }
}

#[derive(Debug)]
pub struct ScriptedObjects(pub Script<Vec<ObjectDetection>>);

#[async_trait]
impl ObjectDetector for ScriptedObjects {
    async fn detect_objects(
        &self,
        _frame: &VideoFrame,
    ) -> Result<Vec<ObjectDetection>, ProctorError> {
        self.0.next()
    }
}

/// Detectors that behave well unless scripted otherwise.
#[derive(Debug)]
pub struct ScriptedModels {
    pub pose: Arc<ScriptedPose>,
    pub faces: Arc<ScriptedFaces>,
    pub objects: Arc<ScriptedObjects>,
    pub face_load_fails: AtomicBool,
}

impl Default for ScriptedModels {
    fn default() -> Self {
        Self {
            pose: Arc::new(ScriptedPose(Script::new(Some(pose_with_tilt(3.0))))),
            faces: Arc::new(ScriptedFaces(Script::new(vec![face_with_yaw(0.0)]))),
            objects: Arc::new(ScriptedObjects(Script::new(Vec::new()))),
            face_load_fails: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ModelLoader for ScriptedModels {
    async fn load_pose(&self) -> Result<Arc<dyn PoseDetector>, ProctorError> {
        Ok(self.pose.clone())
    }

    async fn load_face(&self) -> Result<Arc<dyn FaceDetector>, ProctorError> {
        if self.face_load_fails.load(Ordering::SeqCst) {
            return Err(ProctorError::DetectorUnavailable {
                detector: proctorstar::DetectorKind::Face,
                reason: "weights missing".to_string(),
            });
        }
        Ok(self.faces.clone())
    }

    async fn load_objects(&self) -> Result<Arc<dyn ObjectDetector>, ProctorError> {
        Ok(self.objects.clone())
    }
}

/// A camera that always has a frame until stopped.
#[derive(Debug, Default)]
pub struct FakeStream {
    stopped: AtomicBool,
}

impl FakeStream {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl MediaStream for FakeStream {
    fn current_frame(&self) -> Option<VideoFrame> {
        (!self.is_stopped()).then(frame)
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct FakeCamera {
    pub stream: Arc<FakeStream>,
    pub deny: AtomicBool,
}

#[async_trait]
impl MediaDevices for FakeCamera {
    async fn acquire(&self) -> Result<Arc<dyn MediaStream>, ProctorError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(ProctorError::MediaAccessDenied(
                "NotAllowedError".to_string(),
            ));
        }
        Ok(self.stream.clone())
    }
}

#[derive(Debug)]
pub struct FixedQuestions(pub Result<Vec<String>, ProctorError>);

#[async_trait]
impl QuestionSource for FixedQuestions {
    async fn fetch_questions(
        &self,
        _domain: Option<&str>,
        _level: Option<&str>,
        _count: usize,
    ) -> Result<Vec<String>, ProctorError> {
        self.0.clone()
    }
}

/// Stores the last request and answers with a fixed evaluation.
#[derive(Debug, Default)]
pub struct CapturingEvaluator {
    pub requests: Mutex<Vec<EvaluationRequest>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl EvaluationSink for CapturingEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, ProctorError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProctorError::Evaluation("service down".to_string()));
        }
        Ok(Evaluation {
            overall_proficiency: "Intermediate".to_string(),
            feedback: "Clear answers.".to_string(),
            results: Vec::new(),
        })
    }
}

/// Handles to every fake behind a [`Collaborators`] set.
pub struct Harness {
    pub camera: Arc<FakeCamera>,
    pub models: Arc<ScriptedModels>,
    pub evaluator: Arc<CapturingEvaluator>,
    pub observer: Arc<RecordingObserver>,
    pub questions: Vec<String>,
}

impl Harness {
    pub fn new(questions: &[&str]) -> Self {
        Self {
            camera: Arc::new(FakeCamera::default()),
            models: Arc::new(ScriptedModels::default()),
            evaluator: Arc::new(CapturingEvaluator::default()),
            observer: Arc::new(RecordingObserver::default()),
            questions: questions.iter().map(|q| q.to_string()).collect(),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        self.collaborators_with_questions(Ok(self.questions.clone()))
    }

    pub fn collaborators_with_questions(
        &self,
        questions: Result<Vec<String>, ProctorError>,
    ) -> Collaborators {
        Collaborators {
            media: self.camera.clone(),
            models: self.models.clone(),
            questions: Arc::new(FixedQuestions(questions)),
            evaluator: self.evaluator.clone(),
            observer: self.observer.clone(),
        }
    }
}
