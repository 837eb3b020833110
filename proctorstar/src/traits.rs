//! Collaborator interfaces of a proctored session.
//!
//! Detectors, media capture, question supply, evaluation and UI rendering are
//! all external. The session only ever talks to them through these traits, so
//! a desktop shell, a headless test harness and the simulator can each plug in
//! their own implementations.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::detection::{FaceDetection, ObjectDetection, Pose, VideoFrame};
use crate::error::ProctorError;
use crate::evaluation::{Evaluation, EvaluationRequest};
use crate::events::ProctorEvent;

/// Single-person pose estimation.
#[async_trait]
pub trait PoseDetector: Send + Sync + Debug {
    /// Estimates the pose in `frame`.
    ///
    /// # Returns
    /// `Ok(None)` when no person was found.
    ///
    /// # Errors
    /// - [`ProctorError::DetectorFailure`] - Inference failed; the tick is skipped
    async fn estimate_pose(&self, frame: &VideoFrame) -> Result<Option<Pose>, ProctorError>;
}

/// Face landmark detection.
#[async_trait]
pub trait FaceDetector: Send + Sync + Debug {
    /// Returns every face found in `frame`, possibly none.
    async fn estimate_faces(&self, frame: &VideoFrame) -> Result<Vec<FaceDetection>, ProctorError>;
}

/// Generic object detection.
#[async_trait]
pub trait ObjectDetector: Send + Sync + Debug {
    async fn detect_objects(&self, frame: &VideoFrame)
    -> Result<Vec<ObjectDetection>, ProctorError>;
}

/// Loads the detection models. Each load may fail independently.
#[async_trait]
pub trait ModelLoader: Send + Sync + Debug {
    async fn load_pose(&self) -> Result<Arc<dyn PoseDetector>, ProctorError>;
    async fn load_face(&self) -> Result<Arc<dyn FaceDetector>, ProctorError>;
    async fn load_objects(&self) -> Result<Arc<dyn ObjectDetector>, ProctorError>;
}

/// A live camera stream.
pub trait MediaStream: Send + Sync + Debug {
    /// The latest frame, or `None` while the stream has no ready frame.
    fn current_frame(&self) -> Option<VideoFrame>;

    /// Releases every track. Idempotent.
    fn stop(&self);
}

/// Access to the candidate's camera and microphone.
#[async_trait]
pub trait MediaDevices: Send + Sync + Debug {
    /// Requests the stream.
    ///
    /// # Errors
    /// - [`ProctorError::MediaAccessDenied`] - The candidate refused access
    async fn acquire(&self) -> Result<Arc<dyn MediaStream>, ProctorError>;
}

/// Supplies interview questions.
#[async_trait]
pub trait QuestionSource: Send + Sync + Debug {
    /// Fetches up to `count` questions for the given domain and level.
    async fn fetch_questions(
        &self,
        domain: Option<&str>,
        level: Option<&str>,
        count: usize,
    ) -> Result<Vec<String>, ProctorError>;
}

/// Evaluates a completed interview.
#[async_trait]
pub trait EvaluationSink: Send + Sync + Debug {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, ProctorError>;
}

/// Text-generation backend used to write questions and grade answers.
#[async_trait]
pub trait GenerativeModel: Send + Sync + Debug {
    /// Runs `prompt` against the model named `model_id`.
    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, ProctorError>;
}

/// Receives every [`ProctorEvent`] a session emits.
///
/// Called from the session task; implementations must not block.
pub trait ProctorObserver: Send + Sync {
    fn on_event(&self, event: &ProctorEvent);
}

/// Observer that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ProctorObserver for NullObserver {
    fn on_event(&self, _event: &ProctorEvent) {}
}

impl<F> ProctorObserver for F
where
    F: Fn(&ProctorEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProctorEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FixedPose(Option<Pose>);

    #[async_trait]
    impl PoseDetector for FixedPose {
        async fn estimate_pose(&self, _frame: &VideoFrame) -> Result<Option<Pose>, ProctorError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn detectors_are_object_safe() {
        let detector: Arc<dyn PoseDetector> = Arc::new(FixedPose(Some(Pose::default())));
        let frame = VideoFrame::new(1, 1, vec![0u8; 4]);
        let pose = detector.estimate_pose(&frame).await.unwrap();
        assert_eq!(pose, Some(Pose::default()));
    }

    #[test]
    fn closures_observe_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = move |event: &ProctorEvent| sink.lock().unwrap().push(event.clone());
        observer.on_event(&ProctorEvent::toast("hello"));
        NullObserver.on_event(&ProctorEvent::toast("ignored"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
