//! Fixed-threshold violation classification.
//!
//! Pure functions turning raw detector output into judgments. None of them
//! touch escalation state; [`crate::state::SessionState`] decides what a
//! judgment does to the counters.

use crate::config::{DetectionPolicy, PosturePolicy};
use crate::constants::PHONE_CLASS_FRAGMENT;
use crate::detection::{
    EyeNoseLandmarks, FaceDetection, LEFT_HIP, LEFT_SHOULDER, NOSE, ObjectDetection, Pose,
    RIGHT_HIP, RIGHT_SHOULDER,
};
use crate::posture::spine_tilt_degrees;

/// Why a pose tick could not be measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndetectedCause {
    /// The detector returned nothing.
    NoPose,
    /// The overall pose score is under the gate.
    LowScore,
    /// A shoulder, hip or the nose is missing or below keypoint confidence.
    MissingKeypoints,
}

impl UndetectedCause {
    /// Candidate-facing guidance for this cause.
    pub const fn guidance(self) -> &'static str {
        match self {
            UndetectedCause::NoPose | UndetectedCause::LowScore => {
                "Ensure good lighting and full view of upper body."
            }
            UndetectedCause::MissingKeypoints => "Could not detect shoulders or hips.",
        }
    }
}

/// Result of gating and measuring one pose estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseMeasurement {
    /// Spine tilt in degrees.
    Tilt(f64),
    Undetected(UndetectedCause),
}

/// Posture judgment for one rolling-average value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureJudgment {
    Good,
    /// Above the warning threshold: runs the warning ladder.
    Poor,
    /// Above the severe threshold: extends the severe streak.
    Severe,
}

/// Result of inspecting the faces found in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaceJudgment {
    /// No face in frame.
    Absent,
    /// A face was found and its yaw measured.
    Present { yaw_percent: f64, looking_away: bool },
    /// A face was found but its eye/nose landmarks could not be located.
    Unmeasurable,
}

/// Applies the pose confidence gate and measures spine tilt.
pub fn measure_pose(pose: Option<&Pose>, policy: &PosturePolicy) -> PoseMeasurement {
    let Some(pose) = pose else {
        return PoseMeasurement::Undetected(UndetectedCause::NoPose);
    };
    if pose.score < policy.min_pose_score {
        return PoseMeasurement::Undetected(UndetectedCause::LowScore);
    }

    let confident = |part: &str| {
        pose.keypoint(part)
            .filter(|kp| kp.confidence >= policy.min_keypoint_confidence)
            .map(|kp| kp.position)
    };
    let (Some(left_shoulder), Some(right_shoulder), Some(left_hip), Some(right_hip), Some(_)) = (
        confident(LEFT_SHOULDER),
        confident(RIGHT_SHOULDER),
        confident(LEFT_HIP),
        confident(RIGHT_HIP),
        confident(NOSE),
    ) else {
        return PoseMeasurement::Undetected(UndetectedCause::MissingKeypoints);
    };

    PoseMeasurement::Tilt(spine_tilt_degrees(
        left_shoulder.midpoint(right_shoulder),
        left_hip.midpoint(right_hip),
    ))
}

/// Classifies a rolling-average tilt.
pub fn judge_posture(average_angle: f64, policy: &PosturePolicy) -> PostureJudgment {
    if average_angle > policy.severe_angle {
        PostureJudgment::Severe
    } else if average_angle > policy.warn_angle {
        PostureJudgment::Poor
    } else {
        PostureJudgment::Good
    }
}

/// Horizontal nose offset from the eye midpoint, as a percentage of eye distance.
///
/// Coincident eyes are treated as one pixel apart.
pub fn normalized_yaw(landmarks: &EyeNoseLandmarks) -> f64 {
    let mid_eye_x = (landmarks.left_eye.x + landmarks.right_eye.x) / 2.0;
    let yaw = mid_eye_x - landmarks.nose_tip.x;
    let mut face_width = (landmarks.left_eye.x - landmarks.right_eye.x).abs();
    if face_width == 0.0 {
        face_width = 1.0;
    }
    yaw / face_width * 100.0
}

/// Judges the first detected face.
pub fn judge_faces(faces: &[FaceDetection], policy: &DetectionPolicy) -> FaceJudgment {
    let Some(face) = faces.first() else {
        return FaceJudgment::Absent;
    };
    match face.eye_nose_landmarks() {
        Some(landmarks) => {
            let yaw_percent = normalized_yaw(&landmarks);
            FaceJudgment::Present {
                yaw_percent,
                looking_away: yaw_percent.abs() > policy.look_away_yaw_percent,
            }
        }
        None => FaceJudgment::Unmeasurable,
    }
}

/// First confident phone detection, if any.
pub fn find_phone<'a>(
    detections: &'a [ObjectDetection],
    policy: &DetectionPolicy,
) -> Option<&'a ObjectDetection> {
    detections.iter().find(|detection| {
        detection
            .class_name
            .to_lowercase()
            .contains(PHONE_CLASS_FRAGMENT)
            && detection.score > policy.phone_min_score
    })
}
