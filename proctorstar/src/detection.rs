//! Detector output structures.
//!
//! These mirror what the pose, face and object models hand back. The models
//! themselves are black boxes behind the traits in [`crate::traits`].

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DeserializeAs, serde_as};

use crate::constants::{MESH_LEFT_EYE_VERTEX, MESH_NOSE_TIP_VERTEX, MESH_RIGHT_EYE_VERTEX};
use crate::types::Point;

/// Keypoint names required for a spine-tilt measurement.
pub const LEFT_SHOULDER: &str = "leftShoulder";
pub const RIGHT_SHOULDER: &str = "rightShoulder";
pub const LEFT_HIP: &str = "leftHip";
pub const RIGHT_HIP: &str = "rightHip";
pub const NOSE: &str = "nose";

/// Face annotation keys and the index used within each contour.
pub const ANNOTATION_LEFT_EYE: (&str, usize) = ("leftEyeUpper0", 3);
pub const ANNOTATION_RIGHT_EYE: (&str, usize) = ("rightEyeUpper0", 3);
pub const ANNOTATION_NOSE_TIP: (&str, usize) = ("noseTip", 0);

/// A single captured video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Raw pixel data in whatever layout the detectors expect.
    pub data: Bytes,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
        }
    }
}

/// A named body keypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub part: String,
    pub position: Point,
    #[serde(alias = "score")]
    pub confidence: f64,
}

/// A single-person pose estimate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub score: f64,
    pub keypoints: Vec<Keypoint>,
}

impl Pose {
    /// Looks up a keypoint by part name.
    pub fn keypoint(&self, part: &str) -> Option<&Keypoint> {
        self.keypoints.iter().find(|kp| kp.part == part)
    }
}

/// Eye and nose positions used for yaw estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeNoseLandmarks {
    pub left_eye: Point,
    pub right_eye: Point,
    pub nose_tip: Point,
}

/// One detected face.
///
/// Detectors report either named contours (`annotations`), a dense mesh, or
/// both. Named contours take precedence.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceDetection {
    #[serde(default)]
    #[serde_as(deserialize_as = "HashMap<_, Vec<Vertex>>")]
    pub annotations: HashMap<String, Vec<Point>>,
    #[serde(default, rename = "scaledMesh")]
    #[serde_as(deserialize_as = "Vec<Vertex>")]
    pub mesh: Vec<Point>,
}

// Landmark vertex as face models emit it: `[x, y]`, `[x, y, z]` or `{x, y}`. Depth is dropped.
struct Vertex;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVertex {
    Object { x: f64, y: f64 },
    Coordinates(Vec<f64>),
}

impl<'de> DeserializeAs<'de, Point> for Vertex {
    fn deserialize_as<D>(deserializer: D) -> Result<Point, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawVertex::deserialize(deserializer)? {
            RawVertex::Object { x, y } => Ok(Point::new(x, y)),
            RawVertex::Coordinates(c) if (2..=3).contains(&c.len()) => {
                Ok(Point::new(c[0], c[1]))
            }
            RawVertex::Coordinates(c) => {
                Err(D::Error::invalid_length(c.len(), &"2 or 3 coordinates"))
            }
        }
    }
}

impl FaceDetection {
    /// Extracts the eye/nose triple, preferring named annotations over mesh vertices.
    pub fn eye_nose_landmarks(&self) -> Option<EyeNoseLandmarks> {
        self.from_annotations().or_else(|| self.from_mesh())
    }

    fn from_annotations(&self) -> Option<EyeNoseLandmarks> {
        let pick = |(key, index): (&str, usize)| {
            self.annotations
                .get(key)
                .and_then(|contour| contour.get(index))
                .copied()
        };
        Some(EyeNoseLandmarks {
            left_eye: pick(ANNOTATION_LEFT_EYE)?,
            right_eye: pick(ANNOTATION_RIGHT_EYE)?,
            nose_tip: pick(ANNOTATION_NOSE_TIP)?,
        })
    }

    fn from_mesh(&self) -> Option<EyeNoseLandmarks> {
        Some(EyeNoseLandmarks {
            left_eye: *self.mesh.get(MESH_LEFT_EYE_VERTEX)?,
            right_eye: *self.mesh.get(MESH_RIGHT_EYE_VERTEX)?,
            nose_tip: *self.mesh.get(MESH_NOSE_TIP_VERTEX)?,
        })
    }
}

/// One object-detector prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetection {
    #[serde(rename = "class")]
    pub class_name: String,
    pub score: f64,
}

impl ObjectDetection {
    pub fn new(class_name: impl Into<String>, score: f64) -> Self {
        Self {
            class_name: class_name.into(),
            score,
        }
    }
}
