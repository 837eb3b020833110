//! Spine-tilt measurement and rolling posture aggregation.

use std::collections::VecDeque;

use crate::constants::POSTURE_WINDOW;
use crate::types::Point;

/// Fixed-capacity FIFO of spine-tilt samples.
///
/// The average is always recomputed from the buffered samples, so it reflects
/// exactly the last `min(n, window)` recorded angles.
#[derive(Debug, Clone)]
pub struct PostureAggregator {
    samples: VecDeque<f64>,
    window: usize,
}

impl PostureAggregator {
    /// Creates an aggregator averaging over the last `window` samples.
    ///
    /// A zero window is treated as one sample.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window + 1),
            window,
        }
    }

    /// Appends a sample, evicting the oldest once the window is exceeded.
    pub fn record_angle(&mut self, angle: f64) {
        self.samples.push_back(angle);
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
    }

    /// Mean of the buffered samples, or `0.0` when nothing has been recorded.
    pub fn current_average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Samples from oldest to newest.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for PostureAggregator {
    fn default() -> Self {
        Self::new(POSTURE_WINDOW)
    }
}

/// Deviation of the shoulder-to-hip line from vertical, in degrees.
///
/// The line angle relative to horizontal is folded into `[0, 180)` before
/// taking `|angle - 90|`, so leaning left and right by the same amount yield
/// the same value and an upright spine yields `0`.
pub fn spine_tilt_degrees(shoulder_mid: Point, hip_mid: Point) -> f64 {
    let dy = shoulder_mid.y - hip_mid.y;
    let dx = shoulder_mid.x - hip_mid.x;
    let degrees = dy.atan2(dx).to_degrees().rem_euclid(180.0);
    (degrees - 90.0).abs()
}
