//! Core type definitions for the proctoring state machine.
//!
//! Violation kinds, strike reasons and the counters the escalation engine
//! keeps. Counters are zero-cost newtypes so a warning count can never be
//! passed where a strike count is expected.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Macro to generate saturating counter newtypes with common implementations.
macro_rules! proctor_counter {
    (
        $(#[$meta:meta])*
        $name:ident => $label:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[derive(Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// The zero count.
            pub const ZERO: Self = Self(0);

            /// Creates a new instance
            #[inline]
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            /// Raw value
            #[inline]
            pub const fn value(self) -> u32 {
                self.0
            }

            /// Count after one more occurrence.
            #[inline]
            pub const fn incremented(self) -> Self {
                Self(self.0.saturating_add(1))
            }

            /// Formats the count against a limit, e.g. `2/3`.
            pub fn of(self, limit: u32) -> String {
                format!("{}/{}", self.0, limit)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", self.0, $label)
            }
        }

        impl Deref for $name {
            type Target = u32;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl PartialEq<u32> for $name {
            #[inline]
            fn eq(&self, other: &u32) -> bool {
                self.0 == *other
            }
        }

        impl PartialOrd<u32> for $name {
            #[inline]
            fn partial_cmp(&self, other: &u32) -> Option<std::cmp::Ordering> {
                self.0.partial_cmp(other)
            }
        }
    };
}

proctor_counter!(
    /// Per-type warning count on the escalation ladder.
    WarningCount => "warnings"
);

proctor_counter!(
    /// Global strike count for a session.
    StrikeCount => "strikes"
);

proctor_counter!(
    /// Consecutive pose ticks above the severe posture threshold.
    SevereStreak => "severe ticks"
);

/// A rule the candidate can violate. Counters and cooldowns are keyed per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationType {
    Posture,
    LookAway,
    Phone,
    FaceAbsent,
    TabSwitch,
    FocusLost,
    Fullscreen,
}

impl ViolationType {
    /// Every violation type, in a stable order.
    pub const ALL: [ViolationType; 7] = [
        ViolationType::Posture,
        ViolationType::LookAway,
        ViolationType::Phone,
        ViolationType::FaceAbsent,
        ViolationType::TabSwitch,
        ViolationType::FocusLost,
        ViolationType::Fullscreen,
    ];

    /// Wire name of the type.
    pub const fn as_str(self) -> &'static str {
        match self {
            ViolationType::Posture => "posture",
            ViolationType::LookAway => "lookAway",
            ViolationType::Phone => "phone",
            ViolationType::FaceAbsent => "faceAbsent",
            ViolationType::TabSwitch => "tabSwitch",
            ViolationType::FocusLost => "focusLost",
            ViolationType::Fullscreen => "fullscreen",
        }
    }

    /// Strike reason requested when this type exhausts its warnings.
    pub const fn strike_reason(self) -> StrikeReason {
        StrikeReason::Violation(self)
    }

    /// Index into per-type counter arrays.
    pub(crate) const fn index(self) -> usize {
        match self {
            ViolationType::Posture => 0,
            ViolationType::LookAway => 1,
            ViolationType::Phone => 2,
            ViolationType::FaceAbsent => 3,
            ViolationType::TabSwitch => 4,
            ViolationType::FocusLost => 5,
            ViolationType::Fullscreen => 6,
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cooldown key for a strike request.
///
/// Severe posture is deliberately a separate reason from moderate posture so
/// that the two escalation paths do not debounce each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrikeReason {
    /// A violation type exhausted its warning ladder.
    Violation(ViolationType),
    /// The severe posture streak reached its limit.
    PostureSevere,
}

impl fmt::Display for StrikeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrikeReason::Violation(kind) => write!(f, "{kind}"),
            StrikeReason::PostureSevere => f.write_str("posture-severe"),
        }
    }
}

/// Browser-level events that are violations by themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BrowserSignal {
    /// The document became hidden (tab switch or minimize).
    TabHidden,
    /// The interview window lost focus.
    WindowBlurred,
    /// The document left fullscreen.
    FullscreenExited,
}

impl BrowserSignal {
    /// The single violation type this signal maps to.
    pub const fn violation(self) -> ViolationType {
        match self {
            BrowserSignal::TabHidden => ViolationType::TabSwitch,
            BrowserSignal::WindowBlurred => ViolationType::FocusLost,
            BrowserSignal::FullscreenExited => ViolationType::Fullscreen,
        }
    }

    /// Candidate-facing description of the event.
    pub const fn description(self) -> &'static str {
        match self {
            BrowserSignal::TabHidden => "Switched tab or minimized window",
            BrowserSignal::WindowBlurred => "Switched focus from interview window",
            BrowserSignal::FullscreenExited => "Exited fullscreen mode",
        }
    }
}

/// A 2D image-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Midpoint between `self` and `other`.
    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}
