//! Organ profiles: which keypoints anchor an organ, where its marker is
//! offset, and how the subject's distance perturbs that offset.
//!
//! Profiles are keyed by aspect-ratio bucket and organ name so that every
//! supported image shape can carry its own table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::keypoint::{BodyLandmark, Keypoint, LandmarkFrame};

/// Name of the whole-body profile in the built-in table
pub const BODY: &str = "body";

/// A single keypoint or the centre of a pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Anchor {
    Point(BodyLandmark),
    Pair([BodyLandmark; 2]),
}

impl Anchor {
    pub fn pair(a: BodyLandmark, b: BodyLandmark) -> Self {
        Anchor::Pair([a, b])
    }

    /// Resolve against a frame; the first invalid keypoint is returned as the error
    pub fn resolve(&self, frame: &LandmarkFrame) -> Result<Keypoint, BodyLandmark> {
        match *self {
            Anchor::Point(landmark) => frame.valid(landmark).copied().ok_or(landmark),
            Anchor::Pair([a, b]) => {
                let first = frame.valid(a).ok_or(a)?;
                let second = frame.valid(b).ok_or(b)?;
                Ok(first.midpoint(second))
            }
        }
    }
}

/// Keypoint chosen by name or by schema index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LandmarkSelector {
    Index(usize),
    Name(BodyLandmark),
}

impl LandmarkSelector {
    pub fn landmark(&self) -> Option<BodyLandmark> {
        match *self {
            LandmarkSelector::Index(index) => BodyLandmark::from_index(index),
            LandmarkSelector::Name(landmark) => Some(landmark),
        }
    }
}

/// How an organ is placed from the frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    /// Single marker derived from a primary anchor and a secondary reference
    Anchored { anchor: Anchor, reference: Anchor },
    /// Every keypoint, or the selected subset, in target space
    WholeBody {
        #[serde(default)]
        landmarks: Vec<LandmarkSelector>,
    },
}

/// Static pixel-space offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelOffset {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

/// Target-space offset
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TargetOffset {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OffsetSpec {
    #[serde(default)]
    pub pixel: PixelOffset,
    #[serde(default)]
    pub target: TargetOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OffsetOperator {
    #[default]
    #[serde(rename = "add", alias = "addition")]
    Add,
    #[serde(rename = "sub", alias = "subtraction")]
    Sub,
}

/// Linear distance correction for one axis
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisOffset {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub operator: OffsetOperator,
    #[serde(default)]
    pub coefficient: f64,
}

impl AxisOffset {
    pub fn new(operator: OffsetOperator, coefficient: f64) -> Self {
        Self {
            enable: true,
            operator,
            coefficient,
        }
    }

    /// Offset contribution for a subject at `distance` metres
    pub fn delta(&self, distance: f64, minimum: f64) -> f64 {
        if !self.enable {
            return 0.0;
        }
        let delta = (distance - minimum) * self.coefficient;
        match self.operator {
            OffsetOperator::Add => delta,
            OffsetOperator::Sub => -delta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSpec {
    pub minimum: f64,
    pub maximum: f64,
    #[serde(default)]
    pub x_offset: AxisOffset,
    #[serde(default)]
    pub y_offset: AxisOffset,
    #[serde(default)]
    pub z_offset: AxisOffset,
}

impl Default for CalibrationSpec {
    fn default() -> Self {
        Self {
            minimum: 2.0,
            maximum: 40.0,
            x_offset: AxisOffset::default(),
            y_offset: AxisOffset::default(),
            z_offset: AxisOffset::default(),
        }
    }
}

impl CalibrationSpec {
    /// Whether `distance` lies inside `[minimum, maximum]`
    pub fn contains(&self, distance: f64) -> bool {
        (self.minimum..=self.maximum).contains(&distance)
    }

    /// Static target offset shifted by the distance correction
    pub fn calibrate(&self, base: TargetOffset, distance: f64) -> TargetOffset {
        TargetOffset {
            x: base.x + self.x_offset.delta(distance, self.minimum),
            y: base.y + self.y_offset.delta(distance, self.minimum),
            z: base.z + self.z_offset.delta(distance, self.minimum),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganProfile {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default)]
    pub offset: OffsetSpec,
    #[serde(default)]
    pub calibration: CalibrationSpec,
}

impl OrganProfile {
    pub fn anchored(anchor: Anchor, reference: Anchor, pixel: (i32, i32), target: (f64, f64, f64)) -> Self {
        Self {
            placement: Placement::Anchored { anchor, reference },
            offset: OffsetSpec {
                pixel: PixelOffset {
                    x: pixel.0,
                    y: pixel.1,
                },
                target: TargetOffset {
                    x: target.0,
                    y: target.1,
                    z: target.2,
                },
            },
            calibration: CalibrationSpec::default(),
        }
    }

    pub fn whole_body(landmarks: Vec<LandmarkSelector>) -> Self {
        Self {
            placement: Placement::WholeBody { landmarks },
            offset: OffsetSpec::default(),
            calibration: CalibrationSpec::default(),
        }
    }

    fn validate(&self, bucket: &str, organ: &str) -> Result<(), EngineError> {
        let invalid = |reason: String| EngineError::InvalidProfile {
            bucket: bucket.to_string(),
            organ: organ.to_string(),
            reason,
        };

        let calibration = &self.calibration;
        if !(calibration.minimum.is_finite() && calibration.maximum.is_finite()) {
            return Err(invalid("calibration bounds must be finite".to_string()));
        }
        if calibration.minimum > calibration.maximum {
            return Err(invalid(format!(
                "calibration minimum {} exceeds maximum {}",
                calibration.minimum, calibration.maximum
            )));
        }

        if let Placement::WholeBody { landmarks } = &self.placement {
            if let Some(bad) = landmarks.iter().find(|s| s.landmark().is_none()) {
                return Err(invalid(format!("landmark selector {:?} is out of range", bad)));
            }
        }
        Ok(())
    }
}

/// Profiles keyed by `(aspect-ratio bucket, organ name)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileTable {
    buckets: HashMap<String, HashMap<String, OrganProfile>>,
}

impl ProfileTable {
    pub fn get(&self, bucket: &str, organ: &str) -> Option<&OrganProfile> {
        self.buckets.get(bucket)?.get(organ)
    }

    pub fn insert(&mut self, bucket: impl Into<String>, organ: impl Into<String>, profile: OrganProfile) {
        self.buckets
            .entry(bucket.into())
            .or_default()
            .insert(organ.into(), profile);
    }

    /// Whether any bucket defines `organ`
    pub fn knows(&self, organ: &str) -> bool {
        self.buckets.values().any(|organs| organs.contains_key(organ))
    }

    /// Overlay `other` on top of this table, entry by entry
    pub fn merge(&mut self, other: ProfileTable) {
        for (bucket, organs) in other.buckets {
            for (organ, profile) in organs {
                self.insert(bucket.clone(), organ, profile);
            }
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for (bucket, organs) in &self.buckets {
            for (organ, profile) in organs {
                profile.validate(bucket, organ)?;
            }
        }
        Ok(())
    }

    /// Default profiles for every built-in bucket
    pub fn builtin() -> Self {
        use BodyLandmark::*;

        let shoulders = Anchor::pair(LeftShoulder, RightShoulder);
        let hips = Anchor::pair(LeftHip, RightHip);
        let ears = Anchor::pair(LeftEar, RightEar);

        let organs = [
            ("heart", OrganProfile::anchored(shoulders, hips, (0, -200), (0.0, -1.5, 15.0))),
            ("brain", OrganProfile::anchored(ears, Anchor::Point(Nose), (0, -50), (0.0, 1.2, 4.0))),
            ("liver", OrganProfile::anchored(shoulders, hips, (-35, -150), (-0.8, -2.0, 4.0))),
            ("stomach", OrganProfile::anchored(shoulders, hips, (30, -145), (0.85, -2.5, 4.0))),
            ("intestine", OrganProfile::anchored(shoulders, hips, (0, -100), (0.0, -2.8, 4.0))),
            ("lungs", OrganProfile::anchored(shoulders, hips, (0, -180), (0.0, -1.2, 4.0))),
            ("kidney", OrganProfile::anchored(shoulders, hips, (0, -120), (0.0, -2.6, 4.0))),
            (BODY, OrganProfile::whole_body(Vec::new())),
        ];

        let mut table = ProfileTable::default();
        for bucket in crate::aspect::BUILTIN_BUCKETS {
            for (organ, profile) in &organs {
                table.insert(*bucket, *organ, profile.clone());
            }
        }
        table
    }
}
