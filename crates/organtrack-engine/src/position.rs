//! Position Engine
//!
//! Maps a landmark frame, an organ name and the image size to a placement
//! for the rendering client. The pipeline is:
//!
//! 1. classify the image into an aspect-ratio bucket,
//! 2. resolve the organ's anchor keypoints,
//! 3. estimate the subject's distance from the camera,
//! 4. shift the organ offsets by the distance calibration,
//! 5. project into pixel space or target space.
//!
//! Every step that cannot proceed yields `PositionResult::Undeterminable`;
//! a subject outside the calibrated distance range yields
//! `PositionResult::OutOfRange` instead.

use std::fmt;

use organtrack_protocol::{BodyPoint, PixelPoint, TargetPoint};

use crate::aspect::{classify, parse_buckets, AspectRatio, ImageSize};
use crate::distance::DistanceEstimator;
use crate::error::EngineError;
use crate::keypoint::{BodyLandmark, Keypoint, LandmarkFrame};
use crate::profile::{PixelOffset, Placement, ProfileTable, TargetOffset};
use crate::settings::{PositionSettings, PositionSpace};

/// Why no placement could be derived from a frame
#[derive(Debug, Clone, PartialEq)]
pub enum Undeterminable {
    UnknownOrgan(String),
    UnknownAspectRatio { width: u32, height: u32 },
    MissingProfile { bucket: String, organ: String },
    InvalidLandmark(BodyLandmark),
    IncompleteFrame { count: usize },
    NonFinite,
}

impl fmt::Display for Undeterminable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Undeterminable::UnknownOrgan(organ) => write!(f, "unknown organ `{}`", organ),
            Undeterminable::UnknownAspectRatio { width, height } => {
                write!(f, "no aspect ratio bucket for {}x{}", width, height)
            }
            Undeterminable::MissingProfile { bucket, organ } => {
                write!(f, "no profile for {} in bucket {}", organ, bucket)
            }
            Undeterminable::InvalidLandmark(landmark) => {
                write!(f, "landmark {} is missing or off screen", landmark)
            }
            Undeterminable::IncompleteFrame { count } => write!(
                f,
                "frame has {} body keypoints, expected {}",
                count,
                BodyLandmark::COUNT
            ),
            Undeterminable::NonFinite => f.write_str("computation produced a non-finite value"),
        }
    }
}

/// Outcome of one position computation
#[derive(Debug, Clone, PartialEq)]
pub enum PositionResult {
    /// Single organ in target space
    Target(TargetPoint),
    /// Whole-body keypoints in target space
    Body(Vec<BodyPoint>),
    /// Single organ in pixel space
    Pixel(PixelPoint),
    /// Estimated distance (metres) outside the calibrated range
    OutOfRange(f64),
    Undeterminable(Undeterminable),
}

impl PositionResult {
    pub fn is_placement(&self) -> bool {
        matches!(
            self,
            PositionResult::Target(_) | PositionResult::Body(_) | PositionResult::Pixel(_)
        )
    }
}

/// Data-driven organ placement
#[derive(Debug, Clone)]
pub struct PositionEngine {
    settings: PositionSettings,
    buckets: Vec<AspectRatio>,
    profiles: ProfileTable,
    distance: DistanceEstimator,
}

impl PositionEngine {
    pub fn new(settings: PositionSettings, profiles: ProfileTable) -> Result<Self, EngineError> {
        settings.validate()?;
        profiles.validate()?;
        let buckets = parse_buckets(&settings.aspect_ratios)?;

        if let Some(organ) = settings
            .supported_organs
            .iter()
            .find(|organ| !profiles.knows(organ))
        {
            return Err(EngineError::InvalidSettings(format!(
                "no profile defines supported organ `{}`",
                organ
            )));
        }

        let distance =
            DistanceEstimator::new(settings.known_height_pixels, settings.known_height_meters);

        Ok(Self {
            settings,
            buckets,
            profiles,
            distance,
        })
    }

    /// Engine over the built-in profile table
    pub fn builtin(settings: PositionSettings) -> Result<Self, EngineError> {
        Self::new(settings, ProfileTable::builtin())
    }

    pub fn settings(&self) -> &PositionSettings {
        &self.settings
    }

    pub fn supports(&self, organ: &str) -> bool {
        self.settings.supported_organs.iter().any(|o| o == organ)
    }

    pub fn classify(&self, size: ImageSize) -> Option<&AspectRatio> {
        classify(&self.buckets, size, self.settings.aspect_tolerance)
    }

    /// Compute a placement in the configured output space
    pub fn compute_organ_position(
        &self,
        frame: &LandmarkFrame,
        organ: &str,
        size: ImageSize,
    ) -> PositionResult {
        self.compute_organ_position_in(frame, organ, size, self.settings.output_space)
    }

    /// Compute a placement in an explicit output space.
    ///
    /// Whole-body profiles always report target space.
    pub fn compute_organ_position_in(
        &self,
        frame: &LandmarkFrame,
        organ: &str,
        size: ImageSize,
        space: PositionSpace,
    ) -> PositionResult {
        match self.try_compute(frame, organ, size, space) {
            Ok(result) => result,
            Err(reason) => PositionResult::Undeterminable(reason),
        }
    }

    fn try_compute(
        &self,
        frame: &LandmarkFrame,
        organ: &str,
        size: ImageSize,
        space: PositionSpace,
    ) -> Result<PositionResult, Undeterminable> {
        if !self.supports(organ) {
            return Err(Undeterminable::UnknownOrgan(organ.to_string()));
        }

        let bucket = self
            .classify(size)
            .ok_or(Undeterminable::UnknownAspectRatio {
                width: size.width,
                height: size.height,
            })?;

        let profile = self.profiles.get(bucket.name(), organ).ok_or_else(|| {
            Undeterminable::MissingProfile {
                bucket: bucket.name().to_string(),
                organ: organ.to_string(),
            }
        })?;

        match &profile.placement {
            Placement::Anchored { anchor, reference } => {
                let primary = anchor
                    .resolve(frame)
                    .map_err(Undeterminable::InvalidLandmark)?;
                let secondary = reference
                    .resolve(frame)
                    .map_err(Undeterminable::InvalidLandmark)?;

                let distance = self
                    .distance
                    .estimate(frame, size)
                    .map_err(Undeterminable::InvalidLandmark)?;
                if !profile.calibration.contains(distance) {
                    return Ok(PositionResult::OutOfRange(distance));
                }

                match space {
                    PositionSpace::Target => {
                        let offset = profile
                            .calibration
                            .calibrate(profile.offset.target, distance);
                        Ok(PositionResult::Target(self.to_target(&primary, size, offset)?))
                    }
                    PositionSpace::Pixel => Ok(PositionResult::Pixel(to_pixel(
                        &primary,
                        &secondary,
                        size,
                        profile.offset.pixel,
                    )?)),
                }
            }
            Placement::WholeBody { landmarks } => {
                if !frame.is_complete() {
                    return Err(Undeterminable::IncompleteFrame {
                        count: frame.body().len(),
                    });
                }

                let distance = self
                    .distance
                    .estimate(frame, size)
                    .map_err(Undeterminable::InvalidLandmark)?;
                if !profile.calibration.contains(distance) {
                    return Ok(PositionResult::OutOfRange(distance));
                }

                let offset = profile
                    .calibration
                    .calibrate(profile.offset.target, distance);

                let selected: Vec<BodyLandmark> = if landmarks.is_empty() {
                    BodyLandmark::ALL.to_vec()
                } else {
                    landmarks.iter().filter_map(|s| s.landmark()).collect()
                };

                let points = selected
                    .into_iter()
                    .map(|landmark| {
                        let keypoint = frame
                            .valid(landmark)
                            .ok_or(Undeterminable::InvalidLandmark(landmark))?;
                        let point = self.to_target(keypoint, size, offset)?;
                        Ok(BodyPoint {
                            index: landmark.index(),
                            name: landmark.name().to_string(),
                            x: point.x,
                            y: point.y,
                            z: point.z,
                        })
                    })
                    .collect::<Result<Vec<_>, Undeterminable>>()?;

                Ok(PositionResult::Body(points))
            }
        }
    }

    /// Project a keypoint into the centred target space
    fn to_target(
        &self,
        keypoint: &Keypoint,
        size: ImageSize,
        offset: TargetOffset,
    ) -> Result<TargetPoint, Undeterminable> {
        let w = f64::from(size.width);
        let h = f64::from(size.height);

        let xu = (keypoint.x - 0.5) * 2.0;
        let yu = ((1.0 - keypoint.y) - 0.5) * 2.0;

        let x = round4(xu * w / 100.0 + offset.x);
        let y = round4(yu * h / 100.0 + offset.y);
        // Coarse depth bucket; the quantization is part of the client contract.
        let z = ((w * keypoint.z + self.settings.depth_bias) / self.settings.depth_divisor
            + offset.z)
            .floor();

        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return Err(Undeterminable::NonFinite);
        }
        Ok(TargetPoint { x, y, z: z as i64 })
    }
}

/// Project the primary anchor into image pixels
fn to_pixel(
    primary: &Keypoint,
    secondary: &Keypoint,
    size: ImageSize,
    offset: PixelOffset,
) -> Result<PixelPoint, Undeterminable> {
    let w = f64::from(size.width);
    let h = f64::from(size.height);

    let x = (primary.x * w).trunc() + f64::from(offset.x);
    let y = ((primary.y + (secondary.y - primary.y)) * h + f64::from(offset.y)).trunc();
    let z = (primary.z * w).trunc();

    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return Err(Undeterminable::NonFinite);
    }
    Ok(PixelPoint {
        x: x as i32,
        y: y as i32,
        z: z as i32,
    })
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{AxisOffset, OffsetOperator, OrganProfile, LandmarkSelector};

    const PORTRAIT: ImageSize = ImageSize {
        width: 1080,
        height: 1920,
    };

    /// Upright subject filling most of a portrait frame
    fn standing_frame() -> LandmarkFrame {
        use BodyLandmark::*;

        let mut body = vec![Keypoint::new(0.5, 0.5, 0.0); BodyLandmark::COUNT];
        let mut set = |landmark: BodyLandmark, x: f64, y: f64, z: f64| {
            body[landmark.index()] = Keypoint::new(x, y, z);
        };
        set(Nose, 0.5, 0.15, -0.35);
        set(LeftEar, 0.45, 0.12, -0.3);
        set(RightEar, 0.55, 0.12, -0.3);
        set(LeftShoulder, 0.4, 0.25, -0.2);
        set(RightShoulder, 0.6, 0.25, -0.2);
        set(LeftHip, 0.45, 0.5, 0.0);
        set(RightHip, 0.55, 0.5, 0.0);
        set(LeftFootIndex, 0.48, 0.9, 0.1);
        set(RightFootIndex, 0.52, 0.9, 0.1);
        LandmarkFrame::new(body)
    }

    fn engine() -> PositionEngine {
        PositionEngine::builtin(PositionSettings::default()).unwrap()
    }

    fn engine_with_heart(calibration: impl FnOnce(&mut OrganProfile)) -> PositionEngine {
        let mut table = ProfileTable::builtin();
        let mut heart = table.get("16_by_9", "heart").unwrap().clone();
        calibration(&mut heart);
        table.insert("16_by_9", "heart", heart);
        PositionEngine::new(PositionSettings::default(), table).unwrap()
    }

    #[test]
    fn test_heart_target_position() {
        let result = engine().compute_organ_position(&standing_frame(), "heart", PORTRAIT);
        let PositionResult::Target(point) = result else {
            panic!("expected target placement, got {:?}", result);
        };
        assert_eq!(point.x, 0.0);
        assert_eq!(point.y, 8.1);
        // floor((1080 * -0.2 + 3) / 300 + 15) = floor(14.29)
        assert_eq!(point.z, 14);
    }

    #[test]
    fn test_heart_pixel_position() {
        let result = engine().compute_organ_position_in(
            &standing_frame(),
            "heart",
            PORTRAIT,
            PositionSpace::Pixel,
        );
        assert_eq!(
            result,
            PositionResult::Pixel(PixelPoint {
                x: 540,
                y: 760,
                z: -216
            })
        );
    }

    #[test]
    fn test_brain_uses_ears_and_nose() {
        let result = engine().compute_organ_position(&standing_frame(), "brain", PORTRAIT);
        let PositionResult::Target(point) = result else {
            panic!("expected target placement, got {:?}", result);
        };
        assert!(point.x.abs() < 1e-9);
        assert!((point.y - 15.792).abs() < 1e-9);
        assert_eq!(point.z, 2);
    }

    #[test]
    fn test_computation_is_deterministic() {
        let engine = engine();
        let frame = standing_frame();
        for organ in ["heart", "brain", "liver", "stomach", "intestine", "body"] {
            let first = engine.compute_organ_position(&frame, organ, PORTRAIT);
            let second = engine.compute_organ_position(&frame, organ, PORTRAIT);
            assert!(first.is_placement(), "{} gave {:?}", organ, first);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_invalid_anchor_is_undeterminable() {
        let mut body = standing_frame().body().to_vec();
        body[BodyLandmark::LeftShoulder.index()] = Keypoint::new(1.2, 0.25, 0.0);
        let frame = LandmarkFrame::new(body);

        assert_eq!(
            engine().compute_organ_position(&frame, "heart", PORTRAIT),
            PositionResult::Undeterminable(Undeterminable::InvalidLandmark(
                BodyLandmark::LeftShoulder
            ))
        );
        // brain does not depend on the shoulders
        assert!(engine()
            .compute_organ_position(&frame, "brain", PORTRAIT)
            .is_placement());
    }

    #[test]
    fn test_empty_frame_is_undeterminable() {
        let result = engine().compute_organ_position(&LandmarkFrame::default(), "heart", PORTRAIT);
        assert!(matches!(
            result,
            PositionResult::Undeterminable(Undeterminable::InvalidLandmark(_))
        ));
    }

    #[test]
    fn test_square_image_is_undeterminable() {
        let result =
            engine().compute_organ_position(&standing_frame(), "heart", ImageSize::new(1000, 1000));
        assert_eq!(
            result,
            PositionResult::Undeterminable(Undeterminable::UnknownAspectRatio {
                width: 1000,
                height: 1000
            })
        );
    }

    #[test]
    fn test_unknown_organ() {
        let result = engine().compute_organ_position(&standing_frame(), "spleen", PORTRAIT);
        assert_eq!(
            result,
            PositionResult::Undeterminable(Undeterminable::UnknownOrgan("spleen".to_string()))
        );
    }

    #[test]
    fn test_subject_too_close_is_out_of_range() {
        let mut body = standing_frame().body().to_vec();
        body[BodyLandmark::LeftFootIndex.index()] = Keypoint::new(0.48, 0.2, 0.0);
        body[BodyLandmark::RightFootIndex.index()] = Keypoint::new(0.52, 0.2, 0.0);
        let frame = LandmarkFrame::new(body);

        // 0.05 * 1920 = 96 px -> 1.68 m, below the 2 m minimum
        let result = engine().compute_organ_position(&frame, "heart", PORTRAIT);
        let PositionResult::OutOfRange(distance) = result else {
            panic!("expected out of range, got {:?}", result);
        };
        assert!((distance - 1.68).abs() < 1e-9);
    }

    #[test]
    fn test_subject_too_far_is_out_of_range() {
        let engine = engine_with_heart(|heart| heart.calibration.maximum = 20.0);
        // nose-to-feet is 1440 px -> 25.2 m
        let result = engine.compute_organ_position(&standing_frame(), "heart", PORTRAIT);
        assert!(matches!(result, PositionResult::OutOfRange(d) if (d - 25.2).abs() < 1e-9));
    }

    #[test]
    fn test_calibration_shifts_target_offset() {
        let engine = engine_with_heart(|heart| {
            heart.calibration.minimum = 20.0;
            heart.calibration.maximum = 30.0;
            heart.calibration.y_offset = AxisOffset::new(OffsetOperator::Sub, 0.1);
            heart.calibration.z_offset = AxisOffset::new(OffsetOperator::Add, 1.0);
        });

        let result = engine.compute_organ_position(&standing_frame(), "heart", PORTRAIT);
        let PositionResult::Target(point) = result else {
            panic!("expected target placement, got {:?}", result);
        };
        // y: 8.1 - (25.2 - 20) * 0.1
        assert!((point.y - 7.58).abs() < 1e-9);
        // z: floor(14.29 + 5.2)
        assert_eq!(point.z, 19);
    }

    #[test]
    fn test_whole_body_emits_every_keypoint() {
        let result = engine().compute_organ_position(&standing_frame(), "body", PORTRAIT);
        let PositionResult::Body(points) = result else {
            panic!("expected body placement, got {:?}", result);
        };
        assert_eq!(points.len(), BodyLandmark::COUNT);
        assert_eq!(points[0].name, "NOSE");
        assert_eq!(points[32].index, 32);
    }

    #[test]
    fn test_whole_body_subset() {
        let mut table = ProfileTable::builtin();
        table.insert(
            "16_by_9",
            "body",
            OrganProfile::whole_body(vec![
                LandmarkSelector::Name(BodyLandmark::LeftWrist),
                LandmarkSelector::Index(0),
            ]),
        );
        let engine = PositionEngine::new(PositionSettings::default(), table).unwrap();

        let result = engine.compute_organ_position(&standing_frame(), "body", PORTRAIT);
        let PositionResult::Body(points) = result else {
            panic!("expected body placement, got {:?}", result);
        };
        let names: Vec<&str> = points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["LEFT_WRIST", "NOSE"]);
    }

    #[test]
    fn test_whole_body_requires_complete_frame() {
        let mut body = standing_frame().body().to_vec();
        body.pop();
        let result = engine().compute_organ_position(&LandmarkFrame::new(body), "body", PORTRAIT);
        assert_eq!(
            result,
            PositionResult::Undeterminable(Undeterminable::IncompleteFrame { count: 32 })
        );
    }

    #[test]
    fn test_whole_body_rejects_off_screen_keypoint() {
        let mut body = standing_frame().body().to_vec();
        body[BodyLandmark::LeftWrist.index()] = Keypoint::new(1.3, -0.4, 0.0);
        let result = engine().compute_organ_position(&LandmarkFrame::new(body), "body", PORTRAIT);
        assert_eq!(
            result,
            PositionResult::Undeterminable(Undeterminable::InvalidLandmark(
                BodyLandmark::LeftWrist
            ))
        );
    }

    #[test]
    fn test_rejects_supported_organ_without_profile() {
        let mut settings = PositionSettings::default();
        settings.supported_organs.push("spleen".to_string());
        assert!(PositionEngine::builtin(settings).is_err());
    }
}
