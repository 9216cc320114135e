//! Organ position engine for Organtrack
//!
//! This crate turns body keypoints into organ placements:
//! - Keypoint schema for the body and both hands
//! - Aspect-ratio buckets and per-bucket organ profiles
//! - Distance estimation and calibration
//! - Pixel-space and target-space placement, including the whole-body variant
//! - Gesture recognition
//! - The landmark detector boundary

pub mod aspect;
pub mod detector;
pub mod distance;
pub mod error;
pub mod gesture;
pub mod keypoint;
pub mod position;
pub mod profile;
pub mod settings;

pub use aspect::{AspectRatio, ImageSize};
pub use detector::{decode_image, image_size, LandmarkDetector, NullDetector, ReplayDetector};
pub use distance::DistanceEstimator;
pub use error::EngineError;
pub use keypoint::{BodyLandmark, HandFrame, HandLandmark, Handedness, Keypoint, LandmarkFrame};
pub use position::{PositionEngine, PositionResult, Undeterminable};
pub use profile::{OrganProfile, ProfileTable};
pub use settings::{PositionSettings, PositionSpace};
