//! Landmark detector boundary and image decoding.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, GenericImageView};

use crate::aspect::ImageSize;
use crate::error::EngineError;
use crate::keypoint::LandmarkFrame;

/// Pose model that turns an image into keypoints.
///
/// Implementations must not fail: no subject, or any internal problem, is
/// reported as `None`.
pub trait LandmarkDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Option<LandmarkFrame>;
}

/// Detector that never finds anyone
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

impl LandmarkDetector for NullDetector {
    fn detect(&self, _image: &DynamicImage) -> Option<LandmarkFrame> {
        None
    }
}

/// Replays recorded frames in order, wrapping around at the end
#[derive(Debug)]
pub struct ReplayDetector {
    frames: Vec<LandmarkFrame>,
    cursor: AtomicUsize,
}

impl ReplayDetector {
    pub fn new(frames: Vec<LandmarkFrame>) -> Self {
        Self {
            frames,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Load a JSON array of frames
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let raw = std::fs::read(path.as_ref())?;
        let frames: Vec<LandmarkFrame> = serde_json::from_slice(&raw)?;
        tracing::info!(
            path = %path.as_ref().display(),
            frames = frames.len(),
            "Loaded landmark recording"
        );
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl LandmarkDetector for ReplayDetector {
    fn detect(&self, _image: &DynamicImage) -> Option<LandmarkFrame> {
        if self.frames.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        self.frames.get(index).cloned()
    }
}

/// Decode an encoded image (PNG or JPEG)
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, EngineError> {
    Ok(image::load_from_memory(bytes)?)
}

pub fn image_size(image: &DynamicImage) -> ImageSize {
    let (width, height) = image.dimensions();
    ImageSize::new(width, height)
}
