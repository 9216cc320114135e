//! Subject distance estimate from the nose-to-feet pixel span.

use crate::aspect::ImageSize;
use crate::keypoint::{BodyLandmark, LandmarkFrame};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceEstimator {
    /// Pixel span that maps to `known_height_meters`
    pub known_height_pixels: f64,
    pub known_height_meters: f64,
}

impl Default for DistanceEstimator {
    fn default() -> Self {
        Self {
            known_height_pixels: 100.0,
            known_height_meters: 1.75,
        }
    }
}

impl DistanceEstimator {
    pub fn new(known_height_pixels: f64, known_height_meters: f64) -> Self {
        Self {
            known_height_pixels,
            known_height_meters,
        }
    }

    /// Convert a pixel span to metres
    pub fn to_meters(&self, pixels: f64) -> f64 {
        pixels / self.known_height_pixels * self.known_height_meters
    }

    /// Estimate the distance from NOSE to the midpoint of both FOOT_INDEX keypoints.
    ///
    /// Returns the offending landmark when one of them is off screen.
    pub fn estimate(&self, frame: &LandmarkFrame, size: ImageSize) -> Result<f64, BodyLandmark> {
        let nose = frame.valid(BodyLandmark::Nose).ok_or(BodyLandmark::Nose)?;
        let left = frame
            .valid(BodyLandmark::LeftFootIndex)
            .ok_or(BodyLandmark::LeftFootIndex)?;
        let right = frame
            .valid(BodyLandmark::RightFootIndex)
            .ok_or(BodyLandmark::RightFootIndex)?;
        let feet = left.midpoint(right);

        let w = f64::from(size.width);
        let h = f64::from(size.height);
        let dx = (feet.x - nose.x) * w;
        let dy = (feet.y - nose.y) * h;

        Ok(self.to_meters(dx.hypot(dy)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint::Keypoint;

    fn frame_with(nose: Keypoint, left: Keypoint, right: Keypoint) -> LandmarkFrame {
        let mut body = vec![Keypoint::new(0.5, 0.5, 0.0); BodyLandmark::COUNT];
        body[BodyLandmark::Nose.index()] = nose;
        body[BodyLandmark::LeftFootIndex.index()] = left;
        body[BodyLandmark::RightFootIndex.index()] = right;
        LandmarkFrame::new(body)
    }

    #[test]
    fn test_vertical_span() {
        let frame = frame_with(
            Keypoint::new(0.5, 0.1, 0.0),
            Keypoint::new(0.45, 0.6, 0.0),
            Keypoint::new(0.55, 0.6, 0.0),
        );
        // 0.5 * 1000 px = 500 px -> 5 * 1.75 m
        let meters = DistanceEstimator::default()
            .estimate(&frame, ImageSize::new(800, 1000))
            .unwrap();
        assert!((meters - 8.75).abs() < 1e-9);
    }

    #[test]
    fn test_diagonal_span_uses_both_axes() {
        let frame = frame_with(
            Keypoint::new(0.0, 0.0, 0.0),
            Keypoint::new(0.3, 0.4, 0.0),
            Keypoint::new(0.3, 0.4, 0.0),
        );
        // (300, 400) px at 1000x1000 -> 500 px
        let meters = DistanceEstimator::new(100.0, 1.0)
            .estimate(&frame, ImageSize::new(1000, 1000))
            .unwrap();
        assert!((meters - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_off_screen_foot() {
        let frame = frame_with(
            Keypoint::new(0.5, 0.1, 0.0),
            Keypoint::new(0.45, 1.2, 0.0),
            Keypoint::new(0.55, 0.9, 0.0),
        );
        let err = DistanceEstimator::default()
            .estimate(&frame, ImageSize::new(800, 1000))
            .unwrap_err();
        assert_eq!(err, BodyLandmark::LeftFootIndex);
    }
}
