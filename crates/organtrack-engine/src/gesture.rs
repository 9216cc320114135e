//! Whole-body gesture recognition.
//!
//! Checks run on normalized image coordinates, so the same pose reads the
//! same in portrait and landscape. A check that cannot see every landmark it
//! needs reports `None` rather than `false`.

use organtrack_protocol::Gesture;

use crate::keypoint::{BodyLandmark, LandmarkFrame};

/// Combined elbow-to-wrist slope magnitude that counts as crossed
const CROSSED_ARMS_SLOPE: f64 = 20.0;

fn point(frame: &LandmarkFrame, landmark: BodyLandmark) -> Option<(f64, f64)> {
    frame.valid(landmark).map(|keypoint| (keypoint.x, keypoint.y))
}

/// `None` for a vertical segment
fn slope(from: (f64, f64), to: (f64, f64)) -> Option<f64> {
    let dx = to.0 - from.0;
    if dx == 0.0 {
        return None;
    }
    Some((to.1 - from.1) / dx)
}

/// Both thumbs above the nose
pub fn hands_up(frame: &LandmarkFrame) -> Option<bool> {
    let left = point(frame, BodyLandmark::LeftThumb)?;
    let right = point(frame, BodyLandmark::RightThumb)?;
    let nose = point(frame, BodyLandmark::Nose)?;
    Some(left.1 < nose.1 && right.1 < nose.1)
}

/// Forearms crossed in front of the chest
pub fn crossed_arms(frame: &LandmarkFrame) -> Option<bool> {
    let left_elbow = point(frame, BodyLandmark::LeftElbow)?;
    let right_elbow = point(frame, BodyLandmark::RightElbow)?;
    let left_wrist = point(frame, BodyLandmark::LeftWrist)?;
    let right_wrist = point(frame, BodyLandmark::RightWrist)?;
    let nose = point(frame, BodyLandmark::Nose)?;

    let wrists_cross = left_wrist.0 < nose.0 && right_wrist.0 > nose.0;

    let (Some(left), Some(right)) = (
        slope(left_elbow, right_wrist),
        slope(right_elbow, left_wrist),
    ) else {
        return Some(false);
    };

    Some(wrists_cross && (left.abs() + right.abs()).floor() >= CROSSED_ARMS_SLOPE)
}

/// First recognized gesture; crossed arms wins over hands up
pub fn detect(frame: &LandmarkFrame) -> Option<Gesture> {
    if crossed_arms(frame) == Some(true) {
        return Some(Gesture::CrossedArms);
    }
    if hands_up(frame) == Some(true) {
        return Some(Gesture::HandsUp);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint::Keypoint;

    fn frame(points: &[(BodyLandmark, f64, f64)]) -> LandmarkFrame {
        let mut body = vec![Keypoint::new(0.5, 0.9, 0.0); BodyLandmark::COUNT];
        for &(landmark, x, y) in points {
            body[landmark.index()] = Keypoint::new(x, y, 0.0);
        }
        LandmarkFrame::new(body)
    }

    #[test]
    fn test_hands_up() {
        use BodyLandmark::*;

        let up = frame(&[(Nose, 0.5, 0.3), (LeftThumb, 0.3, 0.1), (RightThumb, 0.7, 0.1)]);
        assert_eq!(hands_up(&up), Some(true));
        assert_eq!(detect(&up), Some(Gesture::HandsUp));

        let one_hand = frame(&[(Nose, 0.5, 0.3), (LeftThumb, 0.3, 0.1), (RightThumb, 0.7, 0.6)]);
        assert_eq!(hands_up(&one_hand), Some(false));
        assert_eq!(detect(&one_hand), None);
    }

    #[test]
    fn test_crossed_arms() {
        use BodyLandmark::*;

        // Steep forearms whose wrists end on the opposite side of the nose
        let crossed = frame(&[
            (Nose, 0.5, 0.2),
            (LeftElbow, 0.51, 0.4),
            (RightElbow, 0.49, 0.4),
            (LeftWrist, 0.48, 0.6),
            (RightWrist, 0.52, 0.6),
        ]);
        assert_eq!(crossed_arms(&crossed), Some(true));
        assert_eq!(detect(&crossed), Some(Gesture::CrossedArms));

        let relaxed = frame(&[
            (Nose, 0.5, 0.2),
            (LeftElbow, 0.3, 0.4),
            (RightElbow, 0.7, 0.4),
            (LeftWrist, 0.2, 0.6),
            (RightWrist, 0.8, 0.6),
        ]);
        assert_eq!(crossed_arms(&relaxed), Some(false));
    }

    #[test]
    fn test_vertical_forearm_is_not_crossed() {
        use BodyLandmark::*;

        let vertical = frame(&[
            (Nose, 0.5, 0.2),
            (LeftElbow, 0.52, 0.4),
            (RightElbow, 0.48, 0.4),
            (LeftWrist, 0.48, 0.6),
            (RightWrist, 0.52, 0.6),
        ]);
        assert_eq!(crossed_arms(&vertical), Some(false));
    }

    #[test]
    fn test_shallow_forearms_are_not_crossed() {
        use BodyLandmark::*;

        // Slopes of about 8 each stay under the threshold
        let shallow = frame(&[
            (Nose, 0.5, 0.2),
            (LeftElbow, 0.53, 0.4),
            (RightElbow, 0.47, 0.4),
            (LeftWrist, 0.48, 0.48),
            (RightWrist, 0.52, 0.48),
        ]);
        assert_eq!(crossed_arms(&shallow), Some(false));
        assert_eq!(detect(&shallow), None);
    }

    #[test]
    fn test_near_vertical_forearms_are_crossed() {
        use BodyLandmark::*;

        // Less than a pixel apart on a 1080 wide image
        let steep = frame(&[
            (Nose, 0.5, 0.2),
            (LeftElbow, 0.5002, 0.4),
            (RightElbow, 0.4998, 0.4),
            (LeftWrist, 0.4997, 0.6),
            (RightWrist, 0.5003, 0.6),
        ]);
        assert_eq!(crossed_arms(&steep), Some(true));
    }

    #[test]
    fn test_missing_landmark_is_unknown() {
        use BodyLandmark::*;

        let off_screen = frame(&[(Nose, 0.5, 0.3), (LeftThumb, -0.1, 0.1), (RightThumb, 0.7, 0.1)]);
        assert_eq!(hands_up(&off_screen), None);
        assert_eq!(crossed_arms(&LandmarkFrame::default()), None);
        assert_eq!(detect(&LandmarkFrame::default()), None);
    }
}
