//! Body and hand keypoint schema produced by the landmark detector.

use serde::{Deserialize, Serialize};

/// Declares a fixed keypoint schema: the enum, its index order and its names.
macro_rules! landmark_schema {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $index:literal => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(usize)]
        pub enum $name {
            $($variant = $index),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const COUNT: usize = Self::ALL.len();

            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($label => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn index(self) -> usize {
                self as usize
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = String::deserialize(deserializer)?;
                Self::from_name(&name).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} `{}`",
                        stringify!($name),
                        name
                    ))
                })
            }
        }
    };
}

landmark_schema! {
    /// The 33 body keypoints, in detector order
    BodyLandmark {
        Nose = 0 => "NOSE",
        LeftEyeInner = 1 => "LEFT_EYE_INNER",
        LeftEye = 2 => "LEFT_EYE",
        LeftEyeOuter = 3 => "LEFT_EYE_OUTER",
        RightEyeInner = 4 => "RIGHT_EYE_INNER",
        RightEye = 5 => "RIGHT_EYE",
        RightEyeOuter = 6 => "RIGHT_EYE_OUTER",
        LeftEar = 7 => "LEFT_EAR",
        RightEar = 8 => "RIGHT_EAR",
        MouthLeft = 9 => "MOUTH_LEFT",
        MouthRight = 10 => "MOUTH_RIGHT",
        LeftShoulder = 11 => "LEFT_SHOULDER",
        RightShoulder = 12 => "RIGHT_SHOULDER",
        LeftElbow = 13 => "LEFT_ELBOW",
        RightElbow = 14 => "RIGHT_ELBOW",
        LeftWrist = 15 => "LEFT_WRIST",
        RightWrist = 16 => "RIGHT_WRIST",
        LeftPinky = 17 => "LEFT_PINKY",
        RightPinky = 18 => "RIGHT_PINKY",
        LeftIndex = 19 => "LEFT_INDEX",
        RightIndex = 20 => "RIGHT_INDEX",
        LeftThumb = 21 => "LEFT_THUMB",
        RightThumb = 22 => "RIGHT_THUMB",
        LeftHip = 23 => "LEFT_HIP",
        RightHip = 24 => "RIGHT_HIP",
        LeftKnee = 25 => "LEFT_KNEE",
        RightKnee = 26 => "RIGHT_KNEE",
        LeftAnkle = 27 => "LEFT_ANKLE",
        RightAnkle = 28 => "RIGHT_ANKLE",
        LeftHeel = 29 => "LEFT_HEEL",
        RightHeel = 30 => "RIGHT_HEEL",
        LeftFootIndex = 31 => "LEFT_FOOT_INDEX",
        RightFootIndex = 32 => "RIGHT_FOOT_INDEX",
    }
}

landmark_schema! {
    /// The 21 hand keypoints, in detector order
    HandLandmark {
        Wrist = 0 => "WRIST",
        ThumbCmc = 1 => "THUMB_CMC",
        ThumbMcp = 2 => "THUMB_MCP",
        ThumbIp = 3 => "THUMB_IP",
        ThumbTip = 4 => "THUMB_TIP",
        IndexFingerMcp = 5 => "INDEX_FINGER_MCP",
        IndexFingerPip = 6 => "INDEX_FINGER_PIP",
        IndexFingerDip = 7 => "INDEX_FINGER_DIP",
        IndexFingerTip = 8 => "INDEX_FINGER_TIP",
        MiddleFingerMcp = 9 => "MIDDLE_FINGER_MCP",
        MiddleFingerPip = 10 => "MIDDLE_FINGER_PIP",
        MiddleFingerDip = 11 => "MIDDLE_FINGER_DIP",
        MiddleFingerTip = 12 => "MIDDLE_FINGER_TIP",
        RingFingerMcp = 13 => "RING_FINGER_MCP",
        RingFingerPip = 14 => "RING_FINGER_PIP",
        RingFingerDip = 15 => "RING_FINGER_DIP",
        RingFingerTip = 16 => "RING_FINGER_TIP",
        PinkyMcp = 17 => "PINKY_MCP",
        PinkyPip = 18 => "PINKY_PIP",
        PinkyDip = 19 => "PINKY_DIP",
        PinkyTip = 20 => "PINKY_TIP",
    }
}

/// Single keypoint
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    /// Normalized X (0.0 to 1.0 when on screen)
    pub x: f64,
    /// Normalized Y (0.0 to 1.0 when on screen)
    pub y: f64,
    /// Depth, image-width scale; never range-checked
    pub z: f64,
}

impl Keypoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Both image coordinates lie within [0, 1]
    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    /// Arithmetic mean of two keypoints on every axis
    pub fn midpoint(&self, other: &Keypoint) -> Keypoint {
        Keypoint {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
        }
    }
}

/// Which hand a `HandFrame` belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Map the detector's raw label, which is mirrored, to the subject's hand
    pub fn from_detector_label(label: &str) -> Option<Self> {
        match label.trim() {
            l if l.eq_ignore_ascii_case("left") => Some(Handedness::Right),
            l if l.eq_ignore_ascii_case("right") => Some(Handedness::Left),
            _ => None,
        }
    }
}

/// 21 hand keypoints tagged with handedness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandFrame {
    handedness: Handedness,
    keypoints: Vec<Keypoint>,
}

impl HandFrame {
    pub fn new(handedness: Handedness, keypoints: Vec<Keypoint>) -> Self {
        Self {
            handedness,
            keypoints,
        }
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Keypoint by name, only when it lies on screen
    pub fn landmark(&self, landmark: HandLandmark) -> Option<&Keypoint> {
        self.keypoints
            .get(landmark.index())
            .filter(|kp| kp.is_valid())
    }

    pub fn is_complete(&self) -> bool {
        self.keypoints.len() == HandLandmark::COUNT
    }
}

/// Keypoints detected in one image.
///
/// Built once per processed image and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkFrame {
    body: Vec<Keypoint>,
    #[serde(default)]
    hands: Vec<HandFrame>,
}

impl LandmarkFrame {
    pub fn new(body: Vec<Keypoint>) -> Self {
        Self {
            body,
            hands: Vec::new(),
        }
    }

    pub fn with_hands(body: Vec<Keypoint>, hands: Vec<HandFrame>) -> Self {
        Self { body, hands }
    }

    pub fn body(&self) -> &[Keypoint] {
        &self.body
    }

    pub fn hands(&self) -> &[HandFrame] {
        &self.hands
    }

    /// Keypoint by name, whether or not it is on screen
    pub fn get(&self, landmark: BodyLandmark) -> Option<&Keypoint> {
        self.body.get(landmark.index())
    }

    /// Keypoint by name, only when it lies on screen
    pub fn valid(&self, landmark: BodyLandmark) -> Option<&Keypoint> {
        self.get(landmark).filter(|kp| kp.is_valid())
    }

    /// Holds exactly the 33 body keypoints of the schema
    pub fn is_complete(&self) -> bool {
        self.body.len() == BodyLandmark::COUNT
    }

    pub fn hand(&self, handedness: Handedness) -> Option<&HandFrame> {
        self.hands.iter().find(|h| h.handedness() == handedness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_counts() {
        assert_eq!(BodyLandmark::COUNT, 33);
        assert_eq!(HandLandmark::COUNT, 21);
    }

    #[test]
    fn test_body_landmark_lookup() {
        assert_eq!(BodyLandmark::from_index(0), Some(BodyLandmark::Nose));
        assert_eq!(
            BodyLandmark::from_index(32),
            Some(BodyLandmark::RightFootIndex)
        );
        assert_eq!(BodyLandmark::from_index(33), None);
        assert_eq!(
            BodyLandmark::from_name("LEFT_SHOULDER"),
            Some(BodyLandmark::LeftShoulder)
        );
        assert_eq!(BodyLandmark::LeftHip.index(), 23);
        assert_eq!(BodyLandmark::RightEar.name(), "RIGHT_EAR");
    }

    #[test]
    fn test_landmark_serde_uses_names() {
        let json = serde_json::to_string(&BodyLandmark::LeftFootIndex).unwrap();
        assert_eq!(json, r#""LEFT_FOOT_INDEX""#);
        let parsed: HandLandmark = serde_json::from_str(r#""MIDDLE_FINGER_MCP""#).unwrap();
        assert_eq!(parsed, HandLandmark::MiddleFingerMcp);
        assert!(serde_json::from_str::<BodyLandmark>(r#""SPLEEN""#).is_err());
    }

    #[test]
    fn test_keypoint_validity() {
        assert!(Keypoint::new(0.0, 1.0, -5.0).is_valid());
        assert!(!Keypoint::new(1.01, 0.5, 0.0).is_valid());
        assert!(!Keypoint::new(0.5, -0.01, 0.0).is_valid());
        assert!(!Keypoint::new(f64::NAN, 0.5, 0.0).is_valid());
    }

    #[test]
    fn test_keypoint_midpoint() {
        let a = Keypoint::new(0.2, 0.4, -0.1);
        let b = Keypoint::new(0.4, 0.8, 0.3);
        let mid = a.midpoint(&b);
        assert!((mid.x - 0.3).abs() < 1e-12);
        assert!((mid.y - 0.6).abs() < 1e-12);
        assert!((mid.z - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_handedness_is_mirrored() {
        assert_eq!(
            Handedness::from_detector_label("Left"),
            Some(Handedness::Right)
        );
        assert_eq!(
            Handedness::from_detector_label("right"),
            Some(Handedness::Left)
        );
        assert_eq!(Handedness::from_detector_label("both"), None);
    }

    #[test]
    fn test_hand_frame_landmark() {
        let mut keypoints = vec![Keypoint::new(0.5, 0.5, 0.0); HandLandmark::COUNT];
        keypoints[HandLandmark::MiddleFingerMcp.index()] = Keypoint::new(1.5, 0.5, 0.0);
        let hand = HandFrame::new(Handedness::Left, keypoints);

        assert!(hand.is_complete());
        assert!(hand.landmark(HandLandmark::Wrist).is_some());
        assert!(hand.landmark(HandLandmark::MiddleFingerMcp).is_none());

        let frame = LandmarkFrame::with_hands(Vec::new(), vec![hand]);
        assert!(frame.hand(Handedness::Left).is_some());
        assert!(frame.hand(Handedness::Right).is_none());
        assert!(!frame.is_complete());
    }
}
