use serde::{Deserialize, Serialize};

/// Role a peer claims for its session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Authoritative video/landmark source
    Host,
    /// Passive observer receiving forwarded transforms
    #[default]
    Guest,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => f.write_str("Host"),
            Role::Guest => f.write_str("Guest"),
        }
    }
}

/// Free 3-axis vector used for Guest transform broadcasts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Organ placement in the rendering client's coordinate space.
///
/// `x`/`y` are rounded to 4 decimal places, `z` is a coarse integral depth bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TargetPoint {
    pub x: f64,
    pub y: f64,
    pub z: i64,
}

/// Organ placement in raw image pixels (diagnostic channel)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// One keypoint of a whole-body result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BodyPoint {
    pub index: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: i64,
}

/// Recognized Host gestures
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    HandsUp,
    CrossedArms,
}
