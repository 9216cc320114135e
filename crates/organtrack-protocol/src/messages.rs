use serde::{Deserialize, Serialize};

use crate::types::{BodyPoint, Gesture, PixelPoint, Role, TargetPoint, Vec3};

/// Heartbeat token carried in `ControlMessage::message`
pub const HEARTBEAT: &str = "PING";

/// Control message sent from a peer at the start of each tick
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ControlMessage {
    /// Session identity chosen by the peer
    #[serde(default)]
    pub uuid: String,

    /// Claimed role; absent keeps the role already registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// Heartbeat token or organ selector
    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
}

impl ControlMessage {
    pub fn heartbeat(uuid: impl Into<String>, role: Role) -> Self {
        Self {
            uuid: uuid.into(),
            role: Some(role),
            message: HEARTBEAT.to_string(),
            ..Self::default()
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.message == HEARTBEAT
    }

    /// Organ name requested by the peer, if the message is not a heartbeat
    pub fn organ_selector(&self) -> Option<&str> {
        let selector = self.message.trim();
        if selector.is_empty() || self.is_heartbeat() {
            None
        } else {
            Some(selector)
        }
    }

    /// Whether the message carries a transform to forward to Guests
    pub fn has_transform(&self) -> bool {
        self.position.is_some() || self.rotation.is_some()
    }
}

/// Messages sent from the relay to a peer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Organ placement in target space (`x`, `y`, `z` at top level)
    Position(TargetPoint),

    /// Organ placement in pixel space
    PixelPosition(PixelPoint),

    /// Whole-body placement
    Body { landmarks: Vec<BodyPoint> },

    /// Subject is too close or too far from the camera
    Advisory { message: String, distance: f64 },

    /// More than one Host is registered; frame processing is suspended
    MultipleHosts { count: usize },

    /// Exactly one Host remains; frame processing resumes
    HostRecovered,

    /// Latest Host transform, forwarded to Guests
    Transform {
        uuid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<Vec3>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rotation: Option<Vec3>,
    },

    /// Gesture recognized on the Host's latest frame
    Gesture { gesture: Gesture },

    /// Error message
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_fields_are_top_level() {
        let msg = ServerMessage::Position(TargetPoint {
            x: 1.25,
            y: -0.5,
            z: 15,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "position", "x": 1.25, "y": -0.5, "z": 15}));
    }

    #[test]
    fn test_transform_omits_missing_rotation() {
        let msg = ServerMessage::Transform {
            uuid: "host".to_string(),
            position: Some(Vec3::new(1.0, 2.0, 3.0)),
            rotation: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "transform", "uuid": "host", "position": {"x": 1.0, "y": 2.0, "z": 3.0}})
        );
    }

    #[test]
    fn test_server_message_roundtrip() {
        let msg = ServerMessage::MultipleHosts { count: 2 };
        let text = serde_json::to_string(&msg).unwrap();
        assert_eq!(serde_json::from_str::<ServerMessage>(&text).unwrap(), msg);

        let text = serde_json::to_string(&ServerMessage::HostRecovered).unwrap();
        assert_eq!(text, r#"{"type":"host_recovered"}"#);
    }

    #[test]
    fn test_control_role_names() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"uuid":"g","role":"Guest","message":"brain"}"#).unwrap();
        assert_eq!(msg.role, Some(Role::Guest));
        assert_eq!(msg.organ_selector(), Some("brain"));
    }
}
