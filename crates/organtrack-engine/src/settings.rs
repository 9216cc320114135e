use serde::{Deserialize, Serialize};

use crate::aspect::{BUILTIN_BUCKETS, DEFAULT_TOLERANCE};
use crate::error::EngineError;

/// Which coordinate space the engine reports by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSpace {
    /// Centred, viewport-independent space consumed by the rendering client
    #[default]
    Target,
    /// Raw image pixels
    Pixel,
}

/// Tunables of the position pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSettings {
    /// Maximum |W/H - h/w| accepted when classifying an image
    #[serde(default = "default_aspect_tolerance")]
    pub aspect_tolerance: f64,
    /// Pixel span that corresponds to `known_height_meters`
    #[serde(default = "default_known_height_pixels")]
    pub known_height_pixels: f64,
    #[serde(default = "default_known_height_meters")]
    pub known_height_meters: f64,
    /// Added to `width * z` before depth bucketing
    #[serde(default = "default_depth_bias")]
    pub depth_bias: f64,
    /// Width of one depth bucket
    #[serde(default = "default_depth_divisor")]
    pub depth_divisor: f64,
    #[serde(default)]
    pub output_space: PositionSpace,
    /// Canonical `"W_by_H"` buckets, in match priority order
    #[serde(default = "default_aspect_ratios")]
    pub aspect_ratios: Vec<String>,
    /// Organ names peers may select
    #[serde(default = "default_supported_organs")]
    pub supported_organs: Vec<String>,
    /// Organ tracked until the Host selects one
    #[serde(default = "default_organ")]
    pub default_organ: String,
    /// Text sent to the Host when the subject is out of range
    #[serde(default = "default_out_of_range_advisory")]
    pub out_of_range_advisory: String,
    /// Report recognized gestures to the Host
    #[serde(default)]
    pub gestures: bool,
}

fn default_aspect_tolerance() -> f64 { DEFAULT_TOLERANCE }
fn default_known_height_pixels() -> f64 { 100.0 }
fn default_known_height_meters() -> f64 { 1.75 }
fn default_depth_bias() -> f64 { 3.0 }
fn default_depth_divisor() -> f64 { 300.0 }
fn default_aspect_ratios() -> Vec<String> {
    BUILTIN_BUCKETS.iter().map(|b| b.to_string()).collect()
}
fn default_supported_organs() -> Vec<String> {
    ["heart", "brain", "liver", "stomach", "intestine", "lungs", "kidney", "body"]
        .iter()
        .map(|o| o.to_string())
        .collect()
}
fn default_organ() -> String { "heart".to_string() }
fn default_out_of_range_advisory() -> String {
    "The person is not at the proper distance. Please move closer or farther to adjust to the correct distance.".to_string()
}

impl Default for PositionSettings {
    fn default() -> Self {
        Self {
            aspect_tolerance: default_aspect_tolerance(),
            known_height_pixels: default_known_height_pixels(),
            known_height_meters: default_known_height_meters(),
            depth_bias: default_depth_bias(),
            depth_divisor: default_depth_divisor(),
            output_space: PositionSpace::default(),
            aspect_ratios: default_aspect_ratios(),
            supported_organs: default_supported_organs(),
            default_organ: default_organ(),
            out_of_range_advisory: default_out_of_range_advisory(),
            gestures: false,
        }
    }
}

impl PositionSettings {
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: &str| Err(EngineError::InvalidSettings(reason.to_string()));

        if self.aspect_ratios.is_empty() {
            return invalid("aspect_ratios must not be empty");
        }
        if !(self.aspect_tolerance.is_finite() && self.aspect_tolerance > 0.0) {
            return invalid("aspect_tolerance must be positive");
        }
        if !(self.known_height_pixels.is_finite() && self.known_height_pixels > 0.0) {
            return invalid("known_height_pixels must be positive");
        }
        if !self.known_height_meters.is_finite() {
            return invalid("known_height_meters must be finite");
        }
        if !(self.depth_divisor.is_finite() && self.depth_divisor != 0.0) {
            return invalid("depth_divisor must be non-zero");
        }
        if !self.supported_organs.iter().any(|o| *o == self.default_organ) {
            return invalid("default_organ must be one of supported_organs");
        }
        Ok(())
    }
}
