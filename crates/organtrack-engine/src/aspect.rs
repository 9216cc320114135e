//! Aspect-ratio buckets (`"W_by_H"`) used to pick an offset table.

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Buckets shipped with the built-in profile table
pub const BUILTIN_BUCKETS: &[&str] = &["16_by_9", "9_by_16", "4_by_3", "3_by_4"];

/// Default classification tolerance
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// Image dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `height / width`, or `None` for a degenerate image
    pub fn ratio(&self) -> Option<f64> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(f64::from(self.height) / f64::from(self.width))
    }
}

/// A canonical bucket parsed from its `"W_by_H"` name
#[derive(Debug, Clone, PartialEq)]
pub struct AspectRatio {
    name: String,
    w: u32,
    h: u32,
}

impl AspectRatio {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `W / H`, the form compared against an image's `height / width`
    pub fn reciprocal(&self) -> f64 {
        f64::from(self.w) / f64::from(self.h)
    }

    pub fn matches(&self, ratio: f64, tolerance: f64) -> bool {
        (self.reciprocal() - ratio).abs() < tolerance
    }
}

impl FromStr for AspectRatio {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidAspectRatio(s.to_string());

        let (w, h) = s.split_once("_by_").ok_or_else(invalid)?;
        let w: u32 = w.trim().parse().map_err(|_| invalid())?;
        let h: u32 = h.trim().parse().map_err(|_| invalid())?;
        if w == 0 || h == 0 {
            return Err(invalid());
        }

        Ok(Self {
            name: s.to_string(),
            w,
            h,
        })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Parse every configured bucket name
pub fn parse_buckets<S: AsRef<str>>(names: &[S]) -> Result<Vec<AspectRatio>, EngineError> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}

/// First bucket whose reciprocal lies within `tolerance` of the image's ratio
pub fn classify<'a>(
    buckets: &'a [AspectRatio],
    size: ImageSize,
    tolerance: f64,
) -> Option<&'a AspectRatio> {
    let ratio = size.ratio()?;
    buckets.iter().find(|b| b.matches(ratio, tolerance))
}
