//! # Vision Equipment Communications Module
//!
//! Defines the detection messages published by the vision exec. One message is
//! published per processed video frame, whether or not an object was found in
//! it, so that the gimbal exec can count missed detections.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The pixel dimensions of a video frame.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct FrameSize {
    /// Width of the frame in pixels
    pub width_px: u32,

    /// Height of the frame in pixels
    pub height_px: u32,
}

/// A single detection event from the vision exec.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Detection {
    /// UTC timestamp at which the source frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Dimensions of the source frame
    pub frame: FrameSize,

    /// Centre of the detected object in pixel coordinates, or `None` if no
    /// object was detected in this frame.
    pub pos_px: Option<[f64; 2]>,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl FrameSize {
    /// Return the centre point of the frame in pixel coordinates.
    pub fn centre(&self) -> [f64; 2] {
        [self.width_px as f64 / 2.0, self.height_px as f64 / 2.0]
    }
}
