//! # Gimbal control telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use structopt::StructOpt;

use crate::eqpt::gimbal::GimbalAxis;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command that can be executed by the gimbal exec.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, StructOpt)]
pub enum GimbalCmd {
    /// Perform a single closed-loop tracking update from an object centre
    /// position in pixel coordinates.
    ///
    /// The frame dimensions are those of the configured camera resolution. The
    /// resulting pan/tilt angles are returned in the response.
    #[structopt(name = "track")]
    Track {
        /// X coordinate of the object centre in pixels
        x_px: f64,

        /// Y coordinate of the object centre in pixels
        y_px: f64,
    },

    /// Manually set the angle of one gimbal axis.
    ///
    /// The demand goes through the same clamped write path as tracking
    /// updates, so out-of-range angles are limited to the axis bounds rather
    /// than rejected.
    #[structopt(name = "set")]
    SetAngle {
        /// The axis to set, "pan" or "tilt"
        axis: GimbalAxis,

        /// The demanded angle in degrees
        angle_deg: f64,
    },

    /// Start the tracking session, after which detections from the vision
    /// exec will drive the gimbal.
    #[structopt(name = "start")]
    StartTracking,

    /// Stop the tracking session and return the gimbal to its home position.
    #[structopt(name = "stop")]
    StopTracking,

    /// Query the current gimbal angles and tracking session state.
    #[structopt(name = "status")]
    Status,
}

/// The tracking session state as reported to the API layer.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub enum TrackingState {
    /// The session is stopped, detections are ignored.
    Stopped,

    /// The session is actively following detections.
    Active,

    /// Too many consecutive frames without a detection, the session is idle
    /// until an object is seen again.
    Idle,
}

/// Response sent by the gimbal exec for each received [`GimbalCmd`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GimbalResponse {
    /// Command accepted and actuated, reporting the resulting angles.
    Angles { pan_deg: f64, tilt_deg: f64 },

    /// Status query response.
    Status(GimbalStatus),

    /// The gimbal state was updated but the servo write failed, so the
    /// physical gimbal may lag the reported angles.
    Degraded {
        pan_deg: f64,
        tilt_deg: f64,
        error: String,
    },

    /// The command could not be executed.
    Rejected { reason: String },
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Snapshot of the gimbal exec state.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct GimbalStatus {
    /// Current pan angle in degrees
    pub pan_deg: f64,

    /// Current tilt angle in degrees
    pub tilt_deg: f64,

    /// Current tracking session state
    pub tracking_state: TrackingState,
}
