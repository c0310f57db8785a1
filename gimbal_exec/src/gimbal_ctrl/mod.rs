//! # Gimbal control module
//!
//! GimbalCtrl owns the pan/tilt state of the camera gimbal and converts
//! normalised pixel errors (or manual angle demands) into bounded servo
//! demands. It applies a single proportional correction per cycle, limited to
//! a maximum step, and clamps the result to the per-axis angle bounds. The
//! stored state is never outside those bounds.
//!
//! The module does not touch hardware: it emits [`GimbalDems`] which the exec
//! actuates through the servo controller after the state mutation is complete,
//! so a slow I2C bus never extends the state critical section.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;

use comms_if::eqpt::gimbal::GimbalAxis;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of gimbal axes.
pub const NUM_AXES: usize = 2;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during GimbalCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum GimbalCtrlError {
    #[error("Failed to load GimbalCtrl parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("Invalid bounds for {axis} axis: min ({min_deg} deg) must be below max ({max_deg} deg)")]
    InvalidBounds {
        axis: GimbalAxis,
        min_deg: f64,
        max_deg: f64,
    },

    #[error("Home angle for {axis} axis ({home_deg} deg) is outside [{min_deg}, {max_deg}] deg")]
    InvalidHome {
        axis: GimbalAxis,
        home_deg: f64,
        min_deg: f64,
        max_deg: f64,
    },

    #[error("Parameter {name} must be finite and positive, got {value}")]
    InvalidPositiveParam { name: &'static str, value: f64 },

    #[error("Dead zone must be in [0, 1), got {0}")]
    InvalidDeadZone(f64),
}
