//! Gimbal control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for gimbal control
#[derive(Deserialize, Debug, Clone)]
pub struct Params {

    /// Minimum pan angle
    pub pan_min_deg: f64,

    /// Maximum pan angle
    pub pan_max_deg: f64,

    /// Pan home (rest) angle
    pub pan_home_deg: f64,

    /// Minimum tilt angle
    pub tilt_min_deg: f64,

    /// Maximum tilt angle
    pub tilt_max_deg: f64,

    /// Tilt home (rest) angle
    pub tilt_home_deg: f64,

    /// Proportional gain converting normalised x error into a fraction of the
    /// pan angle span.
    pub gain_pan: f64,

    /// Proportional gain converting normalised y error into a fraction of the
    /// tilt angle span.
    pub gain_tilt: f64,

    /// Normalised error magnitude below which no correction is applied, to
    /// avoid jitter from detection noise.
    pub dead_zone: f64,

    /// Limit on the angle change of a single tracking update, per axis.
    pub max_step_deg: f64,

    /// Angle change below which no servo demand is emitted, avoiding
    /// redundant hardware writes.
    pub demand_epsilon_deg: f64,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            pan_min_deg: 0.0,
            pan_max_deg: 180.0,
            pan_home_deg: 90.0,
            tilt_min_deg: -5.0,
            tilt_max_deg: 30.0,
            tilt_home_deg: -5.0,
            gain_pan: 0.05,
            gain_tilt: 0.05,
            dead_zone: 0.05,
            max_step_deg: 5.0,
            demand_epsilon_deg: 0.01,
        }
    }
}
