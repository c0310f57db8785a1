//! # Gimbal Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use std::collections::HashMap;

use comms_if::eqpt::{gimbal::GimbalAxis, vision::FrameSize};

use crate::servo_ctrl::ServoConfig;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct GimbalExecParams {

    /// Endpoint for the telecommand socket (REP, bound), on which the web API
    /// layer sends [`comms_if::tc::GimbalCmd`]s.
    pub tc_endpoint: String,

    /// Endpoint of the vision exec's detection socket (PUB), to which the
    /// detection client subscribes.
    pub detection_endpoint: String,

    /// Target duration of one control cycle in seconds.
    pub cycle_period_s: f64,

    /// Camera resolution, used as the frame dimensions for tracking updates
    /// commanded directly over the telecommand socket.
    pub camera_frame: FrameSize,

    /// Servo hardware parameters
    pub servo: ServoParams,
}

/// Parameters for the servo controller.
#[derive(Deserialize)]
pub struct ServoParams {

    /// Which servo driver to use, "pca9685" for the real board or "sim" for
    /// the simulation driver.
    pub driver: String,

    /// I2C address of the PCA9685 board. Ignored by the sim driver.
    pub pca9685_address: u8,

    /// Per-axis servo configuration
    pub config: HashMap<GimbalAxis, ServoConfig>,
}
