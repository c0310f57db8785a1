//! # Gimbal Equipment Definitions

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The two rotational axes of the camera gimbal.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum GimbalAxis {
    /// Horizontal rotation axis.
    Pan,

    /// Vertical rotation axis.
    Tilt,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Angle demands to be actuated by the servo controller.
///
/// Only axes which need to move are present in the map, so that redundant
/// hardware writes can be skipped.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GimbalDems {
    /// The demanded absolute position of an axis in degrees.
    pub pos_deg: HashMap<GimbalAxis, f64>,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl GimbalAxis {
    /// All gimbal axes, in servo channel order.
    pub fn all() -> [GimbalAxis; 2] {
        [GimbalAxis::Pan, GimbalAxis::Tilt]
    }
}

impl std::fmt::Display for GimbalAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GimbalAxis::Pan => write!(f, "pan"),
            GimbalAxis::Tilt => write!(f, "tilt"),
        }
    }
}

impl FromStr for GimbalAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pan" => Ok(GimbalAxis::Pan),
            "tilt" => Ok(GimbalAxis::Tilt),
            _ => Err(format!("{} is not a gimbal axis, expected pan or tilt", s)),
        }
    }
}
