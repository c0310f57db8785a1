//! Tracking session parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What to do with the gimbal when the session goes idle.
///
/// The original system never pinned this down, so it is a configuration
/// choice rather than a hard-coded behaviour.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum IdlePolicy {
    /// Re-centre the gimbal to the home angles on going idle.
    ReturnHome,

    /// Leave the gimbal where it last pointed.
    HoldPosition,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the tracking session
#[derive(Deserialize, Debug, Clone)]
pub struct Params {

    /// Number of consecutive frames without a detection after which the
    /// session goes idle.
    pub max_missed_detections: u32,

    /// What to do with the gimbal when the session goes idle.
    pub idle_policy: IdlePolicy,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            max_missed_detections: 5,
            idle_policy: IdlePolicy::ReturnHome,
        }
    }
}
