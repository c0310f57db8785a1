//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface. Telecommands are the instructions sent to the gimbal exec by the
//! web API layer (or by `gimbal_cli` during testing), serialised as JSON over
//! the exec's REP socket.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod gimbal;

// ---------------------------------------------------------------------------
// REEXPORTS
// ---------------------------------------------------------------------------

pub use gimbal::{GimbalCmd, GimbalResponse, GimbalStatus, TrackingState};
