//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommand and response definitions for the gimbal executable
pub mod tc;

/// Message definitions for equipment (vision system, gimbal axes)
pub mod eqpt;

/// Network module
pub mod net;
