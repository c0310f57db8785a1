//! # Servo Controller Module
//!
//! This module provides a unified servo control interface which abstracts over
//! different servo driver backends: the PCA9685 board on the rover, and a
//! simulation driver for development machines.
//!
//! The controller maps gimbal-frame angles to the physical servo horn angles.
//! The two frames are not the same: the tilt axis covers [-5, 30] degrees in
//! the gimbal frame but a narrower sub-range of the servo's travel, set by the
//! mechanical linkage.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`ServoDriver`] implementation for the Adafruit PCA9685 16 channel servo driver board.
pub mod pca9685;

/// [`ServoDriver`] implementation which only logs demands, for running without hardware.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use comms_if::eqpt::gimbal::{GimbalAxis, GimbalDems};
use util::maths::lin_map;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of channels on a servo driver board.
pub const NUM_CHANNELS: u8 = 16;

/// The servo horn angle range supported by the drivers.
pub const SERVO_RANGE_DEG: (f64, f64) = (0.0, 180.0);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for accessing servo driver boards.
pub trait ServoDriver {
    /// Set the horn angle of a servo channel.
    ///
    /// ## Arguments
    /// - `channel` - The channel to set, 0 to 15
    /// - `angle_deg` - The servo horn angle. Must be within
    ///   [`SERVO_RANGE_DEG`]. Values outside this range will be rejected.
    fn set_angle(&mut self, channel: u8, angle_deg: f64) -> Result<(), ServoError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Configuration of a single gimbal axis servo.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServoConfig {
    /// Driver channel the servo is wired to
    pub channel: u8,

    /// The gimbal-frame angle range of the axis, (min, max) degrees
    pub gimbal_range_deg: (f64, f64),

    /// The servo horn angle range the gimbal range maps onto, (min, max)
    /// degrees. For the reference hardware tilt [-5, 30] maps onto [85, 120].
    pub servo_range_deg: (f64, f64),
}

/// Servo controller abstracting the gimbal axes over a [`ServoDriver`].
pub struct ServoCtrl {
    driver: Box<dyn ServoDriver>,

    servo_config_map: HashMap<GimbalAxis, ServoConfig>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ServoError {
    #[error("An I2C error occured")]
    I2c,

    #[error("Servo angle {0} deg is outside the supported range")]
    InvalidAngle(f64),

    #[error("Channel {0} is not a valid servo channel")]
    InvalidChannel(u8),

    #[error("No servo is configured for the {0} axis")]
    UnconfiguredAxis(GimbalAxis),

    #[error("Invalid servo config for the {0} axis: {1}")]
    InvalidConfig(GimbalAxis, String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ServoCtrl {
    /// Create a new servo controller.
    ///
    /// ## Arguments
    /// - `driver` - An initialised [`ServoDriver`] backend
    /// - `servo_config_map` - Configuration for the servo of each gimbal axis
    pub fn new(
        driver: Box<dyn ServoDriver>,
        servo_config_map: HashMap<GimbalAxis, ServoConfig>,
    ) -> Result<Self, ServoError> {
        // Check the config is valid before accepting it
        for &axis in &GimbalAxis::all() {
            let config = servo_config_map
                .get(&axis)
                .ok_or(ServoError::UnconfiguredAxis(axis))?;

            if config.channel >= NUM_CHANNELS {
                return Err(ServoError::InvalidChannel(config.channel));
            }

            if config.gimbal_range_deg.0 >= config.gimbal_range_deg.1 {
                return Err(ServoError::InvalidConfig(
                    axis,
                    format!("gimbal range {:?} is not ascending", config.gimbal_range_deg),
                ));
            }

            let (servo_min, servo_max) = config.servo_range_deg;
            if servo_min >= servo_max
                || servo_min < SERVO_RANGE_DEG.0
                || servo_max > SERVO_RANGE_DEG.1
            {
                return Err(ServoError::InvalidConfig(
                    axis,
                    format!("servo range {:?} is not within {:?}", config.servo_range_deg, SERVO_RANGE_DEG),
                ));
            }
        }

        Ok(Self {
            driver,
            servo_config_map,
        })
    }

    /// Set a single gimbal axis to the given gimbal-frame angle.
    pub fn set_axis_angle(&mut self, axis: GimbalAxis, angle_deg: f64) -> Result<(), ServoError> {
        let config = self
            .servo_config_map
            .get(&axis)
            .ok_or(ServoError::UnconfiguredAxis(axis))?;

        let servo_deg = lin_map(config.gimbal_range_deg, config.servo_range_deg, angle_deg);

        self.driver.set_angle(config.channel, servo_deg)
    }

    /// Actuate a set of gimbal demands.
    ///
    /// All axes present in the demands are attempted even if an earlier one
    /// fails, so a single bad write doesn't freeze the other axis. The first
    /// error is returned.
    pub fn actuate(&mut self, dems: &GimbalDems) -> Result<(), ServoError> {
        let mut first_err = None;

        for (&axis, &angle_deg) in &dems.pos_deg {
            if let Err(e) = self.set_axis_angle(axis, angle_deg) {
                warn!("Failed to actuate {} axis: {}", axis, e);
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Driver which records every write for inspection.
    struct MockDriver {
        writes: Rc<RefCell<Vec<(u8, f64)>>>,
    }

    impl ServoDriver for MockDriver {
        fn set_angle(&mut self, channel: u8, angle_deg: f64) -> Result<(), ServoError> {
            self.writes.borrow_mut().push((channel, angle_deg));
            Ok(())
        }
    }

    fn config_map() -> HashMap<GimbalAxis, ServoConfig> {
        let mut map = HashMap::new();
        map.insert(
            GimbalAxis::Pan,
            ServoConfig {
                channel: 0,
                gimbal_range_deg: (0.0, 180.0),
                servo_range_deg: (0.0, 180.0),
            },
        );
        map.insert(
            GimbalAxis::Tilt,
            ServoConfig {
                channel: 1,
                gimbal_range_deg: (-5.0, 30.0),
                servo_range_deg: (85.0, 120.0),
            },
        );
        map
    }

    fn ctrl() -> (ServoCtrl, Rc<RefCell<Vec<(u8, f64)>>>) {
        let writes = Rc::new(RefCell::new(vec![]));
        let driver = MockDriver {
            writes: writes.clone(),
        };
        (
            ServoCtrl::new(Box::new(driver), config_map()).unwrap(),
            writes,
        )
    }

    #[test]
    fn test_pan_maps_directly() {
        let (mut ctrl, writes) = ctrl();

        ctrl.set_axis_angle(GimbalAxis::Pan, 90.0).unwrap();
        assert_eq!(writes.borrow()[0], (0, 90.0));
    }

    #[test]
    fn test_tilt_maps_to_servo_subrange() {
        let (mut ctrl, writes) = ctrl();

        ctrl.set_axis_angle(GimbalAxis::Tilt, -5.0).unwrap();
        ctrl.set_axis_angle(GimbalAxis::Tilt, 30.0).unwrap();

        let writes = writes.borrow();
        assert_eq!(writes[0], (1, 85.0));
        assert_eq!(writes[1], (1, 120.0));
    }

    #[test]
    fn test_actuate_writes_each_demanded_axis() {
        let (mut ctrl, writes) = ctrl();

        let mut dems = GimbalDems::default();
        dems.pos_deg.insert(GimbalAxis::Pan, 45.0);
        dems.pos_deg.insert(GimbalAxis::Tilt, 12.5);

        ctrl.actuate(&dems).unwrap();
        assert_eq!(writes.borrow().len(), 2);
    }

    #[test]
    fn test_missing_axis_config_rejected() {
        let mut map = config_map();
        map.remove(&GimbalAxis::Tilt);

        let driver = MockDriver {
            writes: Rc::new(RefCell::new(vec![])),
        };
        assert!(ServoCtrl::new(Box::new(driver), map).is_err());
    }

    #[test]
    fn test_bad_servo_range_rejected() {
        let mut map = config_map();
        map.get_mut(&GimbalAxis::Tilt).unwrap().servo_range_deg = (120.0, 85.0);

        let driver = MockDriver {
            writes: Rc::new(RefCell::new(vec![])),
        };
        assert!(ServoCtrl::new(Box::new(driver), map).is_err());
    }
}
