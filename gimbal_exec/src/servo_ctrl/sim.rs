//! [`ServoDriver`] implementation which logs demands instead of driving hardware.
//!
//! Used when running on a development machine without the servo board
//! attached, so the full exec loop can be exercised end to end.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;

use super::{ServoDriver, ServoError, NUM_CHANNELS, SERVO_RANGE_DEG};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulated servo driver.
///
/// Validates demands to the same rules as the hardware drivers and remembers
/// the last angle written to each channel.
#[derive(Debug, Default)]
pub struct SimServo {
    last_angle_deg: [Option<f64>; NUM_CHANNELS as usize],
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the last angle written to a channel, if any.
    pub fn last_angle_deg(&self, channel: u8) -> Option<f64> {
        self.last_angle_deg
            .get(channel as usize)
            .copied()
            .flatten()
    }
}

impl ServoDriver for SimServo {
    fn set_angle(&mut self, channel: u8, angle_deg: f64) -> Result<(), ServoError> {
        if channel >= NUM_CHANNELS {
            return Err(ServoError::InvalidChannel(channel));
        }

        if !angle_deg.is_finite()
            || angle_deg < SERVO_RANGE_DEG.0
            || angle_deg > SERVO_RANGE_DEG.1
        {
            return Err(ServoError::InvalidAngle(angle_deg));
        }

        debug!("SIM SERVO: channel {} -> {:.2} deg", channel, angle_deg);

        self.last_angle_deg[channel as usize] = Some(angle_deg);

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sim_records_last_angle() {
        let mut servo = SimServo::new();

        servo.set_angle(3, 90.0).unwrap();
        assert_eq!(servo.last_angle_deg(3), Some(90.0));
        assert_eq!(servo.last_angle_deg(4), None);
    }

    #[test]
    fn test_sim_rejects_bad_demands() {
        let mut servo = SimServo::new();

        assert!(servo.set_angle(16, 90.0).is_err());
        assert!(servo.set_angle(0, 181.0).is_err());
        assert!(servo.set_angle(0, f64::NAN).is_err());
    }
}
