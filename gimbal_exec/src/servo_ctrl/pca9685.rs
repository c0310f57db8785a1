//! [`ServoDriver`] implementation for the PCA9685 driver

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::i2c::{Write, WriteRead};
use pwm_pca9685::{Channel, Pca9685};

use super::{ServoDriver, ServoError, SERVO_RANGE_DEG};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of PWM counts in a full cycle
const MAX_PWM: u16 = 4096;

/// PWM cycle period at the 50 Hz servo update rate
const PWM_PERIOD_S: f64 = 0.02;

/// Pulse width commanding the minimum servo angle
const PULSE_MIN_S: f64 = 0.0005;

/// Pulse width commanding the maximum servo angle
const PULSE_MAX_S: f64 = 0.0025;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I2C, E> ServoDriver for Pca9685<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    fn set_angle(&mut self, channel: u8, angle_deg: f64) -> Result<(), ServoError> {
        // If the angle is out of range return an error
        if !angle_deg.is_finite()
            || angle_deg < SERVO_RANGE_DEG.0
            || angle_deg > SERVO_RANGE_DEG.1
        {
            return Err(ServoError::InvalidAngle(angle_deg));
        }

        let channel = channel_from_index(channel)?;

        // Convert the angle into a pulse width, then into the off count for
        // the channel. The pulse starts at count 0 so the off count is just
        // the pulse width as a fraction of the cycle.
        let angle_frac = (angle_deg - SERVO_RANGE_DEG.0) / (SERVO_RANGE_DEG.1 - SERVO_RANGE_DEG.0);
        let pulse_s = PULSE_MIN_S + angle_frac * (PULSE_MAX_S - PULSE_MIN_S);
        let off_count = ((pulse_s / PWM_PERIOD_S) * (MAX_PWM as f64)) as u16;

        match self.set_channel_on_off(channel, 0, off_count) {
            Ok(_) => Ok(()),
            Err(pwm_pca9685::Error::I2C(_)) => Err(ServoError::I2c),
            Err(pwm_pca9685::Error::InvalidInputData) => Err(ServoError::InvalidAngle(angle_deg)),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Map a channel index onto the driver's [`Channel`] enum.
fn channel_from_index(channel: u8) -> Result<Channel, ServoError> {
    match channel {
        0 => Ok(Channel::C0),
        1 => Ok(Channel::C1),
        2 => Ok(Channel::C2),
        3 => Ok(Channel::C3),
        4 => Ok(Channel::C4),
        5 => Ok(Channel::C5),
        6 => Ok(Channel::C6),
        7 => Ok(Channel::C7),
        8 => Ok(Channel::C8),
        9 => Ok(Channel::C9),
        10 => Ok(Channel::C10),
        11 => Ok(Channel::C11),
        12 => Ok(Channel::C12),
        13 => Ok(Channel::C13),
        14 => Ok(Channel::C14),
        15 => Ok(Channel::C15),
        _ => Err(ServoError::InvalidChannel(channel)),
    }
}
