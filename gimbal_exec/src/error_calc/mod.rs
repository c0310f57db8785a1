//! # Error calculation module
//!
//! Converts an object's position in a video frame into a normalised error pair
//! measured from the frame centre. This is the pure input stage of the gimbal
//! control chain: no state, no side effects, so it can be tested exhaustively
//! without hardware.
//!
//! Malformed positions (non-finite or outside the frame) are rejected here
//! with an error rather than being clamped, so that the caller can treat the
//! cycle as "no detection" instead of chasing a bogus target.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// Internal
use comms_if::eqpt::vision::FrameSize;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during error calculation.
#[derive(Debug, thiserror::Error)]
pub enum ErrorCalcError {
    #[error("Object position ({0}, {1}) is not finite")]
    NonFinitePosition(f64, f64),

    #[error("Object position ({0}, {1}) is outside the {2}x{3} px frame")]
    OutOfFrame(f64, f64, u32, u32),

    #[error("Frame dimensions {0}x{1} px are degenerate")]
    DegenerateFrame(u32, u32),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Calculate the normalised pixel error of an object position relative to the
/// frame centre.
///
/// Both components of the result lie in [-1, 1]: -1 at the left/top edge of
/// the frame, 0 at the centre, +1 at the right/bottom edge. Positions on the
/// far edge (x == width) are accepted as +1 since detections are reported at
/// object centres which may sit on the frame boundary.
pub fn normalised_error(
    frame: &FrameSize,
    pos_px: [f64; 2],
) -> Result<Vector2<f64>, ErrorCalcError> {
    let [x, y] = pos_px;

    if frame.width_px == 0 || frame.height_px == 0 {
        return Err(ErrorCalcError::DegenerateFrame(
            frame.width_px,
            frame.height_px,
        ));
    }

    if !x.is_finite() || !y.is_finite() {
        return Err(ErrorCalcError::NonFinitePosition(x, y));
    }

    let width = frame.width_px as f64;
    let height = frame.height_px as f64;

    if x < 0.0 || x > width || y < 0.0 || y > height {
        return Err(ErrorCalcError::OutOfFrame(
            x,
            y,
            frame.width_px,
            frame.height_px,
        ));
    }

    let centre = frame.centre();

    Ok(Vector2::new(
        (x - centre[0]) / centre[0],
        (y - centre[1]) / centre[1],
    ))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const FRAME: FrameSize = FrameSize {
        width_px: 640,
        height_px: 480,
    };

    #[test]
    fn test_centre_gives_zero_error() {
        let err = normalised_error(&FRAME, [320.0, 240.0]).unwrap();
        assert_eq!(err.x, 0.0);
        assert_eq!(err.y, 0.0);
    }

    #[test]
    fn test_edges() {
        let err = normalised_error(&FRAME, [640.0, 240.0]).unwrap();
        assert_eq!(err.x, 1.0);
        assert_eq!(err.y, 0.0);

        let err = normalised_error(&FRAME, [0.0, 0.0]).unwrap();
        assert_eq!(err.x, -1.0);
        assert_eq!(err.y, -1.0);

        let err = normalised_error(&FRAME, [320.0, 480.0]).unwrap();
        assert_eq!(err.y, 1.0);
    }

    #[test]
    fn test_error_is_normalised() {
        for &(x, y) in &[(160.0, 120.0), (480.0, 360.0), (1.0, 479.0)] {
            let err = normalised_error(&FRAME, [x, y]).unwrap();
            assert!(err.x.abs() <= 1.0);
            assert!(err.y.abs() <= 1.0);
        }
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(normalised_error(&FRAME, [f64::NAN, 240.0]).is_err());
        assert!(normalised_error(&FRAME, [320.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_out_of_frame_rejected() {
        assert!(normalised_error(&FRAME, [-1.0, 240.0]).is_err());
        assert!(normalised_error(&FRAME, [320.0, 481.0]).is_err());
        assert!(normalised_error(&FRAME, [700.0, 240.0]).is_err());
    }

    #[test]
    fn test_degenerate_frame_rejected() {
        let frame = FrameSize {
            width_px: 0,
            height_px: 480,
        };
        assert!(normalised_error(&frame, [0.0, 0.0]).is_err());
    }
}
