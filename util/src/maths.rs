//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Clamp a value into the range [min, max].
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Clamp a value into the symmetric range [-limit, limit].
pub fn clamp_abs<T>(value: &T, limit: &T) -> T
where
    T: Float
{
    clamp(value, &-limit.abs(), &limit.abs())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        // Tilt servo mapping used by the gimbal: [-5, 30] deg -> [85, 120] deg
        assert_eq!(lin_map((-5f64, 30f64), (85f64, 120f64), -5f64), 85f64);
        assert_eq!(lin_map((-5f64, 30f64), (85f64, 120f64), 30f64), 120f64);

        // Reversed target range
        assert_eq!(lin_map((0f64, 1f64), (1f64, 0f64), 0.25f64), 0.75f64);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&190f64, &0f64, &180f64), 180f64);
        assert_eq!(clamp(&-1f64, &0f64, &180f64), 0f64);
        assert_eq!(clamp(&90f64, &0f64, &180f64), 90f64);
    }

    #[test]
    fn test_clamp_abs() {
        assert_eq!(clamp_abs(&10f64, &5f64), 5f64);
        assert_eq!(clamp_abs(&-10f64, &5f64), -5f64);
        assert_eq!(clamp_abs(&2.5f64, &5f64), 2.5f64);
    }
}
