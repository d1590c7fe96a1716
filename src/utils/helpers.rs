use std::time::{SystemTime, UNIX_EPOCH};

pub trait BadCast {
    type Output;

    /// Do a simple cast `T` as `U`.
    ///
    /// This can lead to truncation or precision loss.
    #[must_use]
    fn bad_cast(self) -> Self::Output;
}

/// Floors and saturates, negative values and NaN land on 0
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
impl BadCast for f64 {
    type Output = u32;

    fn bad_cast(self) -> u32 {
        self.floor() as u32
    }
}

/// Milliseconds since the epoch, used to name saved samples
#[must_use]
pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::BadCast;

    #[test]
    fn float_to_pixel_floors_and_saturates() {
        assert_eq!(12.9_f64.bad_cast(), 12);
        assert_eq!((-3.0_f64).bad_cast(), 0);
        assert_eq!(f64::NAN.bad_cast(), 0);
        assert_eq!(1e12_f64.bad_cast(), u32::MAX);
    }
}
