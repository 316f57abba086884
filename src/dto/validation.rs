//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::karaoke::WindowSize;

const MIN_WINDOW_WIDTH: u32 = 320;
const MIN_WINDOW_HEIGHT: u32 = 240;
const MAX_WINDOW_DIMENSION: u32 = 7680;

/// Validates that a keypad press is exactly one ASCII digit.
///
/// # Examples
///
/// ```ignore
/// validate_digit("7")  // Ok
/// validate_digit("12") // Err - more than one character
/// validate_digit("a")  // Err - not a digit
/// ```
pub fn validate_digit(digit: &str) -> Result<(), ValidationError> {
    let mut chars = digit.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_digit() => Ok(()),
        _ => {
            let mut err = ValidationError::new("digit_format");
            err.message = Some(format!("Digit must be a single character 0-9 (got `{digit}`)").into());
            Err(err)
        }
    }
}

/// Validates window dimensions against sane display bounds.
pub fn validate_window_size(size: &WindowSize) -> Result<(), ValidationError> {
    let width_ok = (MIN_WINDOW_WIDTH..=MAX_WINDOW_DIMENSION).contains(&size.width);
    let height_ok = (MIN_WINDOW_HEIGHT..=MAX_WINDOW_DIMENSION).contains(&size.height);
    if width_ok && height_ok {
        return Ok(());
    }

    let mut err = ValidationError::new("window_size_range");
    err.message = Some(
        format!(
            "Window size must be between {MIN_WINDOW_WIDTH}x{MIN_WINDOW_HEIGHT} and \
             {MAX_WINDOW_DIMENSION}x{MAX_WINDOW_DIMENSION} (got {}x{})",
            size.width, size.height
        )
        .into(),
    );
    Err(err)
}

/// Validates that a volume lies in `0.0..=1.0`.
pub fn validate_volume(value: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("volume_range");
        err.message = Some(format!("Volume must be between 0 and 1 (got {value})").into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_digit() {
        assert!(validate_digit("0").is_ok());
        assert!(validate_digit("9").is_ok());
        assert!(validate_digit("").is_err());
        assert!(validate_digit("12").is_err());
        assert!(validate_digit("a").is_err());
        assert!(validate_digit("٣").is_err()); // non-ASCII digit
    }

    #[test]
    fn test_validate_window_size() {
        assert!(validate_window_size(&WindowSize::default()).is_ok());
        assert!(validate_window_size(&WindowSize { width: 100, height: 720 }).is_err());
        assert!(validate_window_size(&WindowSize { width: 1280, height: 9000 }).is_err());
    }

    #[test]
    fn test_validate_volume() {
        assert!(validate_volume(0.0).is_ok());
        assert!(validate_volume(1.0).is_ok());
        assert!(validate_volume(1.5).is_err());
        assert!(validate_volume(-0.1).is_err());
    }
}
