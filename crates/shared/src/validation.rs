//! Common validation utilities.

use rust_decimal::Decimal;
use validator::ValidationError;

/// Maximum number of fraction digits a price may carry.
pub const PRICE_SCALE: u32 = 2;

/// Upper bound for any price (99,999,999.99).
pub fn max_price() -> Decimal {
    Decimal::new(9_999_999_999, PRICE_SCALE)
}

lazy_static::lazy_static! {
    pub static ref CURRENCY_CODE_REGEX: regex::Regex = regex::Regex::new(r"^[A-Z]{3}$").unwrap();
}

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validates that a price is non-negative, bounded and has at most two fraction digits.
pub fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(error("price_negative", "Price must be non-negative".into()));
    }
    if *price > max_price() {
        return Err(error(
            "price_too_large",
            "Price must not exceed 99999999.99".into(),
        ));
    }
    if price.normalize().scale() > PRICE_SCALE {
        return Err(error(
            "price_precision",
            "Price must have at most 2 decimal places".into(),
        ));
    }
    Ok(())
}

/// Validates that a currency code is three uppercase letters and a member of
/// the supported set.
pub fn validate_currency_code(code: &str, supported: &[&str]) -> Result<(), ValidationError> {
    if !CURRENCY_CODE_REGEX.is_match(code) {
        return Err(error(
            "currency_format",
            format!("Currency must be a three-letter uppercase code, got: {}", code),
        ));
    }
    if supported.contains(&code) {
        Ok(())
    } else {
        Err(error(
            "currency_unsupported",
            format!("Unsupported currency: {}", code),
        ))
    }
}

/// Validates that a string is not blank once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("blank", "Value must not be blank".into()))
    } else {
        Ok(())
    }
}

/// Validates the trimmed character length of a string.
pub fn validate_trimmed_length(value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        Err(error(
            "length",
            format!("Must be between {} and {} characters", min, max),
        ))
    } else {
        Ok(())
    }
}
