//! Validation utilities for catalog inputs and listing filters

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Largest price a NUMERIC(10,2) column holds
pub const MAX_UNIT_PRICE: &str = "99999999.99";

// ============================================================================
// Catalog Validations
// ============================================================================

/// Trim surrounding whitespace from a code or name
pub fn normalize_label(value: &str) -> String {
    value.trim().to_string()
}

/// Validate a business code (supplier, material or store)
pub fn validate_code(code: &str) -> Result<(), &'static str> {
    let code = code.trim();
    if code.is_empty() {
        return Err("Code is required");
    }
    if code.chars().count() > 100 {
        return Err("Code must be at most 100 characters");
    }
    if code.chars().any(char::is_control) {
        return Err("Code must not contain control characters");
    }
    Ok(())
}

/// Validate a display name
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Name is required");
    }
    if name.chars().count() > 255 {
        return Err("Name must be at most 255 characters");
    }
    Ok(())
}

/// Validate a unit price: non-negative, at most two decimals, fits NUMERIC(10,2)
pub fn validate_unit_price(price: Decimal) -> Result<(), &'static str> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err("Unit price cannot be negative");
    }
    if price.normalize().scale() > 2 {
        return Err("Unit price must have at most two decimal places");
    }
    let max: Decimal = MAX_UNIT_PRICE.parse().unwrap_or(Decimal::MAX);
    if price > max {
        return Err("Unit price is too large");
    }
    Ok(())
}

// ============================================================================
// Filter Validations
// ============================================================================

/// Validate that a date range is not inverted
pub fn validate_date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), &'static str> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err("Start date must not be after end date"),
        _ => Ok(()),
    }
}
