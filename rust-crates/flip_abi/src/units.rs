use crate::AbiError;
use alloy::primitives::{
    U256,
    utils,
};

/// Amounts in the smallest on-chain unit.
pub type Wei = U256;

pub const ETHER_DECIMALS: usize = 18;

/// Converts a user-supplied decimal string such as `"0.001"` into wei.
///
/// Accepts the shorthand forms `".5"` and `"1."`; rejects signs, exponents
/// and more than 18 fractional digits.
pub fn parse_ether(raw: &str) -> Result<Wei, AbiError> {
    let invalid = || AbiError::InvalidAmount(raw.to_string());
    let trimmed = raw.trim();
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) || fraction.len() > ETHER_DECIMALS {
        return Err(invalid());
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let normalized = if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    };
    utils::parse_ether(&normalized).map_err(|_| invalid())
}

/// Renders `wei` as ether, truncated to `places` fractional digits.
pub fn format_ether(wei: Wei, places: usize) -> String {
    let full = utils::format_ether(wei);
    let (whole, fraction) = full.split_once('.').unwrap_or((full.as_str(), ""));
    let places = places.min(ETHER_DECIMALS);
    if places == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0<width$}", width = ETHER_DECIMALS);
    format!("{whole}.{}", &digits[..places])
}
