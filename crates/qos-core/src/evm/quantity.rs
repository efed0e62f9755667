//! Ethereum JSON-RPC quantity encoding.

/// Parses a hex quantity with or without the `0x` prefix.
///
/// ```
/// use qos_core::evm::quantity::parse_quantity;
///
/// assert_eq!(parse_quantity("0xff"), Some(255));
/// assert_eq!(parse_quantity("ff"), Some(255));
/// assert_eq!(parse_quantity("latest"), None);
/// ```
#[must_use]
pub fn parse_quantity(s: &str) -> Option<u64> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return None;
    }
    u64::from_str_radix(s, 16).ok()
}

/// Parses a quantity that may exceed `u64`, such as a wei balance.
#[must_use]
pub fn parse_quantity_u128(s: &str) -> Option<u128> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return None;
    }
    u128::from_str_radix(s, 16).ok()
}

/// Block number parameter for a request, e.g. `0x10`.
#[must_use]
pub fn to_quantity(n: u64) -> String {
    format!("{n:#x}")
}

/// Canonical form of a reported balance: decimal if it parses, lowercase otherwise.
///
/// Endpoints disagree on zero padding and letter case; consensus counts must not.
#[must_use]
pub fn normalize_balance(raw: &str) -> String {
    parse_quantity_u128(raw).map_or_else(|| raw.to_ascii_lowercase(), |wei| wei.to_string())
}
