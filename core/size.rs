use crate::error::{AppError, Result};
use byte_unit::{Byte, Unit, UnitType};
use std::convert::TryInto;

/// Parses a human size string (`"1MiB"`, `"500KB"`, `"2M"`, `"2048"`) into bytes.
///
/// Units are case-insensitive and always powers of 1024: `K`, `KB` and `KiB`
/// all mean 1024 bytes. A bare number is bytes, `"0"` disables the limit.
pub fn parse_size(size_str: &str) -> Result<u64> {
    let invalid = |detail: String| {
        AppError::SizeParse(format!(
            "Invalid size '{}': {}. Use a number with an optional unit like K, MB, GiB.",
            size_str, detail
        ))
    };

    let trimmed = size_str.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let unit = unit.trim();
    if number.is_empty() {
        return Err(invalid("missing number".to_string()));
    }

    let byte_value = if unit.is_empty() {
        match number.parse::<u64>() {
            Ok(bytes) => return Ok(bytes),
            Err(_) => number
                .parse::<f64>()
                .ok()
                .and_then(Byte::from_f64)
                .ok_or_else(|| invalid("not a number".to_string()))?,
        }
    } else {
        let unit = Unit::parse_str(unit, true, true).map_err(|e| invalid(e.to_string()))?;
        let value: f64 = number.parse().map_err(|_| invalid("not a number".to_string()))?;
        Byte::from_f64_with_unit(value, unit).ok_or_else(|| invalid("out of range".to_string()))?
    };

    let bytes: u128 = byte_value.into();
    bytes
        .try_into()
        .map_err(|_| AppError::SizeParse(format!("Size '{}' is too large", size_str)))
}

pub fn human_size(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}
