//! Human-readable size parsing and formatting.

use regex::Regex;
use std::sync::OnceLock;

use super::ConfigError;

const KIB: u64 = 1024;

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]+(?:\.[0-9]+)?)\s*([a-zA-Z]{0,3})$").expect("size pattern is valid")
    })
}

/// Parse a size string such as `20MB`, `512k`, `1.5 GiB` or `4096` into bytes.
///
/// Units are binary multiples: `KB` is 1024 bytes, `MB` is 1024² bytes and so
/// on. The `K`/`KiB` spellings are accepted as aliases.
pub fn parse_size(input: &str) -> Result<u64, ConfigError> {
    let trimmed = input.trim();
    let invalid = || ConfigError::InvalidSize(input.to_string());

    let captures = size_pattern().captures(trimmed).ok_or_else(invalid)?;
    let number: f64 = captures[1].parse().map_err(|_| invalid())?;
    let unit = captures[2].to_ascii_uppercase();

    let multiplier = match unit.as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => KIB,
        "M" | "MB" | "MIB" => KIB.pow(2),
        "G" | "GB" | "GIB" => KIB.pow(3),
        "T" | "TB" | "TIB" => KIB.pow(4),
        _ => return Err(invalid()),
    };

    Ok((number * multiplier as f64) as u64)
}

/// Format a byte count for display (e.g. `20.00 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= KIB as f64 && unit < UNITS.len() - 1 {
        value /= KIB as f64;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
