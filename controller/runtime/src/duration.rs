use anyhow::{anyhow, bail, Result};
use std::time::Duration;

/// Parses durations like `500ms`, `5s`, `10m` or `1h`.
pub(crate) fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let offset = s
        .rfind(|c: char| c.is_ascii_digit())
        .ok_or_else(|| anyhow!("{} does not contain a duration value", s))?;
    let (magnitude, unit) = s.split_at(offset + 1);
    let magnitude = magnitude.parse::<u64>()?;

    let mul = match unit {
        "" if magnitude == 0 => 0,
        "ms" => 1,
        "s" => 1000,
        "m" => 1000 * 60,
        "h" => 1000 * 60 * 60,
        _ => bail!(
            "invalid duration unit {} (expected one of 'ms', 's', 'm', or 'h')",
            unit
        ),
    };

    let ms = magnitude
        .checked_mul(mul)
        .ok_or_else(|| anyhow!("duration {} overflows when converted to 'ms'", s))?;
    Ok(Duration::from_millis(ms))
}
