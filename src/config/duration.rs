// src/config/duration.rs

use std::time::Duration;

use crate::errors::{Result, RunwireError};

/// Parse `"250ms"`, `"3s"`, `"1m"` or `"2h"`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(RunwireError::Validation("empty duration string".to_string()));
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| {
            RunwireError::Validation(format!("duration '{s}' is missing a unit suffix"))
        })?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part.parse().map_err(|e| {
        RunwireError::Validation(format!("invalid duration number '{num_part}': {e}"))
    })?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(RunwireError::Validation(format!(
                "unsupported duration unit '{unit}'; expected ms, s, m, or h"
            )));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| RunwireError::Validation(format!("duration '{s}' is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration(" 1m ").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("2H").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn largest_whole_hours_still_parse() {
        let hours = u64::MAX / 3600;
        let parsed = parse_duration(&format!("{hours}h")).unwrap();
        assert_eq!(parsed, Duration::from_secs(hours * 3600));
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in [
            "",
            "10",
            "ms",
            "5d",
            "1.5s",
            "-1s",
            "6000000000000000h",
            "99999999999999999999s",
        ] {
            let err = parse_duration(bad).unwrap_err();
            assert!(err.is_validation(), "{bad}: {err}");
        }
    }
}
