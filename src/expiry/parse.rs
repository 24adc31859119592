//! Expiry input parsing
//!
//! Admin input for a credential's lifetime is one of:
//! - empty: never expires
//! - an ISO-8601 duration relative to now, e.g. `P1D`, `PT1H30M`, `P1Y2M`
//!   (1Y = 365 days, 1M = 30 days in the date part, fractions allowed)
//! - an RFC 3339 timestamp, e.g. `2030-01-01T00:00:00Z`

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::registry::Expiry;

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;

const DATE_UNITS: &[(char, f64)] = &[('Y', 365.0 * DAY), ('M', 30.0 * DAY), ('W', 7.0 * DAY), ('D', DAY)];
const TIME_UNITS: &[(char, f64)] = &[('H', HOUR), ('M', MINUTE), ('S', 1.0)];

/// Parse admin expiry input relative to the current time
pub fn parse_expiry(input: &str) -> Result<Expiry, ValidationError> {
    parse_expiry_at(input, Utc::now().timestamp())
}

/// Parse admin expiry input relative to `now` (Unix seconds)
pub fn parse_expiry_at(input: &str, now: i64) -> Result<Expiry, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Expiry::NEVER);
    }

    let invalid = || ValidationError::InvalidExpiry(input.to_string());

    if input.starts_with('P') {
        let secs = parse_duration_secs(input).ok_or_else(invalid)?;
        return Ok(Expiry::at(now.saturating_add(secs as i64)));
    }

    let at = DateTime::parse_from_rfc3339(input).map_err(|_| invalid())?;
    let secs = at.timestamp();
    if secs < 0 {
        return Err(invalid());
    }
    Ok(Expiry::at(secs))
}

/// Total seconds of an ISO-8601 duration; `None` if malformed or zero
fn parse_duration_secs(input: &str) -> Option<f64> {
    let rest = input.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let (mut total, mut seen) = parse_components(date, DATE_UNITS)?;
    if let Some(time) = time {
        let (time_total, time_seen) = parse_components(time, TIME_UNITS)?;
        // "P1DT" is malformed
        if !time_seen {
            return None;
        }
        total += time_total;
        seen = true;
    }

    if !seen || !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some(total)
}

/// Sum `<number><unit>` pairs; units must appear in table order, at most once
fn parse_components(part: &str, units: &[(char, f64)]) -> Option<(f64, bool)> {
    let mut total = 0.0;
    let mut seen = false;
    let mut next_unit = 0;
    let mut number = String::new();

    for c in part.chars() {
        match c {
            '0'..='9' | '.' => number.push(c),
            ',' => number.push('.'),
            _ => {
                let index = next_unit + units[next_unit..].iter().position(|(unit, _)| *unit == c)?;
                let value: f64 = number.parse().ok()?;
                total += value * units[index].1;
                next_unit = index + 1;
                number.clear();
                seen = true;
            }
        }
    }

    if !number.is_empty() {
        return None;
    }
    Some((total, seen))
}
