//! ISO-8601 durations in the `[-]PnDTnHnMn.nS` form.

use chrono::TimeDelta;
use once_cell::sync::Lazy;
use regex::Regex;

static DURATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"(?i)^([-+]?)P(?:([-+]?[0-9]+)D)?(T(?:([-+]?[0-9]+)H)?(?:([-+]?[0-9]+)M)?(?:([-+]?[0-9]+)(?:[.,]([0-9]{0,9}))?S)?)?$",
  )
  .expect("duration pattern is valid")
});

#[derive(Debug, thiserror::Error)]
#[error("invalid ISO-8601 duration '{0}'")]
pub struct ParseDurationError(String);

/// Parse an ISO-8601 duration such as `PT15M`, `P2DT3H` or `-PT0.5S`.
///
/// Years and months are rejected since they have no fixed length.
pub fn parse_iso_duration(text: &str) -> Result<TimeDelta, ParseDurationError> {
  let invalid = || ParseDurationError(text.to_string());
  let captures = DURATION_PATTERN.captures(text).ok_or_else(invalid)?;

  let number = |index: usize| -> Result<i64, ParseDurationError> {
    captures
      .get(index)
      .map(|m| m.as_str().parse::<i64>().map_err(|_| invalid()))
      .transpose()
      .map(|value| value.unwrap_or(0))
  };

  let has_days = captures.get(2).is_some();
  let has_time = captures.get(4).is_some() || captures.get(5).is_some() || captures.get(6).is_some();
  // A bare `T` (as in `PT` or `P1DT`) carries no time component.
  if captures.get(3).is_some() && !has_time {
    return Err(invalid());
  }
  if !has_days && !has_time {
    return Err(invalid());
  }

  let days = number(2)?;
  let hours = number(4)?;
  let minutes = number(5)?;
  let seconds = number(6)?;

  let mut nanos = match captures.get(7) {
    Some(fraction) if !fraction.as_str().is_empty() => {
      let padded = format!("{:0<9}", fraction.as_str());
      padded.parse::<i64>().map_err(|_| invalid())?
    }
    _ => 0,
  };
  if captures
    .get(6)
    .is_some_and(|m| m.as_str().starts_with('-'))
  {
    nanos = -nanos;
  }

  let total_seconds = days
    .checked_mul(86_400)
    .and_then(|total| total.checked_add(hours.checked_mul(3_600)?))
    .and_then(|total| total.checked_add(minutes.checked_mul(60)?))
    .and_then(|total| total.checked_add(seconds))
    .ok_or_else(invalid)?;

  let delta = TimeDelta::try_seconds(total_seconds)
    .and_then(|delta| delta.checked_add(&TimeDelta::nanoseconds(nanos)))
    .ok_or_else(invalid)?;

  if captures.get(1).is_some_and(|m| m.as_str() == "-") {
    Ok(-delta)
  } else {
    Ok(delta)
  }
}

/// Format a duration in the canonical `PTnHnMn.nS` form.
pub fn format_iso_duration(delta: &TimeDelta) -> String {
  if delta.is_zero() {
    return "PT0S".to_string();
  }

  let sign = if *delta < TimeDelta::zero() { "-" } else { "" };
  let magnitude = delta.abs();
  let total = magnitude.num_seconds();
  let nanos = magnitude.subsec_nanos();

  let hours = total / 3_600;
  let minutes = (total % 3_600) / 60;
  let seconds = total % 60;

  let mut out = format!("{sign}PT");
  if hours > 0 {
    out.push_str(&format!("{hours}H"));
  }
  if minutes > 0 {
    out.push_str(&format!("{minutes}M"));
  }
  if nanos > 0 {
    let fraction = format!("{nanos:09}");
    out.push_str(&format!("{seconds}.{}S", fraction.trim_end_matches('0')));
  } else if seconds > 0 {
    out.push_str(&format!("{seconds}S"));
  }
  out
}
