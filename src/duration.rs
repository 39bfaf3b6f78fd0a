use std::time::Duration;

use anyhow::{bail, Result};

/// Suffix to milliseconds multiplier (order matters: `ms` before `m` and `s`)
const UNITS: &[(&str, f64)] = &[
    ("ms", 1.0),
    ("s", 1_000.0),
    ("m", 60_000.0),
    ("h", 3_600_000.0),
];

/// Parse interval strings like "250ms", "5s", "1.5m", "1h".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        bail!("empty duration");
    }

    let (val_str, multiplier) = UNITS
        .iter()
        .find_map(|(suffix, m)| s.strip_suffix(suffix).map(|v| (v, *m)))
        .unwrap_or((s, 1_000.0));

    let val: f64 = val_str.trim().parse()?;
    if !val.is_finite() || val < 0.0 {
        bail!("duration must be a non-negative number: {}", s);
    }
    Ok(Duration::from_secs_f64(val * multiplier / 1_000.0))
}

/// Format a duration for display
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_secs_f64() * 1_000.0;
    if d.is_zero() {
        "0ms".to_string()
    } else if millis < 1_000.0 {
        format!("{:.0}ms", millis)
    } else if millis < 60_000.0 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m{:02}s", d.as_secs() / 60, d.as_secs() % 60)
    }
}
