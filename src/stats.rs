// Commute statistics and duration helpers

use crate::record::Commute;
use serde::Serialize;

/// Trip counts by direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommuteStats {
    pub total: u64,
    pub outbound: u64,
    pub return_trips: u64,
}

impl CommuteStats {
    pub fn from_commutes(commutes: &[Commute]) -> Self {
        let outbound = commutes.iter().filter(|c| c.is_outbound).count() as u64;
        let total = commutes.len() as u64;
        Self {
            total,
            outbound,
            return_trips: total - outbound,
        }
    }
}

fn hhmm_to_minutes(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h = h.parse::<u32>().ok()?;
    let m = m.parse::<u32>().ok()?;
    if h >= 24 || m >= 60 {
        return None;
    }
    Some(h * 60 + m)
}

/// Minutes as `"Xh Ym"`
pub fn format_minutes(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Elapsed time between two `HH:MM` times as `"Xh Ym"`.
///
/// An end before the start is taken to be on the following day.
pub fn compute_duration(start: &str, end: &str) -> Option<String> {
    let start = hhmm_to_minutes(start)?;
    let mut end = hhmm_to_minutes(end)?;
    if end < start {
        end += 24 * 60;
    }
    Some(format_minutes(end - start))
}

/// Parse `"1h 30m"`, `"2h"` or `"45m"` into minutes. None if it does not
/// parse or does not fit in a `u32`.
pub fn parse_duration(s: &str) -> Option<u32> {
    let mut total: u32 = 0;
    let mut seen = false;
    for token in s.split_whitespace() {
        let (number, factor) = if let Some(n) = token.strip_suffix('h') {
            (n, 60)
        } else if let Some(n) = token.strip_suffix('m') {
            (n, 1)
        } else {
            return None;
        };
        let minutes = number.parse::<u32>().ok()?.checked_mul(factor)?;
        total = total.checked_add(minutes)?;
        seen = true;
    }
    seen.then_some(total)
}

/// Rounded mean of every parseable duration, None if there are none
pub fn average_duration(commutes: &[Commute]) -> Option<String> {
    let minutes: Vec<u32> = commutes
        .iter()
        .filter_map(|c| c.duration.as_deref().and_then(parse_duration))
        .collect();
    if minutes.is_empty() {
        return None;
    }
    let sum: u64 = minutes.iter().map(|&m| u64::from(m)).sum();
    let mean = (sum as f64 / minutes.len() as f64).round() as u64;
    Some(format_minutes(u32::try_from(mean).ok()?))
}
