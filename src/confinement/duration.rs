//! Duration grammar for lock commands.
//!
//! A duration token is one or more digits with an optional unit suffix
//! (`s`, `m`, `h`, `d`); a bare number is read as minutes, so
//! `.lock @user 10` means ten minutes.

use regex::Regex;
use std::sync::LazyLock;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([smhd])?$").expect("duration pattern is valid"));

/// Parse a duration token into milliseconds.
///
/// Returns `None` for anything that is not a whole token of the grammar,
/// including the empty string and values that overflow `u64`. Zero is a
/// legal duration and is not special-cased here.
#[must_use]
pub fn parse_duration(token: &str) -> Option<u64> {
    let caps = DURATION_RE.captures(token)?;
    let value: u64 = caps[1].parse().ok()?;
    let multiplier = match caps.get(2).map_or("m", |m| m.as_str()) {
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

/// Format a remaining duration for `.lockinfo` replies.
///
/// Minutes are shown only when at least one full minute remains.
#[must_use]
pub fn format_remaining(ms: u64) -> String {
    let total_seconds = ms / 1_000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    if minutes > 0 {
        format!("{minutes} min {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
