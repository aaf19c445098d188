//! Small numeric helpers for episode statistics.

/// Arithmetic mean of `total` over `count` samples, absent without samples.
#[must_use]
pub fn mean(total: f64, count: u64) -> Option<f64> {
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}

/// Share of `decided` episodes that ended in a win.
///
/// Draws count as decided; forced resets do not.
#[must_use]
pub fn win_rate(wins: u64, decided: u64) -> Option<f64> {
    mean(wins as f64, decided)
}
