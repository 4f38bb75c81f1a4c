//! Console progress for the acquisition loop: position, percentage,
//! expected remaining time and the parameters being fetched.

use std::time::{Duration, Instant};

use lanthanide_opacity::GridPoint;

/// Tracks elapsed time across a run over `total` grid points.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    total: usize,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Log the start of an attempt at the grid point with zero-based `index`.
    pub fn announce(&self, index: usize, point: &GridPoint) {
        let position = index + 1;
        tracing::info!(
            "Downloading dataframe {position} / {} ({:.2}% achieved)",
            self.total,
            percent(position, self.total)
        );
        if let Some(remaining) = estimate_remaining(self.started.elapsed(), index, self.total) {
            tracing::info!("Expected remaining time : {}", format_duration(remaining));
        }
        tracing::info!("Nuclear charge : {}", point.nuclear_charge);
        tracing::info!("Mass density : {:e} g/cm\u{00b3}", point.mass_density());
        tracing::info!("Electron temperature : {} eV", point.temperature);
    }
}

fn percent(position: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * position as f64 / total as f64
    }
}

/// `elapsed * (total - index) / index`, or `None` before anything was timed.
pub fn estimate_remaining(elapsed: Duration, index: usize, total: usize) -> Option<Duration> {
    if index == 0 || index > total {
        return None;
    }
    Some(elapsed.mul_f64((total - index) as f64 / index as f64))
}

/// `H:MM:SS`, with a day prefix past 24 hours.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    match days {
        0 => format!("{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("1 day, {hours}:{minutes:02}:{seconds:02}"),
        n => format!("{n} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}
