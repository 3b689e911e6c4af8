use std::time::Duration;

use chrono::{Local, Timelike};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::controller::{CycleReport, UpdateController};
use crate::error::CycleError;

/// Daily hours during which cycles may start. The closing hour is only
/// open for its first `closing_grace_minutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    pub opening_hour: u32,
    pub closing_hour: u32,
    pub closing_grace_minutes: u32,
}

impl Default for OperatingWindow {
    fn default() -> Self {
        Self {
            opening_hour: 6,
            closing_hour: 23,
            closing_grace_minutes: 10,
        }
    }
}

impl OperatingWindow {
    pub fn allows<T: Timelike>(&self, now: &T) -> bool {
        let hour = now.hour();
        if hour < self.opening_hour || hour > self.closing_hour {
            return false;
        }
        !(hour == self.closing_hour && now.minute() > self.closing_grace_minutes)
    }

    pub fn allows_now(&self) -> bool {
        self.allows(&Local::now())
    }
}

/// Runs one cycle if the window is open. `Ok(None)` means the window was
/// closed and nothing happened.
pub async fn run_in_window(
    controller: &mut UpdateController,
    window: &OperatingWindow,
    force: bool,
) -> Result<Option<CycleReport>, CycleError> {
    if !force && !window.allows_now() {
        info!(
            "outside operating hours, sleeping until {:02}:00",
            window.opening_hour
        );
        return Ok(None);
    }
    controller.run_cycle().await.map(Some)
}

/// Runs cycles back to back on one task, so a slow cycle delays the next
/// tick instead of overlapping it. A failed cycle is logged and retried on
/// the next tick.
pub async fn run_watch_loop(
    controller: &mut UpdateController,
    window: &OperatingWindow,
    interval: Duration,
    iterations: Option<u32>,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut completed = 0u32;
    loop {
        ticker.tick().await;
        match run_in_window(controller, window, false).await {
            Ok(Some(report)) => info!("cycle finished: {}", describe(&report)),
            Ok(None) => {}
            Err(err) => error!("cycle aborted: {err}"),
        }
        completed = completed.saturating_add(1);
        if iterations.is_some_and(|limit| completed >= limit) {
            break;
        }
    }
}

pub fn describe(report: &CycleReport) -> String {
    match report {
        CycleReport::Initialized {
            test_count,
            entries,
        } => format!("baseline recorded ({test_count} tests, {entries} marks)"),
        CycleReport::NoChange { fetched, .. } => format!("no new marks ({fetched} tests)"),
        CycleReport::Updated {
            test_count,
            outcomes,
        } => {
            let failures: usize = outcomes.iter().map(|o| o.failures()).sum();
            format!(
                "{} new mark(s) notified, {failures} delivery failure(s), {test_count} tests",
                outcomes.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::{describe, OperatingWindow};
    use crate::controller::CycleReport;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    #[test]
    fn closed_at_night() {
        let window = OperatingWindow::default();
        assert!(!window.allows(&at(5, 59)));
        assert!(!window.allows(&at(0, 30)));
        assert!(window.allows(&at(6, 0)));
        assert!(window.allows(&at(14, 45)));
    }

    #[test]
    fn closing_hour_has_grace_period() {
        let window = OperatingWindow::default();
        assert!(window.allows(&at(23, 0)));
        assert!(window.allows(&at(23, 10)));
        assert!(!window.allows(&at(23, 11)));
    }

    #[test]
    fn describes_reports() {
        let report = CycleReport::NoChange {
            fetched: 4,
            stored: 4,
        };
        assert_eq!(describe(&report), "no new marks (4 tests)");
    }
}
