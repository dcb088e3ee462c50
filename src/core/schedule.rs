//! How long to sleep after a tick.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use std::time::Duration as StdDuration;

use super::window::{ForbiddenWindow, next_transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepPlan {
    /// Sleep the configured interval.
    Regular(StdDuration),
    /// A window starts or ends before the interval is up: sleep exactly
    /// until then and run a boundary tick.
    Boundary {
        until: DateTime<Tz>,
        duration: StdDuration,
    },
}

impl SleepPlan {
    pub fn duration(&self) -> StdDuration {
        match self {
            SleepPlan::Regular(duration) | SleepPlan::Boundary { duration, .. } => *duration,
        }
    }

    pub fn boundary(&self) -> Option<DateTime<Tz>> {
        match self {
            SleepPlan::Regular(_) => None,
            SleepPlan::Boundary { until, .. } => Some(*until),
        }
    }
}

/// Choose between the regular interval and an exact wake-up at the next
/// window transition.
pub fn plan_sleep(
    now: DateTime<Tz>,
    windows: &[ForbiddenWindow],
    interval: StdDuration,
) -> SleepPlan {
    let Ok(chrono_interval) = Duration::from_std(interval) else {
        return SleepPlan::Regular(interval);
    };

    match next_transition(now, windows) {
        Some(until) if until <= now + chrono_interval => {
            let duration = (until - now).to_std().unwrap_or(StdDuration::ZERO);
            SleepPlan::Boundary { until, duration }
        }
        _ => SleepPlan::Regular(interval),
    }
}

/// Human readable "1h 05m" style duration for logs.
pub fn format_duration(duration: StdDuration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, minutes, seconds) {
        (0, 0, s) => format!("{s}s"),
        (0, m, 0) => format!("{m}m"),
        (0, m, s) => format!("{m}m {s:02}s"),
        (h, m, _) => format!("{h}h {m:02}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::at;
    use chrono::NaiveDate;

    fn shabbat() -> Vec<ForbiddenWindow> {
        vec![ForbiddenWindow {
            start: at("2024-06-07 19:00"),
            end: at("2024-06-08 19:50"),
            first_day: NaiveDate::from_ymd_opt(2024, 6, 8).unwrap(),
            last_day: NaiveDate::from_ymd_opt(2024, 6, 8).unwrap(),
        }]
    }

    const HALF_HOUR: StdDuration = StdDuration::from_secs(30 * 60);

    #[test]
    fn test_entry_inside_interval_plans_boundary() {
        let plan = plan_sleep(at("2024-06-07 18:50"), &shabbat(), HALF_HOUR);
        assert_eq!(
            plan,
            SleepPlan::Boundary {
                until: at("2024-06-07 19:00"),
                duration: StdDuration::from_secs(10 * 60),
            }
        );
    }

    #[test]
    fn test_exit_inside_interval_plans_boundary() {
        let plan = plan_sleep(at("2024-06-08 19:40"), &shabbat(), HALF_HOUR);
        assert_eq!(plan.boundary(), Some(at("2024-06-08 19:50")));
        assert_eq!(plan.duration(), StdDuration::from_secs(600));
    }

    #[test]
    fn test_far_boundary_plans_regular() {
        assert_eq!(
            plan_sleep(at("2024-06-07 12:00"), &shabbat(), HALF_HOUR),
            SleepPlan::Regular(HALF_HOUR)
        );
        // Exactly at the start: the next transition is the end, far away
        assert_eq!(
            plan_sleep(at("2024-06-07 19:00"), &shabbat(), HALF_HOUR),
            SleepPlan::Regular(HALF_HOUR)
        );
    }

    #[test]
    fn test_boundary_exactly_one_interval_away() {
        let plan = plan_sleep(at("2024-06-07 18:30"), &shabbat(), HALF_HOUR);
        assert_eq!(plan.boundary(), Some(at("2024-06-07 19:00")));
        assert_eq!(plan.duration(), HALF_HOUR);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(StdDuration::from_secs(45)), "45s");
        assert_eq!(format_duration(StdDuration::from_secs(600)), "10m");
        assert_eq!(format_duration(StdDuration::from_secs(605)), "10m 05s");
        assert_eq!(format_duration(StdDuration::from_secs(3900)), "1h 05m");
    }
}
