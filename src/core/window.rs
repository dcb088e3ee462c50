//! Forbidden windows and per-device dark windows.
//!
//! Everything here is a pure function of its arguments: the caller passes
//! `now`, the provider and the offsets on every call and nothing is cached
//! between ticks.
//!
//! A forbidden window covers a run of consecutive forbidden days D1..Dn and
//! spans from sunset on the eve of D1 to tzais on Dn, widened by the
//! configured `erev`/`motzei` minutes. Both ends are inclusive. Extended
//! windows that overlap or touch are merged into one.

use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;

use crate::common::constants::{MAXIMUM_WINDOW_OFFSET, WINDOW_SCAN_DAYS};
use crate::config::{LightOffsets, WindowOffsets};
use crate::zmanim::{DayTimes, TimeProvider, ZmanimError};

/// Longest run of consecutive forbidden days (Yom Tov next to Shabbat).
const MAX_RUN_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WindowError {
    #[error("window offsets (erev {erev}, motzei {motzei}) must not exceed {max} minutes")]
    OffsetsTooLarge { erev: u32, motzei: u32, max: u32 },
    #[error(transparent)]
    Zmanim(#[from] ZmanimError),
}

/// One forbidden period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForbiddenWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl ForbiddenWindow {
    /// Canonical window for the forbidden days `first_day..=last_day`.
    pub fn for_days(
        provider: &dyn TimeProvider,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> Result<Self, ZmanimError> {
        let eve = provider.day_times(first_day - Duration::days(1))?;
        let last = provider.day_times(last_day)?;
        Ok(Self {
            start: eve.sunset,
            end: last.tzais,
            first_day,
            last_day,
        })
    }

    /// Widen by `erev` minutes before and `motzei` minutes after.
    ///
    /// Offsets are unsigned, so the window can only grow and `start < end`
    /// is preserved. Offsets over a day are refused.
    pub fn extended(&self, offsets: WindowOffsets) -> Result<Self, WindowError> {
        check_offsets(offsets)?;
        Ok(Self {
            start: self.start - Duration::minutes(i64::from(offsets.erev)),
            end: self.end + Duration::minutes(i64::from(offsets.motzei)),
            ..*self
        })
    }

    /// Inclusive on both ends.
    pub fn contains(&self, instant: DateTime<Tz>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

fn check_offsets(offsets: WindowOffsets) -> Result<(), WindowError> {
    if offsets.erev > MAXIMUM_WINDOW_OFFSET || offsets.motzei > MAXIMUM_WINDOW_OFFSET {
        return Err(WindowError::OffsetsTooLarge {
            erev: offsets.erev,
            motzei: offsets.motzei,
            max: MAXIMUM_WINDOW_OFFSET,
        });
    }
    Ok(())
}

/// Extended forbidden windows within a few days of `now`, sorted and merged.
///
/// A run of forbidden days that crosses the edge of the scan range is
/// followed past the edge so its window is never truncated.
pub fn windows_near(
    provider: &dyn TimeProvider,
    now: DateTime<Tz>,
    offsets: WindowOffsets,
) -> Result<Vec<ForbiddenWindow>, WindowError> {
    check_offsets(offsets)?;

    let today = now.date_naive();
    let last_scanned = today + Duration::days(WINDOW_SCAN_DAYS);
    let mut date = today - Duration::days(WINDOW_SCAN_DAYS);

    let mut steps = 0;
    while steps < MAX_RUN_DAYS && provider.is_forbidden_day(date - Duration::days(1)) {
        date -= Duration::days(1);
        steps += 1;
    }

    let mut windows = Vec::new();
    while date <= last_scanned {
        if !provider.is_forbidden_day(date) {
            date += Duration::days(1);
            continue;
        }

        let first_day = date;
        let mut last_day = date;
        let mut steps = 0;
        while steps < MAX_RUN_DAYS && provider.is_forbidden_day(last_day + Duration::days(1)) {
            last_day += Duration::days(1);
            steps += 1;
        }

        windows.push(ForbiddenWindow::for_days(provider, first_day, last_day)?.extended(offsets)?);
        date = last_day + Duration::days(2);
    }

    Ok(merge(windows))
}

/// Merge windows that overlap or touch. Input need not be sorted.
pub fn merge(mut windows: Vec<ForbiddenWindow>) -> Vec<ForbiddenWindow> {
    windows.sort_by_key(|window| window.start);

    let mut merged: Vec<ForbiddenWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(current) if window.start <= current.end => {
                if window.end > current.end {
                    current.end = window.end;
                    current.last_day = window.last_day;
                }
            }
            _ => merged.push(window),
        }
    }
    merged
}

/// Is `now` inside any forbidden window.
pub fn is_forbidden_now(now: DateTime<Tz>, windows: &[ForbiddenWindow]) -> bool {
    windows.iter().any(|window| window.contains(now))
}

/// A window starts in `(now, now + interval]`.
pub fn becomes_forbidden_within(
    now: DateTime<Tz>,
    windows: &[ForbiddenWindow],
    interval: Duration,
) -> bool {
    windows
        .iter()
        .any(|window| window.start > now && window.start <= now + interval)
}

/// A window ended in `[now - interval, now)`.
pub fn ended_within(now: DateTime<Tz>, windows: &[ForbiddenWindow], interval: Duration) -> bool {
    windows
        .iter()
        .any(|window| window.end < now && window.end >= now - interval)
}

/// Where `now` sits relative to the forbidden windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPhase {
    Active,
    /// Starts within the next interval.
    Imminent,
    /// Ended within the last interval.
    JustEnded,
    Clear,
}

impl WindowPhase {
    pub fn at(now: DateTime<Tz>, windows: &[ForbiddenWindow], interval: Duration) -> Self {
        if is_forbidden_now(now, windows) {
            WindowPhase::Active
        } else if becomes_forbidden_within(now, windows, interval) {
            WindowPhase::Imminent
        } else if ended_within(now, windows, interval) {
            WindowPhase::JustEnded
        } else {
            WindowPhase::Clear
        }
    }

    /// Devices are reconciled in every phase except `Clear`.
    pub fn requires_reconcile(self) -> bool {
        self != WindowPhase::Clear
    }
}

impl std::fmt::Display for WindowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowPhase::Active => write!(f, "forbidden period in effect"),
            WindowPhase::Imminent => write!(f, "forbidden period about to begin"),
            WindowPhase::JustEnded => write!(f, "forbidden period just ended"),
            WindowPhase::Clear => write!(f, "no forbidden period"),
        }
    }
}

/// The earliest window start or end strictly after `now`.
pub fn next_transition(now: DateTime<Tz>, windows: &[ForbiddenWindow]) -> Option<DateTime<Tz>> {
    windows
        .iter()
        .flat_map(|window| [window.start, window.end])
        .filter(|instant| *instant > now)
        .min()
}

/// The instants between which a device needs light by time alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightBoundaries {
    pub nightfall: DateTime<Tz>,
    pub sunrise: DateTime<Tz>,
}

/// Nightfall and sunrise for one device around `now`.
///
/// Nightfall is today's sunset minus the device's `night` minutes, or, when
/// tomorrow is the first forbidden day, the extended window start (sunset
/// minus `erev`). Sunrise is today's sunrise plus `morning` minutes. Before
/// sunrise nightfall is moved back a day; from sunrise on, sunrise is moved
/// forward a day. Exactly one of the two shifts applies.
pub fn resolve_light_boundaries(
    now: DateTime<Tz>,
    today: &DayTimes,
    offsets: LightOffsets,
    tomorrow_forbidden: bool,
    erev_minutes: u32,
) -> LightBoundaries {
    let nightfall = if tomorrow_forbidden {
        today.sunset - Duration::minutes(i64::from(erev_minutes))
    } else {
        today.sunset - Duration::minutes(i64::from(offsets.night))
    };
    let sunrise = today.sunrise + Duration::minutes(i64::from(offsets.morning));

    if now < sunrise {
        LightBoundaries {
            nightfall: nightfall - Duration::hours(24),
            sunrise,
        }
    } else {
        LightBoundaries {
            nightfall,
            sunrise: sunrise + Duration::hours(24),
        }
    }
}

/// Open interval: the boundary instants themselves need no light.
pub fn needs_light_by_time(now: DateTime<Tz>, boundaries: &LightBoundaries) -> bool {
    boundaries.nightfall < now && now < boundaries.sunrise
}
