//! Yom Tov dates from the fixed Hebrew calendar.
//!
//! Only the festivals on which work is forbidden are computed. All of them
//! sit at fixed offsets from Rosh Hashanah (autumn) or from Pesach, which
//! is always 163 days before the following Rosh Hashanah, so one new-year
//! calculation per Gregorian year is enough.

use chrono::{Datelike, Duration, NaiveDate};

/// Offset between a Gregorian year and the Hebrew year that begins in its
/// autumn.
const HEBREW_YEAR_OFFSET: i32 = 3761;

/// Rata Die of the day before 1 Tishrei AM 1, minus the molad adjustment.
const HEBREW_EPOCH_RD: i64 = -1_373_427;

/// Days from 15 Nisan to the next 1 Tishrei.
const PESACH_TO_ROSH_HASHANAH: i64 = 163;

/// A forbidden-work festival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YomTov {
    RoshHashanah,
    YomKippur,
    Sukkot,
    SheminiAtzeret,
    SimchatTorah,
    Pesach,
    Shavuot,
}

impl std::fmt::Display for YomTov {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            YomTov::RoshHashanah => "Rosh Hashanah",
            YomTov::YomKippur => "Yom Kippur",
            YomTov::Sukkot => "Sukkot",
            YomTov::SheminiAtzeret => "Shemini Atzeret",
            YomTov::SimchatTorah => "Simchat Torah",
            YomTov::Pesach => "Pesach",
            YomTov::Shavuot => "Shavuot",
        };
        write!(f, "{name}")
    }
}

/// Days from the epoch to the molad of Tishrei, with the first postponement
/// rules applied.
fn elapsed_days(year: i64) -> i64 {
    let months = (235 * year - 234).div_euclid(19);
    let parts = 12_084 + 13_753 * months;
    let day = 29 * months + parts.div_euclid(25_920);
    if (3 * (day + 1)).rem_euclid(7) < 3 {
        day + 1
    } else {
        day
    }
}

/// Remaining postponements that keep year lengths legal.
fn year_length_correction(year: i64) -> i64 {
    let previous = elapsed_days(year - 1);
    let current = elapsed_days(year);
    let next = elapsed_days(year + 1);

    if next - current == 356 {
        2
    } else if current - previous == 382 {
        1
    } else {
        0
    }
}

/// 1 Tishrei of the given Hebrew year.
pub fn rosh_hashanah(hebrew_year: i32) -> Option<NaiveDate> {
    let year = i64::from(hebrew_year);
    let rata_die = HEBREW_EPOCH_RD + elapsed_days(year) + year_length_correction(year);
    NaiveDate::from_num_days_from_ce_opt(i32::try_from(rata_die).ok()?)
}

/// Every Yom Tov day falling in the given Gregorian year.
pub fn yom_tov_days(gregorian_year: i32, in_israel: bool) -> Vec<(NaiveDate, YomTov)> {
    let Some(new_year) = rosh_hashanah(gregorian_year + HEBREW_YEAR_OFFSET) else {
        return Vec::new();
    };
    let pesach = new_year - Duration::days(PESACH_TO_ROSH_HASHANAH);

    let mut days = vec![
        (pesach, YomTov::Pesach),
        (pesach + Duration::days(6), YomTov::Pesach),
        (pesach + Duration::days(50), YomTov::Shavuot),
        (new_year, YomTov::RoshHashanah),
        (new_year + Duration::days(1), YomTov::RoshHashanah),
        (new_year + Duration::days(9), YomTov::YomKippur),
        (new_year + Duration::days(14), YomTov::Sukkot),
        (new_year + Duration::days(21), YomTov::SheminiAtzeret),
    ];

    if !in_israel {
        days.extend([
            (pesach + Duration::days(1), YomTov::Pesach),
            (pesach + Duration::days(7), YomTov::Pesach),
            (pesach + Duration::days(51), YomTov::Shavuot),
            (new_year + Duration::days(15), YomTov::Sukkot),
            (new_year + Duration::days(22), YomTov::SimchatTorah),
        ]);
    }

    days.sort_by_key(|(date, _)| *date);
    days
}

/// The festival observed on `date`, if any.
pub fn yom_tov_on(date: NaiveDate, in_israel: bool) -> Option<YomTov> {
    yom_tov_days(date.year(), in_israel)
        .into_iter()
        .find(|(day, _)| *day == date)
        .map(|(_, festival)| festival)
}

pub fn is_yom_tov(date: NaiveDate, in_israel: bool) -> bool {
    yom_tov_on(date, in_israel).is_some()
}
