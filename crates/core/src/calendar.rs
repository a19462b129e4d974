//! US equities market calendar.
//!
//! Regular session is 09:30-16:00 America/New_York, Monday to Friday, minus
//! the exchange holidays listed in a [`HolidayTable`]. The table is a fixed
//! per-year list: years it does not cover have no holidays, so every weekday
//! of such a year counts as a trading day.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use log::warn;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::errors::{Error, Result};

/// Exchange timezone for US equities.
pub const EXCHANGE_TZ: Tz = chrono_tz::America::New_York;

const OPEN_MINUTE: u32 = 9 * 60 + 30;
const CLOSE_MINUTE: u32 = 16 * 60;

const NYSE_2025: [(u32, u32); 11] = [
    (1, 1),
    (1, 9),
    (1, 20),
    (2, 17),
    (4, 18),
    (5, 26),
    (6, 19),
    (7, 4),
    (9, 1),
    (11, 27),
    (12, 25),
];

const NYSE_2026: [(u32, u32); 10] = [
    (1, 1),
    (1, 19),
    (2, 16),
    (4, 3),
    (5, 25),
    (6, 19),
    (7, 3),
    (9, 7),
    (11, 26),
    (12, 25),
];

/// Full-day market closures, grouped by the years the table vouches for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayTable {
    years: BTreeMap<i32, BTreeSet<NaiveDate>>,
}

impl HolidayTable {
    /// Table with no covered years.
    pub fn empty() -> Self {
        Self::default()
    }

    /// NYSE full-day closures for 2025 and 2026.
    pub fn nyse() -> Self {
        let mut table = Self::empty();
        table.insert_year(2025, Self::dates(2025, &NYSE_2025));
        table.insert_year(2026, Self::dates(2026, &NYSE_2026));
        table
    }

    fn dates(year: i32, days: &[(u32, u32)]) -> Vec<NaiveDate> {
        days.iter()
            .filter_map(|&(month, day)| NaiveDate::from_ymd_opt(year, month, day))
            .collect()
    }

    /// Replace the holiday list of `year` and mark the year as covered.
    ///
    /// Dates outside `year` are ignored.
    pub fn insert_year(&mut self, year: i32, dates: impl IntoIterator<Item = NaiveDate>) {
        let set = dates.into_iter().filter(|d| d.year() == year).collect();
        self.years.insert(year, set);
    }

    /// Load a table from JSON shaped like `{ "2027": ["2027-01-01", ...] }`.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: HashMap<String, Vec<NaiveDate>> = serde_json::from_str(raw)?;
        let mut table = Self::empty();
        for (year, dates) in parsed {
            let year: i32 = year.trim().parse().map_err(|_| {
                Error::InvalidConfigValue(format!("holiday table year '{}'", year))
            })?;
            table.insert_year(year, dates);
        }
        Ok(table)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigIO(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// True when the table lists holidays for `year`.
    pub fn covers(&self, year: i32) -> bool {
        self.years.contains_key(&year)
    }

    pub fn covered_years(&self) -> Vec<i32> {
        self.years.keys().copied().collect()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.years
            .get(&date.year())
            .is_some_and(|dates| dates.contains(&date))
    }
}

/// Trading calendar for one exchange.
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    tz: Tz,
    holidays: HolidayTable,
}

impl Default for MarketCalendar {
    fn default() -> Self {
        Self::us_equities()
    }
}

impl MarketCalendar {
    pub fn new(holidays: HolidayTable) -> Self {
        Self {
            tz: EXCHANGE_TZ,
            holidays,
        }
    }

    /// New York session with the built-in NYSE holiday table.
    pub fn us_equities() -> Self {
        Self::new(HolidayTable::nyse())
    }

    pub fn holidays(&self) -> &HolidayTable {
        &self.holidays
    }

    /// Exchange-local calendar date of `instant`.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Weekday that is not a listed holiday.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.is_holiday(date)
    }

    /// True when `instant` falls inside the regular session.
    pub fn is_market_open(&self, instant: DateTime<Utc>) -> bool {
        let local = instant.with_timezone(&self.tz);
        if !self.is_trading_day(local.date_naive()) {
            return false;
        }
        let minute = local.hour() * 60 + local.minute();
        (OPEN_MINUTE..CLOSE_MINUTE).contains(&minute)
    }

    /// Most recent trading day on or before `date` within the same month.
    pub fn last_trading_day_in_month(&self, date: NaiveDate) -> Option<NaiveDate> {
        let mut current = date;
        loop {
            if self.is_trading_day(current) {
                return Some(current);
            }
            let previous = current.pred_opt()?;
            if previous.month() != date.month() {
                return None;
            }
            current = previous;
        }
    }

    /// First trading day of `year`.
    pub fn first_trading_day_of_year(&self, year: i32) -> Option<NaiveDate> {
        let mut current = NaiveDate::from_ymd_opt(year, 1, 1)?;
        while current.year() == year {
            if self.is_trading_day(current) {
                return Some(current);
            }
            current = current.succ_opt()?;
        }
        None
    }

    /// Log a warning when `year` is outside the holiday table.
    pub fn warn_if_uncovered(&self, year: i32) {
        if !self.holidays.covers(year) {
            warn!(
                "Holiday table covers {:?} but not {}; every weekday of {} is treated as a trading day",
                self.holidays.covered_years(),
                year,
                year
            );
        }
    }
}
