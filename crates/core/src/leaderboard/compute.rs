//! Pure calculations behind the leaderboard payloads.

use chrono::{DateTime, Datelike, DurationRound, Months, NaiveDate, TimeDelta, Utc};
use leaderboard_market_data::{DailyClose, PriceBar};
use rust_decimal::Decimal;
use std::cmp::Ordering;

use super::model::PerformanceRecord;
use crate::calendar::MarketCalendar;
use crate::constants::PERCENT_PRECISION;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Percent change from `base` to `value`.
///
/// `None` when either side is missing or `base` is not positive.
pub fn percent_change(base: Option<Decimal>, value: Option<Decimal>) -> Option<Decimal> {
    let base = base.filter(|b| *b > Decimal::ZERO)?;
    let value = value?;
    let change = (value - base).checked_div(base)? * Decimal::ONE_HUNDRED;
    Some(change.round_dp(PERCENT_PRECISION))
}

/// 1-day change: against the previous close, or the baseline when the
/// previous close is unknown.
pub fn one_day_change(
    price: Option<Decimal>,
    previous_close: Option<Decimal>,
    baseline: Option<Decimal>,
) -> Option<Decimal> {
    let reference = previous_close
        .filter(|p| *p > Decimal::ZERO)
        .or(baseline);
    percent_change(reference, price)
}

/// Close of the latest bar on or before `date`.
pub fn close_on_or_before(closes: &[DailyClose], date: NaiveDate) -> Option<Decimal> {
    closes
        .iter()
        .filter(|c| c.date <= date)
        .max_by_key(|c| c.date)
        .map(|c| c.close)
}

/// `today` minus `months` calendar months, clamped to month end.
pub fn lookback_date(today: NaiveDate, months: u32) -> Option<NaiveDate> {
    today.checked_sub_months(Months::new(months))
}

/// Year-to-date descending, records without a YTD value last.
pub fn sort_by_ytd(records: &mut [PerformanceRecord]) {
    records.sort_by(|a, b| match (a.change_percent, b.change_percent) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Chart x-axis labels: every month of the year before `today`'s, then
/// `"<Mon> <day>"` for the current month.
pub fn month_labels(today: NaiveDate) -> Vec<String> {
    let current = today.month0() as usize;
    let mut labels: Vec<String> = MONTH_NAMES[..current]
        .iter()
        .map(|m| m.to_string())
        .collect();
    labels.push(format!("{} {}", MONTH_NAMES[current], today.day()));
    labels
}

/// Chart points for one symbol from hourly bars.
///
/// Bars on non-trading days or before `since` are dropped. Each bar gives
/// its open at the start of its hour and its close at the bar time, both as
/// percent change from `baseline`. Output is sorted by timestamp.
pub fn series_points(
    bars: &[PriceBar],
    baseline: Decimal,
    since: DateTime<Utc>,
    calendar: &MarketCalendar,
) -> (Vec<Decimal>, Vec<i64>) {
    let mut points: Vec<(i64, Decimal)> = Vec::with_capacity(bars.len() * 2);

    for bar in bars {
        if bar.timestamp < since || !calendar.is_trading_day(calendar.local_date(bar.timestamp)) {
            continue;
        }

        let hour_start = bar
            .timestamp
            .duration_trunc(TimeDelta::hours(1))
            .unwrap_or(bar.timestamp);
        if hour_start >= since {
            if let Some(open) = percent_change(Some(baseline), bar.open) {
                points.push((hour_start.timestamp_millis(), open));
            }
        }
        if let Some(close) = percent_change(Some(baseline), Some(bar.close)) {
            points.push((bar.timestamp.timestamp_millis(), close));
        }
    }

    points.sort_by_key(|(ts, _)| *ts);
    points.into_iter().map(|(ts, v)| (v, ts)).unzip()
}
