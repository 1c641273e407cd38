use std::cmp::Ordering;

use serde::Serialize;
use time::{Date, Duration};

/// Energy content of one pound of body mass, in kcal.
pub const CALORIES_PER_POUND: f64 = 3500.0;

/// Maintenance estimates below this are treated as noise and dropped.
pub const MIN_PLAUSIBLE_MAINTENANCE: f64 = 800.0;

const SHORT_WINDOW_DAYS: i64 = 7;
const LONG_WINDOW_DAYS: i64 = 14;

/// The slice of a daily entry the engine actually reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayLog {
    pub date: Date,
    pub calories: i32,
    pub weight: Option<f64>,
}

impl DayLog {
    /// Total order: by date, then by the logged values, so duplicate dates
    /// sort the same way whatever order they arrived in.
    fn chronological(a: &Self, b: &Self) -> Ordering {
        a.date
            .cmp(&b.date)
            .then(a.calories.cmp(&b.calories))
            .then_with(|| match (a.weight, b.weight) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (x, y) => x.is_some().cmp(&y.is_some()),
            })
    }
}

/// Derived dashboard statistics. Every field is independently optional;
/// `None` means there was not enough data, and serializes as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatedMetrics {
    pub maintenance_calories: Option<i64>,
    pub daily_deficit: Option<i64>,
    pub weekly_deficit: Option<i64>,
    pub rolling_avg_calories_7_day: Option<i64>,
    pub rolling_avg_calories_14_day: Option<i64>,
    pub rolling_avg_deficit_7_day: Option<i64>,
    pub rolling_avg_weight_7_day: Option<f64>,
    pub weight_change_7_day: Option<f64>,
}

/// Long-run energy balance over the span covered by weight data.
#[derive(Debug, Clone, Copy)]
struct EnergyBalance {
    daily_deficit: f64,
    maintenance: Option<f64>,
}

/// Derives the metrics record from a user's full entry history.
///
/// Windows are anchored at the most recent entry's date rather than the wall
/// clock, so a fixed history always yields the same result.
pub fn compute(entries: &[DayLog]) -> CalculatedMetrics {
    let mut sorted = entries.to_vec();
    sorted.sort_by(DayLog::chronological);

    let Some(most_recent) = sorted.last().map(|e| e.date) else {
        return CalculatedMetrics::default();
    };

    let last_7 = trailing_window(&sorted, most_recent, SHORT_WINDOW_DAYS);
    let last_14 = trailing_window(&sorted, most_recent, LONG_WINDOW_DAYS);

    let (rolling_avg_weight_7_day, weight_change_7_day) = short_term_weight(last_7);
    let balance = energy_balance(&sorted);
    let daily_deficit = balance.map(|b| b.daily_deficit);

    CalculatedMetrics {
        maintenance_calories: balance.and_then(|b| b.maintenance).map(round_kcal),
        daily_deficit: daily_deficit.map(round_kcal),
        weekly_deficit: daily_deficit.map(|d| round_kcal(d * 7.0)),
        rolling_avg_calories_7_day: mean_calories(last_7).map(round_kcal),
        rolling_avg_calories_14_day: mean_calories(last_14).map(round_kcal),
        rolling_avg_deficit_7_day: daily_deficit.map(round_kcal),
        rolling_avg_weight_7_day,
        weight_change_7_day,
    }
}

/// Entries dated on or after `anchor - days`. `sorted` must be chronological.
fn trailing_window(sorted: &[DayLog], anchor: Date, days: i64) -> &[DayLog] {
    let cutoff = anchor
        .checked_sub(Duration::days(days))
        .unwrap_or(Date::MIN);
    let start = sorted.partition_point(|e| e.date < cutoff);
    &sorted[start..]
}

fn weighed(entries: &[DayLog]) -> impl Iterator<Item = (Date, f64)> + '_ {
    entries.iter().filter_map(|e| e.weight.map(|w| (e.date, w)))
}

fn mean_calories(entries: &[DayLog]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }
    let total: i64 = entries.iter().map(|e| i64::from(e.calories)).sum();
    Some(total as f64 / entries.len() as f64)
}

/// Average weight and first-to-last change inside the short window.
fn short_term_weight(window: &[DayLog]) -> (Option<f64>, Option<f64>) {
    let weights: Vec<f64> = weighed(window).map(|(_, w)| w).collect();
    match (weights.first(), weights.last()) {
        (Some(first), Some(last)) if weights.len() >= 2 => {
            let avg = weights.iter().sum::<f64>() / weights.len() as f64;
            (Some(avg), Some(last - first))
        }
        _ => (None, None),
    }
}

fn energy_balance(sorted: &[DayLog]) -> Option<EnergyBalance> {
    let mut weights = weighed(sorted);
    let (first_date, first_weight) = weights.next()?;
    let (last_date, last_weight) = weights.last()?;

    let total_change = last_weight - first_weight;
    // Both ends on one date would otherwise divide by zero.
    let total_days = (last_date - first_date).whole_days().max(1);
    let daily_deficit = total_change * CALORIES_PER_POUND / total_days as f64;

    let lo = sorted.partition_point(|e| e.date < first_date);
    let hi = sorted.partition_point(|e| e.date <= last_date);
    let maintenance = mean_calories(&sorted[lo..hi])
        .map(|avg| avg - daily_deficit)
        .filter(|m| *m >= MIN_PLAUSIBLE_MAINTENANCE);

    Some(EnergyBalance {
        daily_deficit,
        maintenance,
    })
}

/// Nearest integer, halves toward positive infinity.
pub(crate) fn round_kcal(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
