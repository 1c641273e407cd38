use serde::Serialize;
use time::{Date, Duration};

use super::engine::{CalculatedMetrics, DayLog, CALORIES_PER_POUND};

pub const DEFAULT_PROJECTION_DAYS: u32 = 30;
pub const MAX_PROJECTION_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedPoint {
    pub date: Date,
    pub days_ahead: u32,
    pub weight: f64,
}

/// Straight-line weight forecast from the latest weigh-in.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub anchor_date: Option<Date>,
    pub anchor_weight: Option<f64>,
    pub daily_deficit: Option<i64>,
    pub points: Vec<ProjectedPoint>,
}

impl Projection {
    /// Builds the forecast for the next `days` days. Empty when there is no
    /// weigh-in or no deficit estimate to extrapolate from.
    pub fn from_history(entries: &[DayLog], metrics: &CalculatedMetrics, days: u32) -> Self {
        let latest = entries
            .iter()
            .filter_map(|e| e.weight.map(|w| (e.date, w)))
            .max_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

        match (latest, metrics.daily_deficit) {
            (Some((anchor_date, anchor_weight)), Some(deficit)) => Self {
                anchor_date: Some(anchor_date),
                anchor_weight: Some(anchor_weight),
                daily_deficit: Some(deficit),
                points: project(anchor_date, anchor_weight, deficit as f64, days),
            },
            _ => Self::default(),
        }
    }
}

/// `weight + (deficit / 3500) * d` for `d` in `1..=days`. Stops early if the
/// calendar runs out.
pub fn project(anchor: Date, weight: f64, daily_deficit: f64, days: u32) -> Vec<ProjectedPoint> {
    let per_day = daily_deficit / CALORIES_PER_POUND;
    (1..=days)
        .map_while(|d| {
            let date = anchor.checked_add(Duration::days(i64::from(d)))?;
            Some(ProjectedPoint {
                date,
                days_ahead: d,
                weight: weight + per_day * f64::from(d),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::engine::compute;
    use time::macros::date;

    #[test]
    fn slope_follows_calories_per_pound() {
        let points = project(date!(2024 - 01 - 14), 178.0, -500.0, 14);
        assert_eq!(points.len(), 14);
        assert_eq!(points[0].date, date!(2024 - 01 - 15));
        assert_eq!(points[0].days_ahead, 1);
        assert!((points[6].weight - 177.0).abs() < 1e-9);
        assert!((points[13].weight - 176.0).abs() < 1e-9);
    }

    #[test]
    fn surplus_projects_upward() {
        let points = project(date!(2024 - 06 - 01), 150.0, 250.0, 28);
        assert!((points.last().unwrap().weight - 152.0).abs() < 1e-9);
    }

    #[test]
    fn zero_days_yields_no_points() {
        assert!(project(date!(2024 - 06 - 01), 150.0, -250.0, 0).is_empty());
    }

    #[test]
    fn anchors_on_latest_weigh_in() {
        let entries = vec![
            DayLog {
                date: date!(2024 - 01 - 01),
                calories: 2000,
                weight: Some(180.0),
            },
            DayLog {
                date: date!(2024 - 01 - 08),
                calories: 2000,
                weight: Some(179.0),
            },
            DayLog {
                date: date!(2024 - 01 - 10),
                calories: 2100,
                weight: None,
            },
        ];
        let metrics = compute(&entries);
        let p = Projection::from_history(&entries, &metrics, 7);
        assert_eq!(p.anchor_date, Some(date!(2024 - 01 - 08)));
        assert_eq!(p.anchor_weight, Some(179.0));
        assert_eq!(p.daily_deficit, Some(-500));
        assert_eq!(p.points.len(), 7);
        assert!((p.points[6].weight - 178.0).abs() < 1e-9);
    }

    #[test]
    fn no_deficit_means_empty_projection() {
        let entries = vec![DayLog {
            date: date!(2024 - 01 - 01),
            calories: 2000,
            weight: Some(180.0),
        }];
        let metrics = compute(&entries);
        let p = Projection::from_history(&entries, &metrics, 30);
        assert_eq!(p, Projection::default());

        let json = serde_json::to_value(&p).unwrap();
        assert!(json["anchorDate"].is_null());
        assert_eq!(json["points"], serde_json::json!([]));
    }
}
