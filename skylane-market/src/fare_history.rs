use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use skylane_core::{EngineError, EngineResult};
use skylane_shared::PricePoint;

/// Longest queryable window, one week in hours.
pub const MAX_WINDOW_HOURS: i64 = 168;

const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Per-flight append-only series of priced snapshots, pruned to a rolling
/// window on every append. Owned by whoever constructs it; nothing here is
/// process-global.
pub struct FareHistory {
    retention: Duration,
    series: Mutex<HashMap<String, Vec<PricePoint>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FareHistoryReport {
    pub flight_id: String,
    pub history: Vec<PricePoint>,
    pub analytics: Option<FareAnalytics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FareAnalytics {
    pub price: PriceStats,
    pub demand: DemandStats,
    pub seats_available: SeatStats,
    pub total_changes: usize,
    pub period_hours: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemandStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatStats {
    pub min: i64,
    pub max: i64,
    pub last: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceAlert {
    pub timestamp: DateTime<Utc>,
    pub old_price: f64,
    pub new_price: f64,
    pub percent_change: f64,
    pub demand_level: f64,
    pub seats_available: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceAlertReport {
    pub flight_id: String,
    pub alerts: Vec<PriceAlert>,
    pub threshold_percent: f64,
    pub total_changes: usize,
    pub significant_changes: usize,
}

impl Default for FareHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl FareHistory {
    pub fn new() -> Self {
        Self::with_retention_days(DEFAULT_RETENTION_DAYS)
    }

    pub fn with_retention_days(days: i64) -> Self {
        Self {
            retention: Duration::days(days),
            series: Mutex::new(HashMap::new()),
        }
    }

    fn series(&self) -> MutexGuard<'_, HashMap<String, Vec<PricePoint>>> {
        self.series.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends a point and prunes anything older than the retention window.
    /// O(n) per append; the window bounds n.
    pub fn record(&self, flight_id: &str, point: PricePoint) {
        let cutoff = Utc::now() - self.retention;
        let mut series = self.series();
        let points = series.entry(flight_id.to_string()).or_default();
        points.push(point);
        points.retain(|p| p.timestamp >= cutoff);
    }

    fn window(
        &self,
        flight_id: &str,
        hours: i64,
        include_breakdown: bool,
    ) -> EngineResult<Vec<PricePoint>> {
        if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
            return Err(EngineError::InvalidArgument(format!(
                "hours must be within 1..={MAX_WINDOW_HOURS}"
            )));
        }
        let series = self.series();
        let points = series.get(flight_id).ok_or_else(|| {
            EngineError::NotFound(format!("no fare history for flight {flight_id}"))
        })?;
        let cutoff = Utc::now() - Duration::hours(hours);
        let mut filtered: Vec<PricePoint> = points
            .iter()
            .filter(|p| p.timestamp >= cutoff)
            .cloned()
            .collect();
        if !include_breakdown {
            for point in &mut filtered {
                point.breakdown = None;
            }
        }
        Ok(filtered)
    }

    /// Windowed history with derived analytics; `NotFound` for flights that
    /// have never been priced.
    pub fn history(
        &self,
        flight_id: &str,
        hours: i64,
        include_breakdown: bool,
    ) -> EngineResult<FareHistoryReport> {
        let history = self.window(flight_id, hours, include_breakdown)?;
        let analytics = Self::analytics(&history, hours);
        Ok(FareHistoryReport {
            flight_id: flight_id.to_string(),
            history,
            analytics,
        })
    }

    fn analytics(history: &[PricePoint], period_hours: i64) -> Option<FareAnalytics> {
        if history.is_empty() {
            return None;
        }
        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
        let demands: Vec<f64> = history.iter().map(|p| p.demand_level).collect();
        let seats: Vec<i64> = history.iter().map(|p| p.seats_available).collect();
        Some(FareAnalytics {
            price: PriceStats {
                min: fold_min(&prices),
                max: fold_max(&prices),
                avg: round2(mean(&prices)),
                median: round2(median(&prices)),
            },
            demand: DemandStats {
                min: fold_min(&demands),
                max: fold_max(&demands),
                avg: round3(mean(&demands)),
            },
            seats_available: SeatStats {
                min: seats.iter().copied().min().unwrap_or(0),
                max: seats.iter().copied().max().unwrap_or(0),
                last: *seats.last().unwrap_or(&0),
            },
            total_changes: history.len(),
            period_hours,
        })
    }

    /// Threshold-crossing alerts over the window. The baseline starts at the
    /// first point's price and resets to the current price on every alert,
    /// so each alert measures change since the previous alert rather than
    /// since the window start.
    pub fn alerts(
        &self,
        flight_id: &str,
        threshold_percent: f64,
        hours: i64,
    ) -> EngineResult<PriceAlertReport> {
        if threshold_percent <= 0.0 {
            return Err(EngineError::InvalidArgument(
                "threshold_percent must be > 0".to_string(),
            ));
        }
        let history = self.window(flight_id, hours, false)?;

        let mut alerts = Vec::new();
        if let Some((first, rest)) = history.split_first() {
            let mut baseline = first.price;
            for point in rest {
                let pct_change = (point.price - baseline) / baseline * 100.0;
                if pct_change.abs() >= threshold_percent {
                    alerts.push(PriceAlert {
                        timestamp: point.timestamp,
                        old_price: baseline,
                        new_price: point.price,
                        percent_change: round2(pct_change),
                        demand_level: point.demand_level,
                        seats_available: point.seats_available,
                    });
                    baseline = point.price;
                }
            }
        }

        Ok(PriceAlertReport {
            flight_id: flight_id.to_string(),
            significant_changes: alerts.len(),
            total_changes: history.len().saturating_sub(1),
            alerts,
            threshold_percent,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn fold_min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn fold_max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use skylane_shared::PriceBreakdown;

    fn point_at(hours_ago: i64, price: f64, seats: i64) -> PricePoint {
        PricePoint {
            timestamp: Utc::now() - Duration::hours(hours_ago),
            price,
            base_price: 100.0,
            demand_level: 0.5,
            seats_available: seats,
            breakdown: Some(sample_breakdown()),
        }
    }

    fn sample_breakdown() -> PriceBreakdown {
        PriceBreakdown {
            base_price: 100.0,
            seats_available: 50,
            total_seats: 100,
            seats_remaining_pct: 50.0,
            tier_multiplier: 1.2,
            time_multiplier: 1.0,
            demand_multiplier: 1.25,
            combined_multiplier: 1.5,
            raw_price: 150.0,
            min_price: 80.0,
            max_price: 300.0,
        }
    }

    #[test]
    fn test_history_unknown_flight_not_found() {
        let history = FareHistory::new();
        assert!(matches!(
            history.history("SL-404", 24, false),
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            history.alerts("SL-404", 10.0, 24),
            Err(EngineError::NotFound(_))
        ));
    }

    #[test]
    fn test_window_bounds_validated() {
        let history = FareHistory::new();
        history.record("SL-1", point_at(0, 100.0, 50));
        assert!(matches!(
            history.history("SL-1", 0, false),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            history.history("SL-1", 169, false),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            history.alerts("SL-1", 0.0, 24),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_append_prunes_beyond_retention() {
        let history = FareHistory::new();
        history.record("SL-1", point_at(8 * 24, 90.0, 50));
        history.record("SL-1", point_at(1, 110.0, 48));

        let report = history.history("SL-1", MAX_WINDOW_HOURS, false).unwrap();
        assert_eq!(report.history.len(), 1);
        assert_eq!(report.history[0].price, 110.0);
    }

    #[test]
    fn test_window_filters_and_strips_breakdown() {
        let history = FareHistory::new();
        history.record("SL-1", point_at(30, 90.0, 50));
        history.record("SL-1", point_at(1, 110.0, 48));

        let report = history.history("SL-1", 24, false).unwrap();
        assert_eq!(report.history.len(), 1);
        assert!(report.history[0].breakdown.is_none());

        let detailed = history.history("SL-1", 24, true).unwrap();
        assert!(detailed.history[0].breakdown.is_some());

        // Wider window still sees both points.
        let wide = history.history("SL-1", 48, false).unwrap();
        assert_eq!(wide.history.len(), 2);
    }

    #[test]
    fn test_analytics_summary() {
        let history = FareHistory::new();
        history.record("SL-1", point_at(3, 100.0, 50));
        history.record("SL-1", point_at(2, 300.0, 45));
        history.record("SL-1", point_at(1, 200.0, 47));

        let analytics = history.history("SL-1", 24, false).unwrap().analytics.unwrap();
        assert_eq!(analytics.price.min, 100.0);
        assert_eq!(analytics.price.max, 300.0);
        assert_eq!(analytics.price.avg, 200.0);
        assert_eq!(analytics.price.median, 200.0);
        assert_eq!(analytics.seats_available.min, 45);
        assert_eq!(analytics.seats_available.max, 50);
        assert_eq!(analytics.seats_available.last, 47);
        assert_eq!(analytics.total_changes, 3);
        assert_eq!(analytics.period_hours, 24);
    }

    #[test]
    fn test_empty_window_has_no_analytics() {
        let history = FareHistory::new();
        history.record("SL-1", point_at(30, 90.0, 50));

        let report = history.history("SL-1", 12, false).unwrap();
        assert!(report.history.is_empty());
        assert!(report.analytics.is_none());

        let alerts = history.alerts("SL-1", 10.0, 12).unwrap();
        assert!(alerts.alerts.is_empty());
        assert_eq!(alerts.total_changes, 0);
    }

    #[test]
    fn test_alert_baseline_ratchets_on_each_alert() {
        let history = FareHistory::new();
        // 100 -> 109 (9%, quiet) -> 112 (12% vs 100, alert, baseline 112)
        // -> 118 (5.4% vs 112, quiet) -> 95 (-15.2% vs 112, alert).
        for (hours_ago, price) in [(5, 100.0), (4, 109.0), (3, 112.0), (2, 118.0), (1, 95.0)] {
            history.record("SL-1", point_at(hours_ago, price, 50));
        }

        let report = history.alerts("SL-1", 10.0, 24).unwrap();
        assert_eq!(report.significant_changes, 2);
        assert_eq!(report.total_changes, 4);

        assert_eq!(report.alerts[0].old_price, 100.0);
        assert_eq!(report.alerts[0].new_price, 112.0);
        assert_eq!(report.alerts[0].percent_change, 12.0);

        assert_eq!(report.alerts[1].old_price, 112.0);
        assert_eq!(report.alerts[1].new_price, 95.0);
        assert!(report.alerts[1].percent_change < -10.0);
    }
}
