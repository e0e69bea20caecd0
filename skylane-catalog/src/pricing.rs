use chrono::{NaiveDate, Utc};
use skylane_core::{EngineError, EngineResult};
use skylane_shared::{PriceBreakdown, DEFAULT_TOTAL_SEATS};

/// Hard band on the final price relative to base.
const MIN_PRICE_FACTOR: f64 = 0.8;
const MAX_PRICE_FACTOR: f64 = 3.0;

/// Scarcity tiers: remaining-capacity percentage threshold -> multiplier,
/// kept sorted ascending. The smallest threshold at or above the remaining
/// percentage wins, so the multiplier grows as capacity shrinks.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTiers(Vec<(i64, f64)>);

impl Default for PricingTiers {
    fn default() -> Self {
        Self(vec![(10, 2.0), (20, 1.5), (50, 1.2), (100, 1.0)])
    }
}

impl PricingTiers {
    /// Parses a caller-supplied tier override, e.g. `{"25": 1.8, "100": 1.0}`.
    /// Anything malformed (non-object, unparseable threshold, non-positive
    /// multiplier, empty table) falls back to the default table.
    pub fn parse(raw: &serde_json::Value) -> Self {
        let Some(map) = raw.as_object() else {
            return Self::default();
        };
        if map.is_empty() {
            return Self::default();
        }
        let mut tiers = Vec::with_capacity(map.len());
        for (key, value) in map {
            let Ok(threshold) = key.parse::<i64>() else {
                return Self::default();
            };
            let Some(multiplier) = value.as_f64() else {
                return Self::default();
            };
            if threshold <= 0 || multiplier <= 0.0 {
                return Self::default();
            }
            tiers.push((threshold, multiplier));
        }
        tiers.sort_by_key(|(threshold, _)| *threshold);
        Self(tiers)
    }

    /// First tier whose threshold is at or above the remaining percentage;
    /// 1.0 when no tier matches.
    pub fn multiplier_for(&self, seats_remaining_pct: f64) -> f64 {
        for (threshold, multiplier) in &self.0 {
            if seats_remaining_pct <= *threshold as f64 {
                return *multiplier;
            }
        }
        1.0
    }
}

#[derive(Debug, Clone)]
pub struct PriceRequest<'a> {
    pub base_price: f64,
    pub seats_available: i64,
    pub total_seats: Option<i64>,
    pub travel_date: Option<&'a str>,
    pub demand_level: f64,
    pub tiers: Option<&'a PricingTiers>,
}

#[derive(Debug, Clone)]
pub struct PriceQuote {
    pub final_price: f64,
    /// The demand level actually used, after clamping to [0, 1].
    pub demand_level: f64,
    pub breakdown: PriceBreakdown,
}

/// Computes the dynamic price anchored to the current UTC date.
pub fn quote(request: &PriceRequest<'_>) -> EngineResult<PriceQuote> {
    quote_at(request, Utc::now().date_naive())
}

/// Pure computation: identical inputs yield identical outputs. The `today`
/// anchor for the time multiplier is explicit so callers and tests control it.
pub fn quote_at(request: &PriceRequest<'_>, today: NaiveDate) -> EngineResult<PriceQuote> {
    if request.base_price <= 0.0 {
        return Err(EngineError::InvalidArgument(
            "base_price must be > 0".to_string(),
        ));
    }
    if request.seats_available < 0 {
        return Err(EngineError::InvalidArgument(
            "seats_available must be >= 0".to_string(),
        ));
    }
    let total_seats = request.total_seats.unwrap_or(DEFAULT_TOTAL_SEATS);
    if total_seats <= 0 {
        return Err(EngineError::InvalidArgument(
            "total_seats must be > 0".to_string(),
        ));
    }
    let seats_available = request.seats_available.min(total_seats);
    let demand_level = request.demand_level.clamp(0.0, 1.0);

    let seats_remaining_pct = seats_available as f64 / total_seats as f64 * 100.0;

    let default_tiers = PricingTiers::default();
    let tiers = request.tiers.unwrap_or(&default_tiers);
    let tier_multiplier = tiers.multiplier_for(seats_remaining_pct);

    let time_multiplier = match request.travel_date {
        None => 1.0,
        Some(raw) => {
            let departure = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                EngineError::InvalidArgument(format!("unparseable travel date: {raw}"))
            })?;
            let days_until = (departure - today).num_days();
            if days_until > 30 {
                0.95
            } else if days_until > 7 {
                1.0
            } else if days_until >= 2 {
                1.2
            } else {
                1.5
            }
        }
    };

    let demand_multiplier = 1.0 + 0.5 * demand_level;
    let combined_multiplier = tier_multiplier * time_multiplier * demand_multiplier;

    let min_price = request.base_price * MIN_PRICE_FACTOR;
    let max_price = request.base_price * MAX_PRICE_FACTOR;
    let raw_price = request.base_price * combined_multiplier;
    let final_price = round2(raw_price.clamp(min_price, max_price));

    Ok(PriceQuote {
        final_price,
        demand_level,
        breakdown: PriceBreakdown {
            base_price: request.base_price,
            seats_available,
            total_seats,
            seats_remaining_pct: round2(seats_remaining_pct),
            tier_multiplier,
            time_multiplier,
            demand_multiplier: round3(demand_multiplier),
            combined_multiplier: round3(combined_multiplier),
            raw_price: round2(raw_price),
            min_price: round2(min_price),
            max_price: round2(max_price),
        },
    })
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
    use chrono::Duration;

    fn request(base_price: f64, seats_available: i64) -> PriceRequest<'static> {
        PriceRequest {
            base_price,
            seats_available,
            total_seats: None,
            travel_date: None,
            demand_level: 0.0,
            tiers: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn test_tier_scan_ascending_first_match() {
        let tiers = PricingTiers::default();
        assert_eq!(tiers.multiplier_for(5.0), 2.0);
        assert_eq!(tiers.multiplier_for(10.0), 2.0);
        assert_eq!(tiers.multiplier_for(15.0), 1.5);
        assert_eq!(tiers.multiplier_for(35.0), 1.2);
        assert_eq!(tiers.multiplier_for(80.0), 1.0);
        assert_eq!(tiers.multiplier_for(100.0), 1.0);
    }

    #[test]
    fn test_malformed_tier_override_falls_back_to_default() {
        assert_eq!(
            PricingTiers::parse(&serde_json::json!({"abc": 2.0})),
            PricingTiers::default()
        );
        assert_eq!(
            PricingTiers::parse(&serde_json::json!({"10": -1.0})),
            PricingTiers::default()
        );
        assert_eq!(
            PricingTiers::parse(&serde_json::json!({})),
            PricingTiers::default()
        );
        assert_eq!(
            PricingTiers::parse(&serde_json::json!([1, 2])),
            PricingTiers::default()
        );

        let custom = PricingTiers::parse(&serde_json::json!({"25": 1.8, "100": 1.0}));
        assert_eq!(custom.multiplier_for(20.0), 1.8);
        assert_eq!(custom.multiplier_for(60.0), 1.0);
    }

    #[test]
    fn test_time_multiplier_bands() {
        let anchor = today();
        for (days, expected) in [(40i64, 0.95), (15, 1.0), (5, 1.2), (1, 1.5), (0, 1.5)] {
            let date = (anchor + Duration::days(days)).format("%Y-%m-%d").to_string();
            let mut req = request(100.0, 80);
            req.travel_date = Some(&date);
            let quote = quote_at(&req, anchor).unwrap();
            assert_eq!(quote.breakdown.time_multiplier, expected, "{days} days out");
        }
        // No date supplied: neutral multiplier.
        let quote = quote_at(&request(100.0, 80), anchor).unwrap();
        assert_eq!(quote.breakdown.time_multiplier, 1.0);
    }

    #[test]
    fn test_unparseable_travel_date_fails_fast() {
        let mut req = request(100.0, 80);
        req.travel_date = Some("next tuesday");
        assert!(matches!(
            quote_at(&req, today()),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(matches!(
            quote_at(&request(0.0, 10), today()),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            quote_at(&request(100.0, -1), today()),
            Err(EngineError::InvalidArgument(_))
        ));
        let mut req = request(100.0, 10);
        req.total_seats = Some(0);
        assert!(matches!(
            quote_at(&req, today()),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_seats_clamped_to_total() {
        let mut req = request(100.0, 150);
        req.total_seats = Some(100);
        let quote = quote_at(&req, today()).unwrap();
        assert_eq!(quote.breakdown.seats_available, 100);
        assert_eq!(quote.breakdown.seats_remaining_pct, 100.0);
    }

    #[test]
    fn test_demand_monotonicity() {
        let mut last = 0.0;
        for demand in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let mut req = request(100.0, 80);
            req.demand_level = demand;
            let price = quote_at(&req, today()).unwrap().final_price;
            assert!(price >= last, "demand {demand} lowered the price");
            last = price;
        }
    }

    #[test]
    fn test_scarcity_raises_price() {
        let mut last = 0.0;
        for seats in [90i64, 45, 15, 5] {
            let price = quote_at(&request(100.0, seats), today()).unwrap().final_price;
            assert!(price >= last, "{seats} seats left lowered the price");
            last = price;
        }
    }

    #[test]
    fn test_demand_clamped_into_unit_interval() {
        let mut req = request(100.0, 80);
        req.demand_level = 7.5;
        let quote = quote_at(&req, today()).unwrap();
        assert_eq!(quote.demand_level, 1.0);
    }

    #[test]
    fn test_scarce_flight_hits_price_ceiling() {
        // 5% seats left, max demand, travelling tomorrow:
        // 2.0 * 1.5 * 1.5 = 4.5x, clamped to the 3x ceiling.
        let anchor = today();
        let tomorrow = (anchor + Duration::days(1)).format("%Y-%m-%d").to_string();
        let mut req = request(9000.0, 5);
        req.travel_date = Some(&tomorrow);
        req.demand_level = 1.0;
        let quote = quote_at(&req, anchor).unwrap();
        assert_eq!(quote.breakdown.combined_multiplier, 4.5);
        assert_eq!(quote.final_price, 27000.0);
    }

    #[test]
    fn test_price_floor_applies() {
        let discount = PricingTiers::parse(&serde_json::json!({"100": 0.5}));
        let anchor = today();
        let far_out = (anchor + Duration::days(60)).format("%Y-%m-%d").to_string();
        let mut req = request(100.0, 90);
        req.travel_date = Some(&far_out);
        req.tiers = Some(&discount);
        let quote = quote_at(&req, anchor).unwrap();
        // 0.5 * 0.95 = 0.475x, clamped to the 0.8x floor.
        assert_eq!(quote.final_price, 80.0);
    }

    #[test]
    fn test_final_price_always_within_band() {
        for seats in 0..=100 {
            for demand in [0.0, 0.5, 1.0] {
                let mut req = request(250.0, seats);
                req.demand_level = demand;
                let price = quote_at(&req, today()).unwrap().final_price;
                assert!((200.0..=750.0).contains(&price), "{seats}/{demand} -> {price}");
            }
        }
    }

    #[test]
    fn test_price_rounded_to_cents() {
        let mut req = request(99.99, 15);
        req.demand_level = 0.33;
        let price = quote_at(&req, today()).unwrap().final_price;
        assert_eq!(price, round2(price));
    }
}
