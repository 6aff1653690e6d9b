//! Overlay engine: turns a raw model forecast into plan rows.
//!
//! Fixed order per day:
//!
//! 1. Festival lift. For each active festival (in name order), the peak day is
//!    multiplied by `1 + peak_lift_pct/100` and the window days (two days
//!    before, one day after) by `1 + window_lift_pct/100`. Overlapping
//!    festivals compound.
//! 2. Trend surge: `× surge_multiplier`.
//! 3. Marketing lift: `× (1 + marketing_lift_pct/100)`.
//!
//! The result is the gross `forecast`. Then:
//!
//! - `net_demand = forecast × (1 - return_rate_pct/100)`
//! - `inventory_target = net_demand × (1 + safety_buffer_pct/100)`
//!
//! All three are clamped to be non-negative.

use chrono::NaiveDate;

use crate::domain::{ForecastPoint, PlanRow, StrategyConfig};

/// Window offsets (days from the peak) that receive the window lift.
pub const WINDOW_OFFSETS: [i64; 3] = [-2, -1, 1];

/// Combined festival multiplier for `date`.
pub fn festival_multiplier(date: NaiveDate, festivals: &[(String, NaiveDate)], peak_lift_pct: f64, window_lift_pct: f64) -> f64 {
    let peak = 1.0 + peak_lift_pct / 100.0;
    let window = 1.0 + window_lift_pct / 100.0;
    festivals
        .iter()
        .map(|(_, festival)| {
            let offset = (date - *festival).num_days();
            if offset == 0 {
                peak
            } else if WINDOW_OFFSETS.contains(&offset) {
                window
            } else {
                1.0
            }
        })
        .product()
}

/// Apply the strategy levers to a model forecast. Pure; no I/O.
pub fn apply_overlay(points: &[ForecastPoint], config: &StrategyConfig) -> Vec<PlanRow> {
    let festivals = config.active_festival_dates();
    let marketing = 1.0 + config.marketing_lift_pct / 100.0;
    let keep = 1.0 - config.return_rate_pct / 100.0;
    let buffer = 1.0 + config.safety_buffer_pct / 100.0;

    points
        .iter()
        .map(|p| {
            let lifted = p.forecast
                * festival_multiplier(p.date, &festivals, config.peak_lift_pct, config.window_lift_pct);
            let forecast = non_negative(lifted * config.surge_multiplier * marketing);
            let net_demand = non_negative(forecast * keep);
            let inventory_target = non_negative(net_demand * buffer);
            PlanRow {
                date: p.date,
                forecast,
                net_demand,
                inventory_target,
            }
        })
        .collect()
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flat(start: NaiveDate, days: i64, value: f64) -> Vec<ForecastPoint> {
        (0..days)
            .map(|i| ForecastPoint {
                date: start + Duration::days(i),
                forecast: value,
            })
            .collect()
    }

    fn neutral() -> StrategyConfig {
        StrategyConfig {
            return_rate_pct: 0.0,
            safety_buffer_pct: 0.0,
            ..StrategyConfig::default()
        }
    }

    #[test]
    fn net_and_target_formulas() {
        let config = StrategyConfig {
            return_rate_pct: 25.0,
            safety_buffer_pct: 15.0,
            ..StrategyConfig::default()
        };
        let rows = apply_overlay(&flat(d(2026, 1, 1), 1, 100.0), &config);
        assert!((rows[0].forecast - 100.0).abs() < 1e-12);
        assert!((rows[0].net_demand - 75.0).abs() < 1e-12);
        assert!((rows[0].inventory_target - 86.25).abs() < 1e-9);
    }

    #[test]
    fn festival_peak_and_window_lift() {
        let config = StrategyConfig {
            active_festivals: BTreeSet::from(["Christmas".to_string()]),
            peak_lift_pct: 60.0,
            window_lift_pct: 30.0,
            ..neutral()
        };
        let rows = apply_overlay(&flat(d(2026, 12, 20), 10, 100.0), &config);
        let at = |date: NaiveDate| rows.iter().find(|r| r.date == date).unwrap().forecast;

        assert!((at(d(2026, 12, 25)) - 160.0).abs() < 1e-9);
        for day in [23, 24, 26] {
            assert!((at(d(2026, 12, day)) - 130.0).abs() < 1e-9, "day {day}");
        }
        for day in [20, 21, 22, 27, 28, 29] {
            assert!((at(d(2026, 12, day)) - 100.0).abs() < 1e-9, "day {day}");
        }
    }

    #[test]
    fn overlapping_festivals_compound() {
        // Black Friday (11-27) window covers 11-25; a custom festival peaks there.
        let mut config = StrategyConfig {
            active_festivals: BTreeSet::from(["Black Friday".to_string(), "Launch".to_string()]),
            ..neutral()
        };
        config.calendar.insert("Launch", d(2026, 11, 25));
        let rows = apply_overlay(&flat(d(2026, 11, 25), 1, 100.0), &config);
        assert!((rows[0].forecast - 100.0 * 1.3 * 1.6).abs() < 1e-9);
    }

    #[test]
    fn festival_lift_precedes_surge_and_marketing() {
        let config = StrategyConfig {
            active_festivals: BTreeSet::from(["Diwali".to_string()]),
            surge_multiplier: 1.2,
            marketing_lift_pct: 10.0,
            return_rate_pct: 10.0,
            safety_buffer_pct: 20.0,
            ..StrategyConfig::default()
        };
        let rows = apply_overlay(&flat(d(2026, 11, 8), 1, 50.0), &config);
        let gross = 50.0 * 1.6 * 1.2 * 1.1;
        assert!((rows[0].forecast - gross).abs() < 1e-9);
        assert!((rows[0].net_demand - gross * 0.9).abs() < 1e-9);
        assert!((rows[0].inventory_target - gross * 0.9 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn zero_surge_yields_zero_plan() {
        let config = StrategyConfig {
            surge_multiplier: 0.0,
            ..StrategyConfig::default()
        };
        let rows = apply_overlay(&flat(d(2026, 1, 1), 3, 100.0), &config);
        assert!(rows.iter().all(|r| r.forecast == 0.0 && r.net_demand == 0.0 && r.inventory_target == 0.0));
    }
}
