//! Shared "plan pipeline" logic used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! SKU series -> model adapter (with fallback) -> strategy overlay -> KPIs
//!
//! The CLI handlers only deal with loading inputs and presenting outputs.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{ModelChoice, PlanRow, PlanSummary, StrategyConfig};
use crate::error::PlanError;
use crate::io::ingest::SalesTable;
use crate::models::{ModelForecast, ModelRegistry};
use crate::report::{SummaryContext, compute_summary};
use crate::strategy::apply_overlay;

/// Model used when the requested one lacks history or its fit fails.
pub const FALLBACK_MODEL: ModelChoice = ModelChoice::MovingAverage;

/// All computed outputs of a single SKU run.
#[derive(Debug, Clone)]
pub struct PlanOutput {
    pub summary: PlanSummary,
    pub rows: Vec<PlanRow>,
    pub forecast: ModelForecast,
}

/// Outputs of a batch run, in SKU order.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    pub plans: Vec<PlanOutput>,
    pub failures: Vec<(String, PlanError)>,
}

/// The requested SKU, or the first SKU in sorted order.
pub fn resolve_sku(table: &SalesTable, requested: Option<&str>) -> Result<String, PlanError> {
    match requested {
        Some(sku) => Ok(sku.trim().to_string()),
        None => table
            .skus()
            .into_iter()
            .next()
            .ok_or_else(|| PlanError::NoDataForSku("<none>".to_string())),
    }
}

/// Fold table-derived settings into the config and validate it.
///
/// Named dates from a festival companion table are added to the calendar
/// alongside any existing dates of the same festival. Active festival dates
/// and profile multipliers are then handed to the models.
pub fn prepare_config(table: &SalesTable, config: &StrategyConfig) -> Result<StrategyConfig, PlanError> {
    let mut config = config.clone();
    for (name, date) in &table.festival_dates {
        config.calendar.insert(name, *date);
    }
    config.validate()?;

    config.model_params.event_dates = config
        .active_festival_dates()
        .into_iter()
        .map(|(_, date)| date)
        .collect();
    config.model_params.profile = config.profile_multipliers();
    Ok(config)
}

/// Plan one SKU end to end.
pub fn run_plan(
    table: &SalesTable,
    sku: &str,
    config: &StrategyConfig,
    registry: &ModelRegistry,
    today: NaiveDate,
) -> Result<PlanOutput, PlanError> {
    let config = prepare_config(table, config)?;
    plan_prepared(table, sku, &config, registry, today)
}

/// Plan every SKU in parallel; per-SKU failures do not stop the batch.
pub fn run_batch(
    table: &SalesTable,
    config: &StrategyConfig,
    registry: &ModelRegistry,
    today: NaiveDate,
) -> Result<BatchOutput, PlanError> {
    let config = prepare_config(table, config)?;
    let skus = table.skus();
    info!(skus = skus.len(), model = %config.model_choice, "batch planning");

    let results: Vec<(String, Result<PlanOutput, PlanError>)> = skus
        .par_iter()
        .map(|sku| (sku.clone(), plan_prepared(table, sku, &config, registry, today)))
        .collect();

    let mut out = BatchOutput::default();
    for (sku, result) in results {
        match result {
            Ok(plan) => out.plans.push(plan),
            Err(e) => {
                warn!(sku = %sku, error = %e, "SKU skipped");
                out.failures.push((sku, e));
            }
        }
    }
    Ok(out)
}

fn plan_prepared(
    table: &SalesTable,
    sku: &str,
    config: &StrategyConfig,
    registry: &ModelRegistry,
    today: NaiveDate,
) -> Result<PlanOutput, PlanError> {
    let series = table
        .series(sku)
        .ok_or_else(|| PlanError::NoDataForSku(sku.to_string()))?;

    let requested = config.model_choice;
    let horizon = config.forecast_horizon_days;
    let params = &config.model_params;

    let model = registry
        .get(requested)
        .ok_or_else(|| PlanError::InvalidConfig(format!("model '{requested}' is not registered")))?;

    let (forecast, fallback_reason) = match model.forecast(&series, horizon, params) {
        Ok(forecast) => (forecast, None),
        Err(err @ (PlanError::InsufficientHistory { .. } | PlanError::Numeric(_))) if requested != FALLBACK_MODEL => {
            warn!(sku = %sku, error = %err, fallback = %FALLBACK_MODEL, "falling back");
            let fallback = registry.get(FALLBACK_MODEL).ok_or_else(|| {
                PlanError::InvalidConfig(format!("fallback model '{FALLBACK_MODEL}' is not registered"))
            })?;
            (fallback.forecast(&series, horizon, params)?, Some(err.to_string()))
        }
        Err(err) => return Err(err),
    };

    let rows = apply_overlay(&forecast.points, config);
    let summary = compute_summary(
        &rows,
        SummaryContext {
            series: &series,
            config,
            forecast: &forecast,
            fallback_reason,
            attributes: table.attributes.get(sku).cloned().unwrap_or_default(),
            today,
        },
    )?;
    info!(
        sku = %sku,
        model = %summary.model_used,
        horizon,
        gross = summary.gross_total,
        target = summary.target_total,
        "plan ready"
    );

    Ok(PlanOutput {
        summary,
        rows,
        forecast,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CleanedSeries, ModelParams, Regressors, SalesRecord};
    use crate::io::ingest::normalize_records;
    use crate::models::{Forecaster, MovingAverageModel};
    use chrono::Duration;
    use std::collections::BTreeSet;

    /// Regression stand-in whose fit always breaks down.
    struct SingularFit;

    impl Forecaster for SingularFit {
        fn choice(&self) -> ModelChoice {
            ModelChoice::SeasonalRegression
        }

        fn min_history(&self, _params: &ModelParams) -> usize {
            1
        }

        fn forecast(&self, _series: &CleanedSeries, _horizon_days: usize, _params: &ModelParams) -> Result<ModelForecast, PlanError> {
            Err(PlanError::Numeric("normal equations are singular".to_string()))
        }
    }

    fn table(skus: &[(&str, usize, f64)]) -> SalesTable {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut records = Vec::new();
        for &(sku, days, value) in skus {
            for i in 0..days {
                records.push(SalesRecord {
                    date: start + Duration::days(i as i64),
                    sku: sku.to_string(),
                    sales: value,
                    regressors: Regressors::default(),
                });
            }
        }
        SalesTable {
            records: normalize_records(records),
            ..SalesTable::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn flat_history_moving_average_end_to_end() {
        let t = table(&[("A", 365, 100.0)]);
        let config = StrategyConfig {
            model_choice: ModelChoice::MovingAverage,
            forecast_horizon_days: 30,
            surge_multiplier: 1.0,
            marketing_lift_pct: 0.0,
            return_rate_pct: 0.0,
            safety_buffer_pct: 0.0,
            ..StrategyConfig::default()
        };
        let out = run_plan(&t, "A", &config, &ModelRegistry::standard(), today()).unwrap();
        assert_eq!(out.rows.len(), 30);
        for r in &out.rows {
            assert!((r.forecast - 100.0).abs() < 1e-6);
            assert!((r.net_demand - r.forecast).abs() < 1e-9);
            assert!((r.inventory_target - r.forecast).abs() < 1e-9);
        }
        assert!(out.summary.fallback_reason.is_none());
    }

    #[test]
    fn missing_sku_is_reported() {
        let t = table(&[("A", 30, 1.0)]);
        let err = run_plan(&t, "B", &StrategyConfig::default(), &ModelRegistry::standard(), today()).unwrap_err();
        assert_eq!(err, PlanError::NoDataForSku("B".to_string()));
    }

    #[test]
    fn short_history_falls_back_to_moving_average() {
        let t = table(&[("A", 3, 10.0)]);
        let config = StrategyConfig {
            model_choice: ModelChoice::SeasonalRegression,
            ..StrategyConfig::default()
        };
        let out = run_plan(&t, "A", &config, &ModelRegistry::standard(), today()).unwrap();
        assert_eq!(out.summary.model_requested, ModelChoice::SeasonalRegression);
        assert_eq!(out.summary.model_used, ModelChoice::MovingAverage);
        assert!(out.summary.fallback_reason.is_some());
        assert_eq!(out.rows.len(), config.forecast_horizon_days);
    }

    #[test]
    fn failed_fit_falls_back_to_moving_average() {
        let t = table(&[("A", 60, 10.0)]);
        let mut registry = ModelRegistry::empty();
        registry.register(Box::new(SingularFit));
        registry.register(Box::new(MovingAverageModel));
        let config = StrategyConfig {
            model_choice: ModelChoice::SeasonalRegression,
            ..StrategyConfig::default()
        };
        let out = run_plan(&t, "A", &config, &registry, today()).unwrap();
        assert_eq!(out.summary.model_used, ModelChoice::MovingAverage);
        let reason = out.summary.fallback_reason.unwrap();
        assert!(reason.contains("numeric failure"), "{reason}");
        assert_eq!(out.rows.len(), config.forecast_horizon_days);

        let mut alone = ModelRegistry::empty();
        alone.register(Box::new(SingularFit));
        let err = run_plan(&t, "A", &config, &alone, today()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfig(_)));
    }

    #[test]
    fn past_companion_festival_keeps_upcoming_lift() {
        let mut t = table(&[("A", 365, 100.0)]);
        t.festival_dates
            .push(("Christmas".to_string(), NaiveDate::from_ymd_opt(2024, 12, 25).unwrap()));
        let config = StrategyConfig {
            model_choice: ModelChoice::MovingAverage,
            forecast_horizon_days: 400,
            return_rate_pct: 0.0,
            safety_buffer_pct: 0.0,
            active_festivals: BTreeSet::from(["Christmas".to_string()]),
            ..StrategyConfig::default()
        };
        let prepared = prepare_config(&t, &config).unwrap();
        assert_eq!(prepared.calendar.dates("christmas").len(), 2);
        assert_eq!(prepared.model_params.event_dates.len(), 2);

        let out = run_plan(&t, "A", &config, &ModelRegistry::standard(), today()).unwrap();
        let at = |y, m, day| {
            let date = NaiveDate::from_ymd_opt(y, m, day).unwrap();
            out.rows.iter().find(|r| r.date == date).unwrap().forecast
        };
        assert!((at(2026, 12, 25) - 160.0).abs() < 1e-6);
        assert!((at(2026, 12, 24) - 130.0).abs() < 1e-6);
        assert!((at(2026, 6, 1) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn oversized_lead_time_is_rejected_not_panicking() {
        let t = table(&[("A", 60, 10.0)]);
        let config = StrategyConfig {
            lead_time_days: 4_000_000_000,
            ..StrategyConfig::default()
        };
        let err = run_plan(&t, "A", &config, &ModelRegistry::standard(), today()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfig(_)));
    }

    #[test]
    fn batch_keeps_sku_order() {
        let t = table(&[("B", 60, 5.0), ("A", 60, 7.0), ("C", 60, 9.0)]);
        let out = run_batch(&t, &StrategyConfig::default(), &ModelRegistry::standard(), today()).unwrap();
        let skus: Vec<&str> = out.plans.iter().map(|p| p.summary.sku.as_str()).collect();
        assert_eq!(skus, vec!["A", "B", "C"]);
        assert!(out.failures.is_empty());
    }

    #[test]
    fn unknown_active_festival_is_invalid() {
        let t = table(&[("A", 30, 1.0)]);
        let mut config = StrategyConfig::default();
        config.active_festivals.insert("Nowruz".to_string());
        let err = run_plan(&t, "A", &config, &ModelRegistry::standard(), today()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfig(_)));

        let mut with_table = t.clone();
        with_table
            .festival_dates
            .push(("Nowruz".to_string(), NaiveDate::from_ymd_opt(2025, 3, 20).unwrap()));
        assert!(run_plan(&with_table, "A", &config, &ModelRegistry::standard(), today()).is_ok());
    }

    #[test]
    fn default_sku_is_first_sorted() {
        let t = table(&[("ZED", 10, 1.0), ("ALPHA", 10, 1.0)]);
        assert_eq!(resolve_sku(&t, None).unwrap(), "ALPHA");
        assert_eq!(resolve_sku(&t, Some(" ZED ")).unwrap(), "ZED");
        assert!(resolve_sku(&SalesTable::default(), None).is_err());
    }
}
