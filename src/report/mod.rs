//! Reporting utilities: plan KPIs and formatted terminal output.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::domain::{CleanedSeries, PlanRow, PlanSummary, StrategyConfig};
use crate::error::PlanError;
use crate::models::ModelForecast;

pub mod format;

pub use format::*;

/// Calendar days of actuals the growth KPI compares against.
pub const GROWTH_LOOKBACK_DAYS: i64 = 90;

/// Everything the summary needs besides the plan rows.
#[derive(Debug, Clone)]
pub struct SummaryContext<'a> {
    pub series: &'a CleanedSeries,
    pub config: &'a StrategyConfig,
    pub forecast: &'a ModelForecast,
    pub fallback_reason: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub today: NaiveDate,
}

/// Compute the scalar KPIs of one SKU's plan.
///
/// Fails with `InvalidConfig` when `today + lead_time_days` is out of the
/// calendar range.
pub fn compute_summary(rows: &[PlanRow], ctx: SummaryContext<'_>) -> Result<PlanSummary, PlanError> {
    let gross_total: f64 = rows.iter().map(|r| r.forecast).sum();
    let net_total: f64 = rows.iter().map(|r| r.net_demand).sum();
    let target_total: f64 = rows.iter().map(|r| r.inventory_target).sum();
    let avg_daily_demand = if rows.is_empty() {
        0.0
    } else {
        gross_total / rows.len() as f64
    };

    let last_history_date = ctx.series.last_date().unwrap_or(ctx.today);
    let growth_pct = trailing_daily_average(ctx.series, GROWTH_LOOKBACK_DAYS)
        .filter(|actual| *actual > 0.0)
        .map(|actual| (avg_daily_demand / actual - 1.0) * 100.0);

    let lead_time = ctx.config.lead_time_days;
    let production_ready_date = ctx
        .today
        .checked_add_signed(Duration::days(i64::from(lead_time)))
        .ok_or_else(|| {
            PlanError::InvalidConfig(format!(
                "production ready date ({} + {lead_time} days) is out of the calendar range",
                ctx.today
            ))
        })?;

    Ok(PlanSummary {
        sku: ctx.series.sku.clone(),
        model_requested: ctx.config.model_choice,
        model_used: ctx.forecast.model,
        fallback_reason: ctx.fallback_reason,
        business_profile: ctx.config.business_profile,
        horizon_days: rows.len(),
        history_days: ctx.series.len(),
        last_history_date,
        gross_total,
        net_total,
        target_total,
        avg_daily_demand,
        growth_pct,
        production_ready_date,
        negative_clamped: ctx.forecast.guard.negative_clamped,
        ceiling_clamped: ctx.forecast.guard.ceiling_clamped,
        attributes: ctx.attributes,
    })
}

/// Mean daily sales over the last `days` calendar days of history.
///
/// Missing days inside the window count as zero; the window is cut at the
/// first observation when the history is shorter.
pub fn trailing_daily_average(series: &CleanedSeries, days: i64) -> Option<f64> {
    let (first, last) = (series.first_date()?, series.last_date()?);
    let start = (last - Duration::days(days - 1)).max(first);
    let span = (last - start).num_days() + 1;
    let total: f64 = series
        .records
        .iter()
        .filter(|r| r.date >= start)
        .map(|r| r.sales)
        .sum();
    Some(total / span as f64)
}
