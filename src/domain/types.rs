//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed by value through the pipeline (no session-wide state)
//! - exported to CSV/JSON
//! - loaded from a TOML config file

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::calendar::FestivalCalendar;
use crate::error::PlanError;

/// SKU assigned to every row when an upload has no SKU column.
pub const DEFAULT_SKU: &str = "DEFAULT_SKU";

/// Recommended minimum number of observations for the learned models.
pub const MIN_HISTORY_DAYS: usize = 7;

/// Longest accepted production lead time.
pub const MAX_LEAD_TIME_DAYS: u32 = 365;

/// Longest accepted forecast horizon (ten years).
pub const MAX_HORIZON_DAYS: usize = 3650;

/// Exogenous regressors attached to a sales observation.
///
/// All three default to zero when no companion table supplies them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Regressors {
    pub marketing_spend: f64,
    pub festival_flag: f64,
    pub event_flag: f64,
}

impl Regressors {
    /// Merge two observations of the same (date, sku): spend adds up, flags are OR-ed.
    pub fn merge(self, other: Regressors) -> Regressors {
        Regressors {
            marketing_spend: self.marketing_spend + other.marketing_spend,
            festival_flag: self.festival_flag.max(other.festival_flag),
            event_flag: self.event_flag.max(other.event_flag),
        }
    }
}

/// One normalized observation: at most one per (date, sku).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub date: NaiveDate,
    pub sku: String,
    /// Non-negative quantity sold.
    pub sales: f64,
    pub regressors: Regressors,
}

/// Date-ordered history of a single SKU. Gaps are kept as gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSeries {
    pub sku: String,
    pub records: Vec<SalesRecord>,
}

impl CleanedSeries {
    /// Build a series, keeping only records of `sku` and sorting them by date.
    pub fn new(sku: impl Into<String>, records: Vec<SalesRecord>) -> Self {
        let sku = sku.into();
        let mut records: Vec<SalesRecord> = records.into_iter().filter(|r| r.sku == sku).collect();
        records.sort_by_key(|r| r.date);
        Self { sku, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.sales).collect()
    }

    /// Largest observed quantity (0 for an empty series).
    pub fn max_sales(&self) -> f64 {
        self.records.iter().map(|r| r.sales).fold(0.0, f64::max)
    }

    /// Number of calendar days from first to last observation, inclusive.
    pub fn calendar_span_days(&self) -> usize {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => ((last - first).num_days() + 1).max(0) as usize,
            _ => 0,
        }
    }

    /// Days inside the calendar span with no observation.
    pub fn gap_days(&self) -> usize {
        self.calendar_span_days().saturating_sub(self.len())
    }
}

/// One day of model output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub forecast: f64,
}

/// One day of the final plan.
///
/// `net_demand = forecast * (1 - return%)` and
/// `inventory_target = net_demand * (1 + buffer%)`; all fields are >= 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanRow {
    pub date: NaiveDate,
    pub forecast: f64,
    pub net_demand: f64,
    pub inventory_target: f64,
}

/// Which forecasting algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ModelChoice {
    /// EWMA baseline held flat (or decayed) over the horizon.
    MovingAverage,
    /// Distance-weighted k-nearest neighbours on calendar features.
    Knn,
    /// CART regression tree on calendar features and regressors.
    DecisionTree,
    /// Trend + weekly + yearly Fourier terms + regressors, ridge-penalized.
    SeasonalRegression,
    /// Seasonality indices, momentum phase and a guardrailed robust baseline.
    Heuristic,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 5] = [
        ModelChoice::MovingAverage,
        ModelChoice::Knn,
        ModelChoice::DecisionTree,
        ModelChoice::SeasonalRegression,
        ModelChoice::Heuristic,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelChoice::MovingAverage => "Moving Average",
            ModelChoice::Knn => "KNN",
            ModelChoice::DecisionTree => "Decision Tree",
            ModelChoice::SeasonalRegression => "Seasonal Regression",
            ModelChoice::Heuristic => "Seasonality + Momentum",
        }
    }
}

impl std::fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Named preset bundle of trend / season / marketing multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BusinessProfile {
    Fashion,
    Fmcg,
    Electronics,
    Seasonal,
    /// Use `StrategyConfig::custom_profile`.
    Custom,
}

impl BusinessProfile {
    pub fn display_name(self) -> &'static str {
        match self {
            BusinessProfile::Fashion => "Fashion",
            BusinessProfile::Fmcg => "FMCG",
            BusinessProfile::Electronics => "Electronics",
            BusinessProfile::Seasonal => "Seasonal",
            BusinessProfile::Custom => "Custom",
        }
    }

    /// Preset multipliers; `None` for `Custom`.
    pub fn preset(self) -> Option<ProfileMultipliers> {
        let (trend, season, marketing) = match self {
            BusinessProfile::Fashion => (1.10, 1.20, 1.15),
            BusinessProfile::Fmcg => (1.02, 1.05, 1.05),
            BusinessProfile::Electronics => (1.05, 1.10, 1.10),
            BusinessProfile::Seasonal => (1.00, 1.35, 1.05),
            BusinessProfile::Custom => return None,
        };
        Some(ProfileMultipliers {
            trend,
            season,
            marketing,
        })
    }

    /// Suggested return rate for the operational levers.
    pub fn suggested_return_rate_pct(self) -> f64 {
        match self {
            BusinessProfile::Fashion => 25.0,
            _ => 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileMultipliers {
    /// Scales the momentum term of the heuristic engine.
    pub trend: f64,
    /// Scales deviations of the seasonality indices from 1.
    pub season: f64,
    /// Flat demand multiplier applied to every heuristic forecast day.
    pub marketing: f64,
}

impl Default for ProfileMultipliers {
    fn default() -> Self {
        Self {
            trend: 1.0,
            season: 1.0,
            marketing: 1.0,
        }
    }
}

/// Shape of the moving-average forecast across the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum MaShape {
    Flat,
    /// Linear decay from the EWMA level to `ma_end_ratio * level` on the last day.
    LinearDecay,
}

/// Tuning knobs for the model adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    pub ma_span: usize,
    pub ma_shape: MaShape,
    pub ma_end_ratio: f64,

    pub knn_k: usize,

    pub tree_max_depth: usize,
    pub tree_min_samples_leaf: usize,

    /// Trend flexibility of the seasonal regression (trend prior scale = 20 × this).
    pub trend_sensitivity: f64,
    /// Prior scale of the exogenous regressors; 0 drops them.
    pub marketing_weight: f64,

    pub baseline_window: usize,
    pub short_span: usize,
    pub long_span: usize,
    pub momentum_threshold: f64,
    pub dampening: f64,
    /// Weight recent history up to 2× the oldest in the seasonality indices.
    pub time_weighted: bool,
    /// Peak uplift of the linear lead-in ramp before a known event date.
    pub festival_ramp_pct: f64,
    pub festival_ramp_days: i64,
    /// Heuristic forecasts are clamped to `[0, guardrail_ratio × historical max]`.
    pub guardrail_ratio: f64,
    /// Dates the heuristic ramps into (filled by the orchestrator from active festivals).
    pub event_dates: Vec<NaiveDate>,
    /// Business-profile multipliers the heuristic applies (filled by the orchestrator).
    pub profile: ProfileMultipliers,

    /// Caller-supplied future regressor values; unknown dates are zero-filled.
    pub future_regressors: BTreeMap<NaiveDate, Regressors>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            ma_span: 7,
            ma_shape: MaShape::Flat,
            ma_end_ratio: 0.8,
            knn_k: 3,
            tree_max_depth: 10,
            tree_min_samples_leaf: 2,
            trend_sensitivity: 0.05,
            marketing_weight: 0.5,
            baseline_window: 28,
            short_span: 7,
            long_span: 30,
            momentum_threshold: 0.05,
            dampening: 0.65,
            time_weighted: true,
            festival_ramp_pct: 20.0,
            festival_ramp_days: 14,
            guardrail_ratio: 1.5,
            event_dates: Vec::new(),
            profile: ProfileMultipliers::default(),
            future_regressors: BTreeMap::new(),
        }
    }
}

impl ModelParams {
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.ma_span == 0 {
            return Err(PlanError::InvalidConfig("ma_span must be >= 1".to_string()));
        }
        if !(self.ma_end_ratio.is_finite() && self.ma_end_ratio >= 0.0) {
            return Err(PlanError::InvalidConfig("ma_end_ratio must be finite and >= 0".to_string()));
        }
        if self.knn_k == 0 {
            return Err(PlanError::InvalidConfig("knn_k must be >= 1".to_string()));
        }
        if self.tree_max_depth == 0 || self.tree_min_samples_leaf == 0 {
            return Err(PlanError::InvalidConfig(
                "tree_max_depth and tree_min_samples_leaf must be >= 1".to_string(),
            ));
        }
        if !(self.trend_sensitivity.is_finite() && self.trend_sensitivity > 0.0) {
            return Err(PlanError::InvalidConfig("trend_sensitivity must be > 0".to_string()));
        }
        if !(self.marketing_weight.is_finite() && self.marketing_weight >= 0.0) {
            return Err(PlanError::InvalidConfig("marketing_weight must be >= 0".to_string()));
        }
        if self.baseline_window == 0 || self.short_span == 0 || self.long_span <= self.short_span {
            return Err(PlanError::InvalidConfig(
                "heuristic windows must satisfy baseline_window >= 1 and long_span > short_span >= 1"
                    .to_string(),
            ));
        }
        if !(self.momentum_threshold.is_finite() && self.momentum_threshold >= 0.0) {
            return Err(PlanError::InvalidConfig("momentum_threshold must be finite and >= 0".to_string()));
        }
        if !(self.dampening.is_finite() && (0.0..=1.0).contains(&self.dampening)) {
            return Err(PlanError::InvalidConfig("dampening must be within [0, 1]".to_string()));
        }
        if !(self.guardrail_ratio.is_finite() && self.guardrail_ratio > 0.0) {
            return Err(PlanError::InvalidConfig("guardrail_ratio must be > 0".to_string()));
        }
        if !(self.festival_ramp_pct.is_finite() && self.festival_ramp_pct >= 0.0) || self.festival_ramp_days < 1 {
            return Err(PlanError::InvalidConfig(
                "festival_ramp_pct must be >= 0 and festival_ramp_days >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A run's strategy levers. Immutable once the pipeline starts.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub surge_multiplier: f64,
    pub marketing_lift_pct: f64,
    pub return_rate_pct: f64,
    pub safety_buffer_pct: f64,
    pub active_festivals: BTreeSet<String>,
    pub peak_lift_pct: f64,
    pub window_lift_pct: f64,
    pub lead_time_days: u32,
    pub model_choice: ModelChoice,
    pub business_profile: BusinessProfile,
    /// Multipliers used when `business_profile` is `Custom`.
    pub custom_profile: ProfileMultipliers,
    pub forecast_horizon_days: usize,
    pub calendar: FestivalCalendar,
    pub model_params: ModelParams,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            surge_multiplier: 1.0,
            marketing_lift_pct: 0.0,
            return_rate_pct: 10.0,
            safety_buffer_pct: 15.0,
            active_festivals: BTreeSet::new(),
            peak_lift_pct: 60.0,
            window_lift_pct: 30.0,
            lead_time_days: 30,
            model_choice: ModelChoice::Heuristic,
            business_profile: BusinessProfile::Custom,
            custom_profile: ProfileMultipliers::default(),
            forecast_horizon_days: 30,
            calendar: FestivalCalendar::builtin(),
            model_params: ModelParams::default(),
        }
    }
}

impl StrategyConfig {
    /// Reset the operational levers to the profile's suggested values.
    pub fn apply_suggested_levers(&mut self) {
        self.return_rate_pct = self.business_profile.suggested_return_rate_pct();
        self.safety_buffer_pct = 15.0;
        self.surge_multiplier = 1.0;
        self.marketing_lift_pct = 0.0;
        self.lead_time_days = 30;
    }

    /// Effective multipliers for the selected profile.
    pub fn profile_multipliers(&self) -> ProfileMultipliers {
        self.business_profile.preset().unwrap_or(self.custom_profile)
    }

    /// Every calendar date of the active festivals, in name then date order.
    pub fn active_festival_dates(&self) -> Vec<(String, NaiveDate)> {
        self.active_festivals
            .iter()
            .flat_map(|name| {
                self.calendar
                    .dates(name)
                    .into_iter()
                    .map(move |date| (name.clone(), date))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        let non_negative = [
            ("surge_multiplier", self.surge_multiplier),
            ("marketing_lift_pct", self.marketing_lift_pct),
            ("safety_buffer_pct", self.safety_buffer_pct),
            ("peak_lift_pct", self.peak_lift_pct),
            ("window_lift_pct", self.window_lift_pct),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PlanError::InvalidConfig(format!("{name} must be finite and >= 0 (got {value})")));
            }
        }
        if !(self.return_rate_pct.is_finite() && (0.0..=100.0).contains(&self.return_rate_pct)) {
            return Err(PlanError::InvalidConfig(format!(
                "return_rate_pct must be within [0, 100] (got {})",
                self.return_rate_pct
            )));
        }
        if !(1..=MAX_LEAD_TIME_DAYS).contains(&self.lead_time_days) {
            return Err(PlanError::InvalidConfig(format!(
                "lead_time_days must be within [1, {MAX_LEAD_TIME_DAYS}] (got {})",
                self.lead_time_days
            )));
        }
        if !(1..=MAX_HORIZON_DAYS).contains(&self.forecast_horizon_days) {
            return Err(PlanError::InvalidConfig(format!(
                "forecast_horizon_days must be within [1, {MAX_HORIZON_DAYS}] (got {})",
                self.forecast_horizon_days
            )));
        }
        let custom = self.custom_profile;
        if ![custom.trend, custom.season, custom.marketing]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
        {
            return Err(PlanError::InvalidConfig("custom profile multipliers must be >= 0".to_string()));
        }
        for name in &self.active_festivals {
            if !self.calendar.contains(name) {
                return Err(PlanError::InvalidConfig(format!(
                    "unknown festival '{name}' (known: {})",
                    self.calendar.names().join(", ")
                )));
            }
        }
        self.model_params.validate()
    }
}

/// Scalar KPIs reported next to the plan table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub sku: String,
    pub model_requested: ModelChoice,
    pub model_used: ModelChoice,
    pub fallback_reason: Option<String>,
    pub business_profile: BusinessProfile,
    pub horizon_days: usize,
    pub history_days: usize,
    pub last_history_date: NaiveDate,
    pub gross_total: f64,
    pub net_total: f64,
    pub target_total: f64,
    pub avg_daily_demand: f64,
    /// Average daily forecast vs trailing 90-day actuals; `None` when actuals are zero.
    pub growth_pct: Option<f64>,
    pub production_ready_date: NaiveDate,
    pub negative_clamped: usize,
    pub ceiling_clamped: usize,
    pub attributes: BTreeMap<String, String>,
}

/// `count` consecutive dates starting the day after `last`.
///
/// Fails with `InvalidConfig` when the horizon runs past the last date chrono
/// can represent.
pub fn horizon_dates(last: NaiveDate, count: usize) -> Result<Vec<NaiveDate>, PlanError> {
    (1..=count as i64)
        .map(|i| {
            last.checked_add_signed(Duration::days(i)).ok_or_else(|| {
                PlanError::InvalidConfig(format!("a {count}-day horizon after {last} is out of the calendar range"))
            })
        })
        .collect()
}
