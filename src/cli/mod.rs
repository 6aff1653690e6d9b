//! Command-line parsing for the demand planner.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the forecasting and overlay code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{BusinessProfile, MaShape, ModelChoice};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dplan", version, about = "Inventory demand planner")]
pub struct Cli {
    /// Log level for stderr diagnostics (error, warn, info, debug, trace).
    ///
    /// Falls back to the `DPLAN_LOG` environment variable, then `info`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Forecast one SKU, apply the strategy overlay, and print the plan.
    Plan(PlanArgs),
    /// Plan every SKU in the sales file.
    Batch(BatchArgs),
    /// Print the data health report of a sales file.
    Inspect(InputArgs),
    /// Write a seeded synthetic data set (sales plus companion CSVs).
    Sample(SampleArgs),
}

/// Sales file, companion tables and column roles.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Sales history CSV.
    #[arg(value_name = "SALES_CSV")]
    pub sales: PathBuf,

    /// Marketing spend CSV (joined on date, and SKU when present).
    #[arg(long, value_name = "CSV")]
    pub marketing: Option<PathBuf>,

    /// Festival calendar CSV (joined on date).
    #[arg(long, value_name = "CSV")]
    pub festivals: Option<PathBuf>,

    /// Events CSV (joined on date).
    #[arg(long, value_name = "CSV")]
    pub events: Option<PathBuf>,

    /// SKU master CSV (joined on SKU).
    #[arg(long, value_name = "CSV")]
    pub sku_master: Option<PathBuf>,

    /// Column holding the date (overrides header synonyms).
    #[arg(long)]
    pub date_column: Option<String>,

    /// Column holding the sold quantity (overrides header synonyms).
    #[arg(long)]
    pub quantity_column: Option<String>,

    /// Column holding the SKU (overrides header synonyms).
    #[arg(long)]
    pub sku_column: Option<String>,
}

/// Strategy levers and model selection shared by `plan` and `batch`.
#[derive(Debug, Args, Clone, Default)]
pub struct StrategyArgs {
    /// TOML config file (else `DPLAN_CONFIG`).
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Forecasting model.
    #[arg(long, value_enum)]
    pub model: Option<ModelChoice>,

    /// Business profile preset.
    #[arg(long, value_enum)]
    pub profile: Option<BusinessProfile>,

    /// Start from the profile's suggested levers.
    #[arg(long)]
    pub suggested: bool,

    /// Forecast horizon in days.
    #[arg(long)]
    pub horizon: Option<usize>,

    /// Trend surge multiplier.
    #[arg(long)]
    pub surge: Option<f64>,

    /// Marketing lift in percent.
    #[arg(long)]
    pub marketing_lift: Option<f64>,

    /// Expected return rate in percent.
    #[arg(long)]
    pub return_rate: Option<f64>,

    /// Safety buffer in percent.
    #[arg(long)]
    pub safety_buffer: Option<f64>,

    /// Production lead time in days.
    #[arg(long)]
    pub lead_time: Option<u32>,

    /// Active festival (repeatable).
    #[arg(long = "festival", value_name = "NAME")]
    pub festival: Vec<String>,

    /// Lift on a festival's own date, in percent.
    #[arg(long)]
    pub peak_lift: Option<f64>,

    /// Lift on the days around a festival, in percent.
    #[arg(long)]
    pub window_lift: Option<f64>,

    /// Moving-average span.
    #[arg(long)]
    pub ma_span: Option<usize>,

    /// Moving-average shape over the horizon.
    #[arg(long, value_enum)]
    pub ma_shape: Option<MaShape>,

    /// Neighbours used by KNN.
    #[arg(long)]
    pub knn_k: Option<usize>,

    /// Trend flexibility of the seasonal regression (0.01 to 0.5).
    #[arg(long)]
    pub trend_sensitivity: Option<f64>,

    /// Regressor weight of the seasonal regression (0 to 2).
    #[arg(long)]
    pub marketing_weight: Option<f64>,

    /// Date used as "today" for the production-ready date (default: local date).
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub today: Option<NaiveDate>,
}

#[derive(Debug, Parser, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub strategy: StrategyArgs,

    /// SKU to plan (default: first SKU in sorted order).
    #[arg(long)]
    pub sku: Option<String>,

    /// Plan rows to print.
    #[arg(long, default_value_t = 14)]
    pub rows: usize,

    /// Export the plan table to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the KPI summary to JSON.
    #[arg(long, value_name = "JSON")]
    pub summary_json: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct BatchArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub strategy: StrategyArgs,

    /// Export every SKU's plan to one CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export all KPI summaries to one JSON array.
    #[arg(long, value_name = "JSON")]
    pub summary_json: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Output directory (sales.csv plus companion tables).
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// Days of history per SKU.
    #[arg(long, default_value_t = 730)]
    pub days: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// First date of the history.
    #[arg(long, value_name = "YYYY-MM-DD", default_value = "2024-01-01")]
    pub start: NaiveDate,
}
