//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and initializes logging
//! - loads the sales upload and its companion tables
//! - resolves the layered strategy config
//! - runs the plan pipeline
//! - prints reports and writes optional exports

use std::env;

use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use crate::cli::{BatchArgs, Command, InputArgs, PlanArgs, SampleArgs, StrategyArgs};
use crate::domain::StrategyConfig;
use crate::error::AppError;
use crate::io::{
    ColumnRoles, Companions, LoadOptions, RawTable, SalesTable, StrategyOverrides, attach_companions,
    integrity_report, load_strategy, normalize_sales,
};
use crate::models::ModelRegistry;

pub mod pipeline;

pub const LOG_ENV_VAR: &str = "DPLAN_LOG";

/// Entry point for the `dplan` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    match cli.command {
        Command::Plan(args) => handle_plan(args),
        Command::Batch(args) => handle_batch(args),
        Command::Inspect(args) => handle_inspect(args),
        Command::Sample(args) => handle_sample(args),
    }
}

fn init_tracing(flag: Option<&str>) -> Result<(), AppError> {
    let level = match flag {
        Some(raw) => parse_level(raw)?,
        None => match env::var(LOG_ENV_VAR) {
            Ok(raw) if !raw.trim().is_empty() => parse_level(&raw)?,
            _ => LevelFilter::INFO,
        },
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(level)
        .compact()
        .init();
    Ok(())
}

fn parse_level(raw: &str) -> Result<LevelFilter, AppError> {
    raw.trim()
        .parse::<LevelFilter>()
        .map_err(|_| AppError::new(2, format!("invalid log level '{raw}' (expected error, warn, info, debug, trace or off)")))
}

fn handle_plan(args: PlanArgs) -> Result<(), AppError> {
    let table = load_sales(&args.input)?;
    let config = strategy_from_args(&args.strategy)?;
    let registry = ModelRegistry::standard();
    let sku = pipeline::resolve_sku(&table, args.sku.as_deref())?;

    let plan = pipeline::run_plan(&table, &sku, &config, &registry, today(&args.strategy))?;

    println!("{}", crate::report::format_run_summary(&plan, &config));
    println!("{}", crate::report::format_plan_table(&plan.rows, args.rows));

    if let Some(path) = &args.export {
        crate::io::write_plan_csv_file(path, &plan.rows)?;
        info!(path = %path.display(), "plan exported");
    }
    if let Some(path) = &args.summary_json {
        crate::io::write_summary_json(path, &plan.summary)?;
        info!(path = %path.display(), "summary exported");
    }

    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let table = load_sales(&args.input)?;
    let config = strategy_from_args(&args.strategy)?;
    let registry = ModelRegistry::standard();

    let batch = pipeline::run_batch(&table, &config, &registry, today(&args.strategy))?;
    println!("{}", crate::report::format_batch_summary(&batch));

    if let Some(path) = &args.export {
        let plans: Vec<(String, Vec<_>)> = batch
            .plans
            .iter()
            .map(|p| (p.summary.sku.clone(), p.rows.clone()))
            .collect();
        crate::io::write_batch_csv_file(path, &plans)?;
        info!(path = %path.display(), skus = plans.len(), "batch exported");
    }
    if let Some(path) = &args.summary_json {
        let summaries: Vec<_> = batch.plans.iter().map(|p| &p.summary).collect();
        crate::io::write_summary_json(path, &summaries)?;
    }

    if batch.plans.is_empty() {
        if let Some((_, err)) = batch.failures.into_iter().next() {
            return Err(err.into());
        }
    }
    Ok(())
}

fn handle_inspect(args: InputArgs) -> Result<(), AppError> {
    let table = load_sales(&args)?;
    let checks = integrity_report(&table);
    println!("{}", crate::report::format_integrity_report(&table, &checks));
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let files = crate::data::sample::write_sample(
        &args.out,
        crate::data::sample::SampleSpec {
            start: args.start,
            days: args.days,
            seed: args.seed,
        },
    )?;
    println!("wrote {}", files.sales.display());
    for path in [&files.marketing, &files.festivals, &files.events, &files.sku_master] {
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// Read, normalize and enrich the sales upload.
pub fn load_sales(args: &InputArgs) -> Result<SalesTable, AppError> {
    let raw = RawTable::from_path(&args.sales)?;
    let roles = ColumnRoles {
        date: args.date_column.clone(),
        quantity: args.quantity_column.clone(),
        sku: args.sku_column.clone(),
    };
    let mut table = normalize_sales(&raw, &roles)?;

    let companions = Companions {
        marketing: read_optional(args.marketing.as_deref())?,
        festivals: read_optional(args.festivals.as_deref())?,
        events: read_optional(args.events.as_deref())?,
        sku_master: read_optional(args.sku_master.as_deref())?,
    };
    if !companions.is_empty() {
        attach_companions(&mut table, &companions);
    }

    info!(
        rows = table.records.len(),
        skus = table.diagnostics.unique_skus(),
        source = %args.sales.display(),
        "sales loaded"
    );
    Ok(table)
}

fn read_optional(path: Option<&std::path::Path>) -> Result<Option<RawTable>, AppError> {
    path.map(RawTable::from_path).transpose().map_err(AppError::from)
}

/// Resolve the strategy config from file, environment and flags.
pub fn strategy_from_args(args: &StrategyArgs) -> Result<StrategyConfig, AppError> {
    let overrides = StrategyOverrides {
        surge_multiplier: args.surge,
        marketing_lift_pct: args.marketing_lift,
        return_rate_pct: args.return_rate,
        safety_buffer_pct: args.safety_buffer,
        active_festivals: args.festival.clone(),
        peak_lift_pct: args.peak_lift,
        window_lift_pct: args.window_lift,
        lead_time_days: args.lead_time,
        model_choice: args.model,
        business_profile: args.profile,
        forecast_horizon_days: args.horizon,
        ma_span: args.ma_span,
        ma_shape: args.ma_shape,
        knn_k: args.knn_k,
        trend_sensitivity: args.trend_sensitivity,
        marketing_weight: args.marketing_weight,
    };
    let config = load_strategy(LoadOptions {
        config_path: args.config.clone(),
        suggested: args.suggested,
        overrides,
    })?;
    Ok(config)
}

fn today(args: &StrategyArgs) -> NaiveDate {
    args.today.unwrap_or_else(|| Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelChoice;

    #[test]
    fn flags_override_defaults() {
        let args = StrategyArgs {
            model: Some(ModelChoice::Knn),
            surge: Some(1.3),
            festival: vec!["Diwali".to_string()],
            ..StrategyArgs::default()
        };
        let config = strategy_from_args(&args).unwrap();
        assert_eq!(config.model_choice, ModelChoice::Knn);
        assert!((config.surge_multiplier - 1.3).abs() < 1e-12);
        assert!(config.active_festivals.contains("Diwali"));
    }

    #[test]
    fn log_levels_parse() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level(" WARN ").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level("loud").unwrap_err().exit_code(), 2);
    }
}
