use std::fs;

use chrono::{Duration, NaiveDate};
use demand_planner::app::{load_sales, pipeline};
use demand_planner::cli::InputArgs;
use demand_planner::data::sample::{SampleSpec, write_sample};
use demand_planner::domain::{ModelChoice, StrategyConfig};
use demand_planner::io::{read_summary_json, write_plan_csv_file, write_summary_json};
use demand_planner::models::ModelRegistry;

fn input(sales: std::path::PathBuf) -> InputArgs {
    InputArgs {
        sales,
        marketing: None,
        festivals: None,
        events: None,
        sku_master: None,
        date_column: None,
        quantity_column: None,
        sku_column: None,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

#[test]
fn flat_history_exports_flat_plan() {
    let dir = tempfile::tempdir().unwrap();
    let sales = dir.path().join("sales.csv");
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let mut text = String::from("Order Date,Qty\n");
    for i in 0..365 {
        text.push_str(&format!("{},100\n", start + Duration::days(i)));
    }
    fs::write(&sales, text).unwrap();

    let table = load_sales(&input(sales)).unwrap();
    let sku = pipeline::resolve_sku(&table, None).unwrap();
    let config = StrategyConfig {
        model_choice: ModelChoice::MovingAverage,
        forecast_horizon_days: 30,
        return_rate_pct: 0.0,
        safety_buffer_pct: 0.0,
        ..StrategyConfig::default()
    };
    let plan = pipeline::run_plan(&table, &sku, &config, &ModelRegistry::standard(), today()).unwrap();
    assert_eq!(plan.rows.len(), 30);
    assert_eq!(plan.rows[0].date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());

    let export = dir.path().join("plan.csv");
    write_plan_csv_file(&export, &plan.rows).unwrap();
    let mut reader = csv::Reader::from_path(&export).unwrap();
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 30);
    for r in &records {
        assert_eq!(&r[1], "100.0000");
        assert_eq!(&r[3], "100.0000");
    }
}

#[test]
fn sample_data_with_companions_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_sample(
        dir.path(),
        SampleSpec {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            days: 400,
            seed: 11,
        },
    )
    .unwrap();

    let mut args = input(files.sales.clone());
    args.marketing = Some(files.marketing.clone());
    args.festivals = Some(files.festivals.clone());
    args.events = Some(files.events.clone());
    args.sku_master = Some(files.sku_master.clone());
    let table = load_sales(&args).unwrap();
    assert_eq!(table.skus(), vec!["HOODIE01", "SUNSCREEN01", "TSHIRT01"]);

    let config = StrategyConfig::default();
    let plan = pipeline::run_plan(&table, "HOODIE01", &config, &ModelRegistry::standard(), today()).unwrap();
    assert_eq!(plan.rows.len(), config.forecast_horizon_days);
    assert_eq!(plan.summary.attributes.get("category").map(String::as_str), Some("Apparel"));
    for r in &plan.rows {
        assert!(r.forecast >= 0.0);
        assert!(r.inventory_target >= r.net_demand);
    }

    let json = dir.path().join("summary.json");
    write_summary_json(&json, &plan.summary).unwrap();
    let back = read_summary_json(&json).unwrap();
    assert_eq!(back.sku, "HOODIE01");
    assert_eq!(back.horizon_days, plan.summary.horizon_days);
    assert!((back.gross_total - plan.summary.gross_total).abs() < 1e-6);

    let batch = pipeline::run_batch(&table, &config, &ModelRegistry::standard(), today()).unwrap();
    assert_eq!(batch.plans.len(), 3);
    assert!(batch.failures.is_empty());
}
