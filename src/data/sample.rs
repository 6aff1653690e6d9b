//! Seeded synthetic sales data for demos and tests.
//!
//! Three demo SKUs share a base level of 100 units/day with uniform noise of
//! ±20. HOODIE01 gets a winter bump (Nov-Jan) and SUNSCREEN01 a summer bump
//! (Apr-Jun). Companion tables (marketing, festivals, events, SKU master) are
//! written next to the sales file so every ingest path can be exercised.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Bernoulli, Uniform};
use tracing::info;

use crate::error::PlanError;

pub const DEMO_SKUS: [&str; 3] = ["TSHIRT01", "HOODIE01", "SUNSCREEN01"];

const BASE_UNITS: i64 = 100;
const NOISE: i64 = 20;
const CAMPAIGN_PROBABILITY: f64 = 0.15;

#[derive(Debug, Clone, Copy)]
pub struct SampleSpec {
    pub start: NaiveDate,
    pub days: usize,
    pub seed: u64,
}

/// One generated (date, SKU) row.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDay {
    pub date: NaiveDate,
    pub sku: &'static str,
    pub units: i64,
    pub ad_spend: i64,
}

/// Paths of the files written by `write_sample`.
#[derive(Debug, Clone)]
pub struct SampleFiles {
    pub sales: PathBuf,
    pub marketing: PathBuf,
    pub festivals: PathBuf,
    pub events: PathBuf,
    pub sku_master: PathBuf,
}

fn seasonal_bump(sku: &str, month: u32) -> i64 {
    match (sku, month) {
        ("HOODIE01", 11 | 12 | 1) => 50,
        ("SUNSCREEN01", 4..=6) => 60,
        _ => 0,
    }
}

pub fn generate_sample(spec: SampleSpec) -> Result<Vec<SampleDay>, PlanError> {
    if spec.days == 0 {
        return Err(PlanError::InvalidConfig("sample days must be > 0".to_string()));
    }
    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = Uniform::new(-NOISE, NOISE);
    let spend = Uniform::new(2000, 10_000);
    let campaign = Bernoulli::new(CAMPAIGN_PROBABILITY)
        .map_err(|e| PlanError::Numeric(format!("campaign distribution error: {e}")))?;

    let mut out = Vec::with_capacity(spec.days * DEMO_SKUS.len());
    for offset in 0..spec.days {
        let date = spec
            .start
            .checked_add_signed(Duration::days(offset as i64))
            .ok_or_else(|| PlanError::InvalidConfig(format!("{} sample days from {} overflow the calendar", spec.days, spec.start)))?;
        for sku in DEMO_SKUS {
            let base = BASE_UNITS + seasonal_bump(sku, date.month());
            let units = (base + rng.sample(noise)).max(0);
            let ad_spend = if rng.sample(campaign) { rng.sample(spend) } else { 0 };
            out.push(SampleDay {
                date,
                sku,
                units,
                ad_spend,
            });
        }
    }
    Ok(out)
}

/// Generate the demo data set and write it as CSV files into `dir`.
pub fn write_sample(dir: &Path, spec: SampleSpec) -> Result<SampleFiles, PlanError> {
    let days = generate_sample(spec)?;
    fs::create_dir_all(dir)
        .map_err(|e| PlanError::Io(format!("could not create '{}': {e}", dir.display())))?;

    let files = SampleFiles {
        sales: dir.join("sales.csv"),
        marketing: dir.join("marketing.csv"),
        festivals: dir.join("festivals.csv"),
        events: dir.join("events.csv"),
        sku_master: dir.join("sku_master.csv"),
    };

    write_rows(
        &files.sales,
        ["date", "sku", "units_sold"],
        days.iter().map(|d| [d.date.to_string(), d.sku.to_string(), d.units.to_string()]),
    )?;
    write_rows(
        &files.marketing,
        ["date", "sku", "ad_spend", "campaign_type"],
        days.iter().map(|d| {
            [
                d.date.to_string(),
                d.sku.to_string(),
                d.ad_spend.to_string(),
                "Digital".to_string(),
            ]
        }),
    )?;

    let year = spec.start.year();
    let festivals = [
        (1, 1, "New Year", "0.2"),
        (3, 25, "Holi", "0.3"),
        (8, 15, "Independence Day", "0.2"),
        (11, 1, "Diwali", "0.5"),
        (12, 25, "Christmas", "0.2"),
    ];
    write_rows(
        &files.festivals,
        ["date", "festival_name", "impact_weight"],
        festivals.iter().filter_map(|&(m, d, name, weight)| {
            NaiveDate::from_ymd_opt(year, m, d).map(|date| [date.to_string(), name.to_string(), weight.to_string()])
        }),
    )?;

    let events = [
        (2, 10, "Wedding Season", "demand_up"),
        (4, 20, "Heatwave", "demand_up"),
        (6, 15, "Competitor Launch", "demand_down"),
        (10, 5, "Cricket Tournament", "demand_up"),
    ];
    write_rows(
        &files.events,
        ["date", "event_name", "impact_type"],
        events.iter().filter_map(|&(m, d, name, kind)| {
            NaiveDate::from_ymd_opt(year, m, d).map(|date| [date.to_string(), name.to_string(), kind.to_string()])
        }),
    )?;

    write_rows(
        &files.sku_master,
        ["sku", "category", "season_type"],
        [
            ["TSHIRT01", "Apparel", "All"],
            ["HOODIE01", "Apparel", "Winter"],
            ["SUNSCREEN01", "Skincare", "Summer"],
        ],
    )?;

    info!(dir = %dir.display(), rows = days.len(), seed = spec.seed, "sample data written");
    Ok(files)
}

fn write_rows<const N: usize, I, R>(path: &Path, header: [&str; N], rows: I) -> Result<(), PlanError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let io_err = |e: csv::Error| PlanError::Io(format!("could not write '{}': {e}", path.display()));
    let mut out = csv::Writer::from_path(path).map_err(io_err)?;
    out.write_record(header).map_err(io_err)?;
    for row in rows {
        out.write_record(row).map_err(io_err)?;
    }
    out.flush()
        .map_err(|e| PlanError::Io(format!("could not flush '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(days: usize, seed: u64) -> SampleSpec {
        SampleSpec {
            start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            days,
            seed,
        }
    }

    #[test]
    fn same_seed_same_data() {
        let a = generate_sample(spec(60, 7)).unwrap();
        let b = generate_sample(spec(60, 7)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 60 * DEMO_SKUS.len());
    }

    #[test]
    fn seasonal_bumps_and_bounds() {
        let days = generate_sample(spec(366, 1)).unwrap();
        for d in &days {
            let base = 100 + seasonal_bump(d.sku, d.date.month());
            assert!(d.units >= base - 20 && d.units < base + 20, "{d:?}");
            assert!(d.ad_spend == 0 || (2000..10_000).contains(&d.ad_spend));
        }
        let mean = |sku: &str, month: u32| {
            let v: Vec<f64> = days
                .iter()
                .filter(|d| d.sku == sku && d.date.month() == month)
                .map(|d| d.units as f64)
                .collect();
            v.iter().sum::<f64>() / v.len() as f64
        };
        assert!(mean("HOODIE01", 12) > mean("HOODIE01", 7) + 30.0);
        assert!(mean("SUNSCREEN01", 5) > mean("SUNSCREEN01", 9) + 30.0);
    }

    #[test]
    fn zero_days_rejected() {
        assert!(generate_sample(spec(0, 1)).is_err());
    }

    #[test]
    fn writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_sample(dir.path(), spec(10, 3)).unwrap();
        let sales = fs::read_to_string(&files.sales).unwrap();
        assert!(sales.starts_with("date,sku,units_sold\n"));
        assert_eq!(sales.lines().count(), 1 + 10 * DEMO_SKUS.len());
        assert!(fs::read_to_string(&files.festivals).unwrap().contains("2024-11-01,Diwali,0.5"));
        assert!(files.marketing.exists() && files.events.exists() && files.sku_master.exists());
    }
}
