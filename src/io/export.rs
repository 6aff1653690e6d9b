//! Export plans to CSV and summaries to JSON.
//!
//! The CSV is meant to be easy to consume in spreadsheets: ISO dates, values
//! rounded to 4 decimals, one row per day (per SKU for batch runs).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{PlanRow, PlanSummary};
use crate::error::PlanError;

const PLAN_HEADER: [&str; 4] = ["date", "forecast", "net_demand", "inventory_target"];

fn plan_fields(row: &PlanRow) -> [String; 4] {
    [
        row.date.to_string(),
        format!("{:.4}", row.forecast),
        format!("{:.4}", row.net_demand),
        format!("{:.4}", row.inventory_target),
    ]
}

fn csv_error(e: csv::Error) -> PlanError {
    PlanError::Io(format!("Failed to write export CSV: {e}"))
}

/// Write one SKU's plan as CSV.
pub fn write_plan_csv<W: Write>(writer: W, rows: &[PlanRow]) -> Result<(), PlanError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(PLAN_HEADER).map_err(csv_error)?;
    for row in rows {
        out.write_record(plan_fields(row)).map_err(csv_error)?;
    }
    out.flush()
        .map_err(|e| PlanError::Io(format!("Failed to flush export CSV: {e}")))
}

/// Write several SKUs' plans as one CSV with a leading `sku` column.
pub fn write_batch_csv<W: Write>(writer: W, plans: &[(String, Vec<PlanRow>)]) -> Result<(), PlanError> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["sku"];
    header.extend(PLAN_HEADER);
    out.write_record(&header).map_err(csv_error)?;
    for (sku, rows) in plans {
        for row in rows {
            let [date, forecast, net, target] = plan_fields(row);
            out.write_record([sku.as_str(), date.as_str(), forecast.as_str(), net.as_str(), target.as_str()])
                .map_err(csv_error)?;
        }
    }
    out.flush()
        .map_err(|e| PlanError::Io(format!("Failed to flush export CSV: {e}")))
}

fn create(path: &Path, what: &str) -> Result<File, PlanError> {
    File::create(path).map_err(|e| PlanError::Io(format!("Failed to create {what} '{}': {e}", path.display())))
}

pub fn write_plan_csv_file(path: &Path, rows: &[PlanRow]) -> Result<(), PlanError> {
    write_plan_csv(create(path, "export CSV")?, rows)
}

pub fn write_batch_csv_file(path: &Path, plans: &[(String, Vec<PlanRow>)]) -> Result<(), PlanError> {
    write_batch_csv(create(path, "export CSV")?, plans)
}

/// Write one summary, or a list of them, as pretty JSON.
pub fn write_summary_json<T: Serialize + ?Sized>(path: &Path, summary: &T) -> Result<(), PlanError> {
    let file = create(path, "summary JSON")?;
    serde_json::to_writer_pretty(file, summary)
        .map_err(|e| PlanError::Io(format!("Failed to write summary JSON: {e}")))
}

/// Read back a single-SKU summary JSON.
pub fn read_summary_json(path: &Path) -> Result<PlanSummary, PlanError> {
    let file = File::open(path)
        .map_err(|e| PlanError::Io(format!("Failed to open summary JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| PlanError::Parse(format!("Invalid summary JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(day: u32, forecast: f64) -> PlanRow {
        PlanRow {
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            forecast,
            net_demand: forecast * 0.9,
            inventory_target: forecast * 0.9 * 1.15,
        }
    }

    #[test]
    fn plan_csv_layout() {
        let mut buf = Vec::new();
        write_plan_csv(&mut buf, &[row(1, 100.0), row(2, 1.0 / 3.0)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,forecast,net_demand,inventory_target");
        assert_eq!(lines[1], "2026-01-01,100.0000,90.0000,103.5000");
        assert!(lines[2].starts_with("2026-01-02,0.3333,"));
    }

    #[test]
    fn batch_csv_prefixes_sku() {
        let mut buf = Vec::new();
        let plans = vec![
            ("A".to_string(), vec![row(1, 10.0)]),
            ("B".to_string(), vec![row(1, 20.0)]),
        ];
        write_batch_csv(&mut buf, &plans).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sku,date,forecast,net_demand,inventory_target");
        assert!(lines[1].starts_with("A,2026-01-01,10.0000"));
        assert!(lines[2].starts_with("B,2026-01-01,20.0000"));
    }
}
