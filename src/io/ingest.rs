//! CSV ingest and normalization.
//!
//! This module turns a heterogeneous sales upload into canonical
//! `(date, sku, sales)` records, one per (date, sku).
//!
//! Design goals:
//! - **Strict schema** for required roles (a date column and a quantity column)
//! - **Row-level repair** (drop bad dates, coerce bad quantities to 0, clamp
//!   negatives) with every repair counted in `IngestDiagnostics`
//! - **Deterministic output** ordered by (sku, date)
//! - **Separation of concerns**: no forecasting logic here

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::domain::{CleanedSeries, DEFAULT_SKU, Regressors, SalesRecord};
use crate::error::PlanError;

pub const DATE_SYNONYMS: [&str; 9] = [
    "date",
    "order date",
    "timestamp",
    "ds",
    "day",
    "sale date",
    "sales date",
    "transaction date",
    "invoice date",
];

pub const QUANTITY_SYNONYMS: [&str; 9] = [
    "sales",
    "quantity",
    "qty",
    "sold",
    "units",
    "units sold",
    "y",
    "demand",
    "volume",
];

pub const SKU_SYNONYMS: [&str; 8] = [
    "sku",
    "item",
    "product",
    "product id",
    "sku id",
    "item id",
    "item code",
    "sku code",
];

/// Observed days below this share of the calendar span raise a continuity warning.
pub const CONTINUITY_THRESHOLD: f64 = 0.9;

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// An uploaded table, kept as strings until roles are resolved.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub source: String,
    pub headers: Vec<String>,
    /// `(line, cells)`; lines are 1-based with the header on line 1.
    pub rows: Vec<(usize, Vec<String>)>,
    pub unreadable: Vec<RowError>,
}

impl RawTable {
    pub fn from_path(path: &Path) -> Result<Self, PlanError> {
        let file = File::open(path)
            .map_err(|e| PlanError::Io(format!("Failed to open CSV '{}': {e}", path.display())))?;
        Self::from_reader(file, &path.display().to_string())
    }

    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self, PlanError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| PlanError::Parse(format!("Failed to read CSV headers of '{source}': {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        let mut unreadable = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            // records() starts after the header, lines are 1-based
            let line = idx + 2;
            match result {
                Ok(record) => rows.push((line, record.iter().map(str::to_string).collect())),
                Err(e) => unreadable.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                }),
            }
        }

        Ok(Self {
            source: source.to_string(),
            headers,
            rows,
            unreadable,
        })
    }

    pub(crate) fn header_map(&self) -> HashMap<String, usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (normalize_header(name), idx))
            .collect()
    }

    /// Column index for a role: the explicit name when given, else the first synonym present.
    pub(crate) fn resolve_column(&self, explicit: Option<&str>, synonyms: &[&str]) -> Result<Option<usize>, PlanError> {
        let map = self.header_map();
        if let Some(name) = explicit {
            return map.get(&normalize_header(name)).copied().map(Some).ok_or_else(|| {
                PlanError::Schema(format!("column '{name}' not found in '{}'", self.source))
            });
        }
        Ok(synonyms.iter().find_map(|s| map.get(*s).copied()))
    }
}

/// Lowercase, trimmed, BOM-free header with `_`/`-` read as spaces.
pub fn normalize_header(name: &str) -> String {
    // Excel tends to prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}').to_lowercase();
    name.replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Explicit column names overriding synonym resolution.
#[derive(Debug, Clone, Default)]
pub struct ColumnRoles {
    pub date: Option<String>,
    pub quantity: Option<String>,
    pub sku: Option<String>,
}

/// Per-SKU calendar coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkuCoverage {
    pub observed_days: usize,
    pub span_days: usize,
}

impl SkuCoverage {
    pub fn gap_days(&self) -> usize {
        self.span_days.saturating_sub(self.observed_days)
    }

    pub fn ratio(&self) -> f64 {
        if self.span_days == 0 {
            1.0
        } else {
            self.observed_days as f64 / self.span_days as f64
        }
    }
}

/// Counts of everything ingest repaired or dropped.
#[derive(Debug, Clone, Default)]
pub struct IngestDiagnostics {
    pub rows_read: usize,
    pub rows_unreadable: usize,
    pub dropped_bad_dates: usize,
    pub coerced_to_zero: usize,
    pub negatives_clamped: usize,
    pub duplicates_merged: usize,
    pub sku_column_missing: bool,
    pub coverage: BTreeMap<String, SkuCoverage>,
    pub row_errors: Vec<RowError>,
    /// Free-form notes (e.g. companion tables skipped).
    pub notes: Vec<String>,
}

impl IngestDiagnostics {
    pub fn unique_skus(&self) -> usize {
        self.coverage.len()
    }
}

/// Normalized multi-SKU sales plus everything learned while loading it.
#[derive(Debug, Clone, Default)]
pub struct SalesTable {
    /// Ordered by (sku, date); unique per (sku, date).
    pub records: Vec<SalesRecord>,
    /// SKU master attributes, per SKU.
    pub attributes: BTreeMap<String, BTreeMap<String, String>>,
    /// Named festival dates discovered in a festival companion table.
    pub festival_dates: Vec<(String, NaiveDate)>,
    pub diagnostics: IngestDiagnostics,
}

impl SalesTable {
    /// Distinct SKUs in sorted order.
    pub fn skus(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for r in &self.records {
            if out.last() != Some(&r.sku) {
                out.push(r.sku.clone());
            }
        }
        out
    }

    /// History of one SKU, or `None` when it has no records.
    pub fn series(&self, sku: &str) -> Option<CleanedSeries> {
        let records: Vec<SalesRecord> = self.records.iter().filter(|r| r.sku == sku).cloned().collect();
        if records.is_empty() {
            None
        } else {
            Some(CleanedSeries::new(sku, records))
        }
    }

    pub(crate) fn refresh_coverage(&mut self) {
        self.diagnostics.coverage = coverage_by_sku(&self.records);
    }
}

/// Resolve roles and normalize a raw sales upload.
pub fn normalize_sales(table: &RawTable, roles: &ColumnRoles) -> Result<SalesTable, PlanError> {
    let date_idx = table
        .resolve_column(roles.date.as_deref(), &DATE_SYNONYMS)?
        .ok_or_else(|| {
            PlanError::Schema(format!(
                "no date column in '{}' (looked for: {})",
                table.source,
                DATE_SYNONYMS.join(", ")
            ))
        })?;
    let qty_idx = table
        .resolve_column(roles.quantity.as_deref(), &QUANTITY_SYNONYMS)?
        .ok_or_else(|| {
            PlanError::Schema(format!(
                "no quantity column in '{}' (looked for: {})",
                table.source,
                QUANTITY_SYNONYMS.join(", ")
            ))
        })?;
    let sku_idx = table.resolve_column(roles.sku.as_deref(), &SKU_SYNONYMS)?;

    let mut diagnostics = IngestDiagnostics {
        rows_read: table.rows.len() + table.unreadable.len(),
        rows_unreadable: table.unreadable.len(),
        sku_column_missing: sku_idx.is_none(),
        row_errors: table.unreadable.clone(),
        ..IngestDiagnostics::default()
    };
    if sku_idx.is_none() {
        debug!(source = %table.source, "no SKU column, using {}", DEFAULT_SKU);
    }

    let mut records = Vec::with_capacity(table.rows.len());
    for (line, cells) in &table.rows {
        let cell = |idx: usize| cells.get(idx).map(|s| s.trim()).unwrap_or("");

        let raw_date = cell(date_idx);
        let Some(date) = parse_date(raw_date) else {
            diagnostics.dropped_bad_dates += 1;
            diagnostics.row_errors.push(RowError {
                line: *line,
                message: format!("Invalid date '{raw_date}', row dropped."),
            });
            continue;
        };

        let sales = match parse_quantity(cell(qty_idx)) {
            Some(v) if v < 0.0 => {
                diagnostics.negatives_clamped += 1;
                0.0
            }
            Some(v) => v,
            None => {
                diagnostics.coerced_to_zero += 1;
                0.0
            }
        };

        let sku = sku_idx
            .map(cell)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SKU)
            .to_string();

        records.push(SalesRecord {
            date,
            sku,
            sales,
            regressors: Regressors::default(),
        });
    }

    let before = records.len();
    let records = normalize_records(records);
    diagnostics.duplicates_merged = before - records.len();

    if diagnostics.dropped_bad_dates > 0 || diagnostics.coerced_to_zero > 0 || diagnostics.negatives_clamped > 0 {
        warn!(
            source = %table.source,
            dropped = diagnostics.dropped_bad_dates,
            coerced = diagnostics.coerced_to_zero,
            clamped = diagnostics.negatives_clamped,
            "repaired sales rows"
        );
    }

    let mut out = SalesTable {
        records,
        diagnostics,
        ..SalesTable::default()
    };
    out.refresh_coverage();
    Ok(out)
}

/// Aggregate records to one per (sku, date), ordered by (sku, date).
///
/// Sales and spend add up, flags are OR-ed, negatives become 0. Applying it to
/// its own output changes nothing.
pub fn normalize_records(records: Vec<SalesRecord>) -> Vec<SalesRecord> {
    let mut merged: BTreeMap<(String, NaiveDate), SalesRecord> = BTreeMap::new();
    for mut record in records {
        record.sales = record.sales.max(0.0);
        match merged.get_mut(&(record.sku.clone(), record.date)) {
            Some(existing) => {
                existing.sales += record.sales;
                existing.regressors = existing.regressors.merge(record.regressors);
            }
            None => {
                merged.insert((record.sku.clone(), record.date), record);
            }
        }
    }
    merged.into_values().collect()
}

fn coverage_by_sku(records: &[SalesRecord]) -> BTreeMap<String, SkuCoverage> {
    let mut bounds: BTreeMap<&str, (NaiveDate, NaiveDate, usize)> = BTreeMap::new();
    for r in records {
        bounds
            .entry(r.sku.as_str())
            .and_modify(|(first, last, n)| {
                *first = (*first).min(r.date);
                *last = (*last).max(r.date);
                *n += 1;
            })
            .or_insert((r.date, r.date, 1));
    }
    bounds
        .into_iter()
        .map(|(sku, (first, last, n))| {
            let span = (last - first).num_days() as usize + 1;
            (
                sku.to_string(),
                SkuCoverage {
                    observed_days: n,
                    span_days: span,
                },
            )
        })
        .collect()
}

/// Parse a calendar day; day-first for ambiguous slash/dash forms, time of day dropped.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    const DATE_FMTS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
    const DATETIME_FMTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FMTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Finite number, tolerating thousands separators; `None` when not numeric.
pub fn parse_quantity(s: &str) -> Option<f64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    let v = cleaned.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

/// Health-check severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warning,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityCheck {
    pub name: &'static str,
    pub severity: Severity,
    pub message: String,
}

/// Four-point health check: missing values, continuity, negatives, SKU count.
pub fn integrity_report(table: &SalesTable) -> Vec<IntegrityCheck> {
    let d = &table.diagnostics;
    let mut checks = Vec::with_capacity(4);

    let missing = d.dropped_bad_dates + d.coerced_to_zero + d.rows_unreadable;
    checks.push(if table.records.is_empty() {
        IntegrityCheck {
            name: "missing values",
            severity: Severity::Error,
            message: format!("no usable rows out of {} read", d.rows_read),
        }
    } else if missing == 0 {
        IntegrityCheck {
            name: "missing values",
            severity: Severity::Ok,
            message: "no missing dates or quantities".to_string(),
        }
    } else {
        IntegrityCheck {
            name: "missing values",
            severity: Severity::Warning,
            message: format!(
                "{} rows dropped (bad date or unreadable), {} quantities coerced to 0",
                d.dropped_bad_dates + d.rows_unreadable,
                d.coerced_to_zero
            ),
        }
    });

    let sparse: Vec<String> = d
        .coverage
        .iter()
        .filter(|(_, c)| c.ratio() < CONTINUITY_THRESHOLD)
        .map(|(sku, c)| format!("{sku} ({} of {} days)", c.observed_days, c.span_days))
        .collect();
    checks.push(if sparse.is_empty() {
        IntegrityCheck {
            name: "continuity",
            severity: Severity::Ok,
            message: format!("every SKU covers at least {:.0}% of its date span", CONTINUITY_THRESHOLD * 100.0),
        }
    } else {
        IntegrityCheck {
            name: "continuity",
            severity: Severity::Warning,
            message: format!("date gaps in {}", sparse.join(", ")),
        }
    });

    checks.push(if d.negatives_clamped == 0 {
        IntegrityCheck {
            name: "negative values",
            severity: Severity::Ok,
            message: "no negative quantities".to_string(),
        }
    } else {
        IntegrityCheck {
            name: "negative values",
            severity: Severity::Warning,
            message: format!("{} negative quantities clamped to 0", d.negatives_clamped),
        }
    });

    checks.push(IntegrityCheck {
        name: "sku count",
        severity: Severity::Info,
        message: if d.sku_column_missing {
            format!("no SKU column; all rows assigned to {}", DEFAULT_SKU)
        } else {
            format!("{} unique SKUs", d.unique_skus())
        },
    });

    checks
}
