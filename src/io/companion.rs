//! Companion tables left-joined onto normalized sales.
//!
//! - marketing spend, on (date, sku) or on date alone
//! - festival calendar, on date (named rows also extend the festival calendar)
//! - event calendar, on date
//! - SKU master attributes, on sku
//!
//! A companion table whose join key cannot be found is skipped with a warning
//! and a diagnostic note; the affected regressors stay at zero.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::io::ingest::{DATE_SYNONYMS, RawTable, SKU_SYNONYMS, SalesTable, parse_date, parse_quantity};

pub const SPEND_SYNONYMS: [&str; 5] = ["marketing spend", "ad spend", "spend", "budget", "marketing"];
pub const FESTIVAL_FLAG_SYNONYMS: [&str; 2] = ["festival flag", "is festival"];
pub const FESTIVAL_NAME_SYNONYMS: [&str; 3] = ["festival name", "festival", "name"];
pub const EVENT_FLAG_SYNONYMS: [&str; 2] = ["event flag", "is event"];

/// Attribute value for SKUs missing from the master table.
pub const UNKNOWN_ATTRIBUTE: &str = "Unknown";

/// Optional companion uploads.
#[derive(Debug, Clone, Default)]
pub struct Companions {
    pub marketing: Option<RawTable>,
    pub festivals: Option<RawTable>,
    pub events: Option<RawTable>,
    pub sku_master: Option<RawTable>,
}

impl Companions {
    pub fn is_empty(&self) -> bool {
        self.marketing.is_none() && self.festivals.is_none() && self.events.is_none() && self.sku_master.is_none()
    }
}

/// Join every supplied companion table onto `sales`.
pub fn attach_companions(sales: &mut SalesTable, companions: &Companions) {
    if let Some(table) = &companions.marketing {
        join_marketing(sales, table);
    }
    if let Some(table) = &companions.festivals {
        join_festivals(sales, table);
    }
    if let Some(table) = &companions.events {
        join_events(sales, table);
    }
    if let Some(table) = &companions.sku_master {
        join_sku_master(sales, table);
    }
}

fn skip(sales: &mut SalesTable, kind: &str, table: &RawTable, reason: &str) {
    warn!(source = %table.source, kind, reason, "companion table skipped");
    sales
        .diagnostics
        .notes
        .push(format!("{kind} table '{}' skipped: {reason}", table.source));
}

/// Resolve a column by synonyms only; unresolvable is `None`.
fn column(table: &RawTable, synonyms: &[&str]) -> Option<usize> {
    table.resolve_column(None, synonyms).ok().flatten()
}

fn cell(cells: &[String], idx: usize) -> &str {
    cells.get(idx).map(|s| s.trim()).unwrap_or("")
}

fn join_marketing(sales: &mut SalesTable, table: &RawTable) {
    let Some(date_idx) = column(table, &DATE_SYNONYMS) else {
        return skip(sales, "marketing", table, "no date column");
    };
    let Some(spend_idx) = column(table, &SPEND_SYNONYMS) else {
        return skip(sales, "marketing", table, "no spend column");
    };
    let sku_idx = column(table, &SKU_SYNONYMS);

    let mut by_key: HashMap<(Option<String>, NaiveDate), f64> = HashMap::new();
    for (_, cells) in &table.rows {
        let Some(date) = parse_date(cell(cells, date_idx)) else {
            continue;
        };
        let sku = sku_idx.map(|i| cell(cells, i).to_string()).filter(|s| !s.is_empty());
        let spend = parse_quantity(cell(cells, spend_idx)).unwrap_or(0.0).max(0.0);
        *by_key.entry((sku, date)).or_insert(0.0) += spend;
    }

    let mut matched = 0usize;
    for record in &mut sales.records {
        let key = if sku_idx.is_some() {
            (Some(record.sku.clone()), record.date)
        } else {
            (None, record.date)
        };
        if let Some(spend) = by_key.get(&key) {
            record.regressors.marketing_spend = *spend;
            matched += 1;
        }
    }
    info!(source = %table.source, matched, keyed_by_sku = sku_idx.is_some(), "marketing spend joined");
}

fn join_festivals(sales: &mut SalesTable, table: &RawTable) {
    let Some(date_idx) = column(table, &DATE_SYNONYMS) else {
        return skip(sales, "festival", table, "no date column");
    };
    let flag_idx = column(table, &FESTIVAL_FLAG_SYNONYMS);
    let name_idx = column(table, &FESTIVAL_NAME_SYNONYMS);

    let mut flags: HashMap<NaiveDate, f64> = HashMap::new();
    for (_, cells) in &table.rows {
        let Some(date) = parse_date(cell(cells, date_idx)) else {
            continue;
        };
        let flag = flag_idx
            .map(|i| parse_quantity(cell(cells, i)).unwrap_or(0.0))
            .unwrap_or(1.0);
        let slot = flags.entry(date).or_insert(0.0);
        *slot = slot.max(if flag > 0.0 { 1.0 } else { 0.0 });

        if let Some(name) = name_idx.map(|i| cell(cells, i)).filter(|s| !s.is_empty()) {
            sales.festival_dates.push((name.to_string(), date));
        }
    }

    for record in &mut sales.records {
        if let Some(flag) = flags.get(&record.date) {
            record.regressors.festival_flag = record.regressors.festival_flag.max(*flag);
        }
    }
    info!(source = %table.source, dates = flags.len(), named = sales.festival_dates.len(), "festival calendar joined");
}

fn join_events(sales: &mut SalesTable, table: &RawTable) {
    let Some(date_idx) = column(table, &DATE_SYNONYMS) else {
        return skip(sales, "event", table, "no date column");
    };
    let flag_idx = column(table, &EVENT_FLAG_SYNONYMS);

    let mut flags: HashMap<NaiveDate, f64> = HashMap::new();
    for (_, cells) in &table.rows {
        let Some(date) = parse_date(cell(cells, date_idx)) else {
            continue;
        };
        let flag = flag_idx
            .map(|i| parse_quantity(cell(cells, i)).unwrap_or(0.0))
            .unwrap_or(1.0);
        let slot = flags.entry(date).or_insert(0.0);
        *slot = slot.max(if flag > 0.0 { 1.0 } else { 0.0 });
    }

    for record in &mut sales.records {
        if let Some(flag) = flags.get(&record.date) {
            record.regressors.event_flag = record.regressors.event_flag.max(*flag);
        }
    }
    info!(source = %table.source, dates = flags.len(), "event calendar joined");
}

fn join_sku_master(sales: &mut SalesTable, table: &RawTable) {
    let Some(sku_idx) = column(table, &SKU_SYNONYMS) else {
        return skip(sales, "sku master", table, "no sku column");
    };
    let attribute_columns: Vec<(usize, String)> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != sku_idx)
        .map(|(idx, name)| (idx, name.trim().trim_start_matches('\u{feff}').to_string()))
        .collect();

    let mut master: HashMap<String, BTreeMap<String, String>> = HashMap::new();
    for (_, cells) in &table.rows {
        let sku = cell(cells, sku_idx);
        if sku.is_empty() {
            continue;
        }
        let attrs = attribute_columns
            .iter()
            .map(|(idx, name)| {
                let value = cell(cells, *idx);
                let value = if value.is_empty() { UNKNOWN_ATTRIBUTE } else { value };
                (name.clone(), value.to_string())
            })
            .collect();
        master.insert(sku.to_string(), attrs);
    }

    for sku in sales.skus() {
        let attrs = master.get(&sku).cloned().unwrap_or_else(|| {
            attribute_columns
                .iter()
                .map(|(_, name)| (name.clone(), UNKNOWN_ATTRIBUTE.to_string()))
                .collect()
        });
        sales.attributes.insert(sku, attrs);
    }
    info!(source = %table.source, skus = master.len(), "sku master joined");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::{ColumnRoles, normalize_sales};

    fn table(csv: &str, source: &str) -> RawTable {
        RawTable::from_reader(csv.as_bytes(), source).unwrap()
    }

    fn sales() -> SalesTable {
        let raw = table(
            "date,sku,sales\n2024-01-01,A,10\n2024-01-02,A,11\n2024-01-01,B,5\n2024-01-02,B,6\n",
            "sales.csv",
        );
        normalize_sales(&raw, &ColumnRoles::default()).unwrap()
    }

    fn find(sales: &SalesTable, sku: &str, day: u32) -> crate::domain::Regressors {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        sales
            .records
            .iter()
            .find(|r| r.sku == sku && r.date == date)
            .unwrap()
            .regressors
    }

    #[test]
    fn marketing_joins_on_date_and_sku() {
        let mut s = sales();
        let companions = Companions {
            marketing: Some(table("Date,SKU,Ad Spend\n2024-01-01,A,300\n", "mkt.csv")),
            ..Companions::default()
        };
        attach_companions(&mut s, &companions);
        assert_eq!(find(&s, "A", 1).marketing_spend, 300.0);
        assert_eq!(find(&s, "B", 1).marketing_spend, 0.0);
        assert_eq!(find(&s, "A", 2).marketing_spend, 0.0);
    }

    #[test]
    fn marketing_without_sku_applies_to_every_sku() {
        let mut s = sales();
        let companions = Companions {
            marketing: Some(table("date,budget\n2024-01-02,50\n2024-01-02,25\n", "mkt.csv")),
            ..Companions::default()
        };
        attach_companions(&mut s, &companions);
        assert_eq!(find(&s, "A", 2).marketing_spend, 75.0);
        assert_eq!(find(&s, "B", 2).marketing_spend, 75.0);
    }

    #[test]
    fn festivals_set_flags_and_register_names() {
        let mut s = sales();
        let companions = Companions {
            festivals: Some(table("date,festival name\n2024-01-02,New Year Sale\n", "fest.csv")),
            events: Some(table("date,event flag\n2024-01-01,1\n2024-01-02,0\n", "events.csv")),
            ..Companions::default()
        };
        attach_companions(&mut s, &companions);
        assert_eq!(find(&s, "A", 2).festival_flag, 1.0);
        assert_eq!(find(&s, "A", 1).festival_flag, 0.0);
        assert_eq!(find(&s, "B", 1).event_flag, 1.0);
        assert_eq!(find(&s, "B", 2).event_flag, 0.0);
        assert_eq!(s.festival_dates.len(), 1);
        assert_eq!(s.festival_dates[0].0, "New Year Sale");
    }

    #[test]
    fn sku_master_defaults_to_unknown() {
        let mut s = sales();
        let companions = Companions {
            sku_master: Some(table("sku,category,brand\nA,Apparel,\n", "master.csv")),
            ..Companions::default()
        };
        attach_companions(&mut s, &companions);
        assert_eq!(s.attributes["A"]["category"], "Apparel");
        assert_eq!(s.attributes["A"]["brand"], UNKNOWN_ATTRIBUTE);
        assert_eq!(s.attributes["B"]["category"], UNKNOWN_ATTRIBUTE);
    }

    #[test]
    fn companion_without_key_is_skipped() {
        let mut s = sales();
        let companions = Companions {
            marketing: Some(table("week,spend\n1,100\n", "mkt.csv")),
            sku_master: Some(table("code,category\nA,x\n", "master.csv")),
            ..Companions::default()
        };
        attach_companions(&mut s, &companions);
        assert!(s.records.iter().all(|r| r.regressors.marketing_spend == 0.0));
        assert!(s.attributes.is_empty());
        assert_eq!(s.diagnostics.notes.len(), 2);
    }
}
