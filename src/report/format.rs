//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the models and the overlay stay clean and testable
//! - output changes are localized

use crate::app::pipeline::{BatchOutput, PlanOutput};
use crate::domain::{PlanRow, PlanSummary, StrategyConfig};
use crate::io::ingest::{IntegrityCheck, SalesTable, Severity};

/// Format the KPI block of one SKU's plan.
pub fn format_run_summary(plan: &PlanOutput, config: &StrategyConfig) -> String {
    let s = &plan.summary;
    let mut out = String::new();

    out.push_str("=== dplan - Demand Plan ===\n");
    out.push_str(&format!("SKU: {}\n", s.sku));
    for (key, value) in &s.attributes {
        out.push_str(&format!("  {key}: {value}\n"));
    }
    out.push_str(&format!(
        "History: {} days through {}\n",
        s.history_days, s.last_history_date
    ));
    out.push_str(&format!("Model: {}", s.model_used.display_name()));
    if s.model_used != s.model_requested {
        out.push_str(&format!(" (requested {})", s.model_requested.display_name()));
    }
    out.push('\n');
    if let Some(reason) = &s.fallback_reason {
        out.push_str(&format!("  fallback: {reason}\n"));
    }
    out.push_str(&format!("Profile: {}\n", s.business_profile.display_name()));
    out.push_str(&format!(
        "Levers: surge={:.2}x marketing={:+.1}% returns={:.1}% buffer={:.1}% lead={}d\n",
        config.surge_multiplier,
        config.marketing_lift_pct,
        config.return_rate_pct,
        config.safety_buffer_pct,
        config.lead_time_days,
    ));
    let festivals = config.active_festival_dates();
    if !festivals.is_empty() {
        let parts: Vec<String> = festivals.iter().map(|(name, date)| format!("{name} {date}")).collect();
        out.push_str(&format!("Festivals: {}\n", parts.join(", ")));
    }

    out.push_str(&format!("\nKPIs ({} days):\n", s.horizon_days));
    out.push_str(&format!("- gross demand   : {:.0}\n", s.gross_total));
    out.push_str(&format!("- net demand     : {:.0}\n", s.net_total));
    out.push_str(&format!("- inventory target: {:.0}\n", s.target_total));
    out.push_str(&format!("- avg daily      : {:.2}\n", s.avg_daily_demand));
    out.push_str(&format!("- growth vs 90d  : {}\n", fmt_growth(s.growth_pct)));
    out.push_str(&format!("- ready by       : {}\n", s.production_ready_date));
    if s.negative_clamped + s.ceiling_clamped > 0 {
        out.push_str(&format!(
            "- guards         : {} negative, {} ceiling\n",
            s.negative_clamped, s.ceiling_clamped
        ));
    }
    out.push('\n');

    out
}

/// Format the day-by-day plan table, showing at most `max_rows` rows.
pub fn format_plan_table(rows: &[PlanRow], max_rows: usize) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!("{:<10} {:>12} {:>12} {:>12}", "date", "forecast", "net", "target"),
    );
    push_line(&mut out, format!("{:-<10} {:-<12} {:-<12} {:-<12}", "", "", "", ""));

    for r in rows.iter().take(max_rows) {
        push_line(
            &mut out,
            format!(
                "{:<10} {:>12.2} {:>12.2} {:>12.2}",
                r.date, r.forecast, r.net_demand, r.inventory_target
            ),
        );
    }
    if rows.len() > max_rows {
        out.push_str(&format!("... {} more rows\n", rows.len() - max_rows));
    }

    out
}

/// Format the load diagnostics and health checks.
pub fn format_integrity_report(table: &SalesTable, checks: &[IntegrityCheck]) -> String {
    let d = &table.diagnostics;
    let mut out = String::new();

    out.push_str("=== dplan - Data Health ===\n");
    out.push_str(&format!(
        "Rows: read={} kept={} | SKUs={}\n",
        d.rows_read,
        table.records.len(),
        d.unique_skus()
    ));
    out.push_str(&format!(
        "Repairs: bad dates={} unreadable={} coerced={} negatives={} duplicates merged={}\n",
        d.dropped_bad_dates, d.rows_unreadable, d.coerced_to_zero, d.negatives_clamped, d.duplicates_merged
    ));

    out.push('\n');
    for c in checks {
        out.push_str(&format!("[{}] {:<16} {}\n", severity_tag(c.severity), c.name, c.message));
    }

    if !d.coverage.is_empty() {
        out.push('\n');
        push_line(
            &mut out,
            format!("{:<20} {:>8} {:>8} {:>8}", "sku", "days", "span", "gaps"),
        );
        push_line(&mut out, format!("{:-<20} {:-<8} {:-<8} {:-<8}", "", "", "", ""));
        for (sku, c) in &d.coverage {
            push_line(
                &mut out,
                format!(
                    "{:<20} {:>8} {:>8} {:>8}",
                    truncate(sku, 20),
                    c.observed_days,
                    c.span_days,
                    c.gap_days()
                ),
            );
        }
    }

    for note in &d.notes {
        out.push_str(&format!("note: {note}\n"));
    }
    for e in d.row_errors.iter().take(5) {
        out.push_str(&format!("line {}: {}\n", e.line, e.message));
    }
    if d.row_errors.len() > 5 {
        out.push_str(&format!("... {} more row errors\n", d.row_errors.len() - 5));
    }

    out
}

/// Format one line per SKU of a batch run, plus its failures.
pub fn format_batch_summary(batch: &BatchOutput) -> String {
    let mut out = String::new();
    push_line(
        &mut out,
        format!(
            "{:<20} {:<20} {:>12} {:>12} {:>12} {:>9}",
            "sku", "model", "gross", "net", "target", "growth"
        ),
    );
    push_line(
        &mut out,
        format!("{:-<20} {:-<20} {:-<12} {:-<12} {:-<12} {:-<9}", "", "", "", "", "", ""),
    );
    for plan in &batch.plans {
        push_line(&mut out, batch_row(&plan.summary));
    }

    if !batch.failures.is_empty() {
        out.push_str("\nSkipped:\n");
        for (sku, err) in &batch.failures {
            out.push_str(&format!("- {sku}: {err}\n"));
        }
    }

    out
}

fn batch_row(s: &PlanSummary) -> String {
    let model = if s.fallback_reason.is_some() {
        format!("{}*", s.model_used.display_name())
    } else {
        s.model_used.display_name().to_string()
    };
    format!(
        "{:<20} {:<20} {:>12.0} {:>12.0} {:>12.0} {:>9}",
        truncate(&s.sku, 20),
        truncate(&model, 20),
        s.gross_total,
        s.net_total,
        s.target_total,
        fmt_growth(s.growth_pct),
    )
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn severity_tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "ok",
        Severity::Warning => "warn",
        Severity::Error => "FAIL",
        Severity::Info => "info",
    }
}

fn fmt_growth(growth: Option<f64>) -> String {
    match growth {
        Some(g) => format!("{g:+.1}%"),
        None => "n/a".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BusinessProfile, ModelChoice};
    use crate::models::{GuardStats, ModelForecast};
    use chrono::{Duration, NaiveDate};
    use std::collections::BTreeMap;

    fn plan(sku: &str, fallback: bool) -> PlanOutput {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let rows: Vec<PlanRow> = (0..3)
            .map(|i| PlanRow {
                date: start + Duration::days(i),
                forecast: 100.0,
                net_demand: 90.0,
                inventory_target: 103.5,
            })
            .collect();
        PlanOutput {
            summary: PlanSummary {
                sku: sku.to_string(),
                model_requested: ModelChoice::Heuristic,
                model_used: if fallback { ModelChoice::MovingAverage } else { ModelChoice::Heuristic },
                fallback_reason: fallback.then(|| "too short".to_string()),
                business_profile: BusinessProfile::Fmcg,
                horizon_days: rows.len(),
                history_days: 200,
                last_history_date: start - Duration::days(1),
                gross_total: 300.0,
                net_total: 270.0,
                target_total: 310.5,
                avg_daily_demand: 100.0,
                growth_pct: Some(12.5),
                production_ready_date: start + Duration::days(30),
                negative_clamped: 0,
                ceiling_clamped: 0,
                attributes: BTreeMap::from([("category".to_string(), "Apparel".to_string())]),
            },
            rows,
            forecast: ModelForecast {
                model: ModelChoice::Heuristic,
                points: Vec::new(),
                guard: GuardStats::default(),
            },
        }
    }

    #[test]
    fn summary_mentions_fallback_and_attributes() {
        let text = format_run_summary(&plan("TSHIRT01", true), &StrategyConfig::default());
        assert!(text.contains("SKU: TSHIRT01"));
        assert!(text.contains("category: Apparel"));
        assert!(text.contains("Moving Average (requested Seasonality + Momentum)"));
        assert!(text.contains("fallback: too short"));
        assert!(text.contains("+12.5%"));
    }

    #[test]
    fn plan_table_truncates_rows() {
        let p = plan("A", false);
        let text = format_plan_table(&p.rows, 2);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("2026-01-01"));
        assert_eq!(lines[4], "... 1 more rows");
        assert!(text.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn batch_marks_fallbacks_and_failures() {
        let batch = BatchOutput {
            plans: vec![plan("A", false), plan("B", true)],
            failures: vec![("C".to_string(), crate::error::PlanError::NoDataForSku("C".to_string()))],
        };
        let text = format_batch_summary(&batch);
        assert!(text.contains("Moving Average*"));
        assert!(text.contains("- C: no data for SKU 'C'"));
    }

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd.");
    }
}
