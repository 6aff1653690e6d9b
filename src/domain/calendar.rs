//! Calendar features and the festival calendar.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};

/// Built-in festival dates (name, year, month, day).
const BUILTIN_FESTIVALS: [(&str, i32, u32, u32); 5] = [
    ("Christmas", 2026, 12, 25),
    ("Diwali", 2026, 11, 8),
    ("Eid", 2026, 3, 20),
    ("Holi", 2026, 3, 3),
    ("Black Friday", 2026, 11, 27),
];

/// Calendar-derived features of a single day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayFeatures {
    pub month: u32,
    pub day_of_month: u32,
    /// Monday = 0 .. Sunday = 6.
    pub weekday: u32,
    pub is_weekend: bool,
    /// October through December.
    pub is_festival_season: bool,
}

pub fn day_features(date: NaiveDate) -> DayFeatures {
    let weekday = date.weekday().num_days_from_monday();
    DayFeatures {
        month: date.month(),
        day_of_month: date.day(),
        weekday,
        is_weekend: weekday >= 5,
        is_festival_season: matches!(date.month(), 10..=12),
    }
}

/// Named festival dates, looked up case-insensitively.
///
/// A festival may carry several dates (one per year seen in a companion
/// table plus the built-in upcoming date).
#[derive(Debug, Clone, PartialEq)]
pub struct FestivalCalendar {
    /// Keyed by lowercase name; value keeps the first display name seen.
    entries: BTreeMap<String, (String, BTreeSet<NaiveDate>)>,
}

impl Default for FestivalCalendar {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FestivalCalendar {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut calendar = Self::empty();
        for (name, y, m, d) in BUILTIN_FESTIVALS {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                calendar.insert(name, date);
            }
        }
        calendar
    }

    /// Add a date to a festival. Existing dates are kept.
    pub fn insert(&mut self, name: &str, date: NaiveDate) {
        let name = name.trim();
        self.entries
            .entry(name.to_lowercase())
            .or_insert_with(|| (name.to_string(), BTreeSet::new()))
            .1
            .insert(date);
    }

    /// All dates of a festival, ascending. Empty when unknown.
    pub fn dates(&self, name: &str) -> Vec<NaiveDate> {
        self.entries
            .get(&name.trim().to_lowercase())
            .map(|(_, dates)| dates.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .get(&name.trim().to_lowercase())
            .is_some_and(|(_, dates)| !dates.is_empty())
    }

    /// Display names in lookup order.
    pub fn names(&self) -> Vec<String> {
        self.entries.values().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_is_case_insensitive() {
        let calendar = FestivalCalendar::builtin();
        assert_eq!(calendar.len(), 5);
        assert_eq!(calendar.dates("diwali"), vec![NaiveDate::from_ymd_opt(2026, 11, 8).unwrap()]);
        assert_eq!(
            calendar.dates(" BLACK FRIDAY "),
            vec![NaiveDate::from_ymd_opt(2026, 11, 27).unwrap()]
        );
        assert!(!calendar.contains("Midsummer"));
        assert!(calendar.dates("Midsummer").is_empty());
    }

    #[test]
    fn insert_adds_date_and_keeps_existing() {
        let mut calendar = FestivalCalendar::builtin();
        let past = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        let builtin = NaiveDate::from_ymd_opt(2026, 11, 8).unwrap();
        calendar.insert("DIWALI", past);
        calendar.insert("diwali", past);
        assert_eq!(calendar.len(), 5);
        assert_eq!(calendar.dates("Diwali"), vec![past, builtin]);
        assert!(calendar.names().contains(&"Diwali".to_string()));
    }

    #[test]
    fn weekend_and_season_flags() {
        // 2026-11-28 is a Saturday.
        let f = day_features(NaiveDate::from_ymd_opt(2026, 11, 28).unwrap());
        assert_eq!(f.weekday, 5);
        assert!(f.is_weekend);
        assert!(f.is_festival_season);

        let f = day_features(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert!(!f.is_weekend);
        assert!(!f.is_festival_season);
    }
}
