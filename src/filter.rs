use crate::data::Dataset;
use crate::types::IndicatorRecord;
use std::collections::{BTreeMap, HashSet};

impl Dataset {
    /// Rows reported for `year`, first row per country. Empty is a valid answer.
    pub fn rows_for_year(&self, year: i32) -> Vec<&IndicatorRecord> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| r.year == year)
            .filter(|r| seen.insert(r.id.as_str()))
            .collect()
    }

    /// Rows for one country ordered by year, first row per year.
    pub fn rows_for_country(&self, id: &str) -> Vec<&IndicatorRecord> {
        let mut by_year: BTreeMap<i32, &IndicatorRecord> = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.id == id) {
            by_year.entry(record.year).or_insert(record);
        }
        by_year.into_values().collect()
    }

    pub fn record_at(&self, id: &str, year: i32) -> Option<&IndicatorRecord> {
        self.records.iter().find(|r| r.id == id && r.year == year)
    }

    pub fn contains_country(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    pub fn year_range(&self) -> Option<(i32, i32)> {
        let min = self.records.iter().map(|r| r.year).min()?;
        let max = self.records.iter().map(|r| r.year).max()?;
        Some((min, max))
    }

    /// Distinct `(id, name)` pairs sorted by code, for the manual selector.
    pub fn countries(&self) -> Vec<(&str, &str)> {
        let mut names: BTreeMap<&str, &str> = BTreeMap::new();
        for record in &self.records {
            names.entry(record.id.as_str()).or_insert(record.name.as_str());
        }
        names.into_iter().collect()
    }

    /// Leading rows of the table, optionally limited to one country.
    pub fn preview(&self, country: Option<&str>, limit: usize) -> Vec<&IndicatorRecord> {
        self.records
            .iter()
            .filter(|r| country.map_or(true, |c| r.id == c))
            .take(limit)
            .collect()
    }
}
