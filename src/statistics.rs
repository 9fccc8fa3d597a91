//! Per-tag statistics.
//!
//! [`TagStatistics`] keeps two tallies keyed by tag:
//!
//! - `all`: how many fields carried the tag
//! - `per_record`: how many records contained the tag at least once
//!
//! Both maps keep first-seen order, so a report lists tags in the order they
//! appeared in the input. [`sorted_tags`](TagStatistics::sorted_tags) gives
//! them in tag order instead.

use crate::error::Result;
use crate::record::{Field, Record};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// Field and record counts per tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagStatistics {
    /// Number of fields per tag
    pub all: IndexMap<String, usize>,
    /// Number of records containing the tag
    pub per_record: IndexMap<String, usize>,
    /// Number of records counted
    pub records: usize,
}

impl TagStatistics {
    /// Create empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a whole record.
    pub fn add_record(&mut self, record: &Record) {
        let mut seen = IndexSet::new();
        for field in record.fields() {
            self.add_field(field);
            seen.insert(field.tag.as_str());
        }
        for tag in seen {
            *self.per_record.entry(tag.to_string()).or_insert(0) += 1;
        }
        self.records += 1;
    }

    /// Count a single field.
    ///
    /// Only `all` changes; use [`add_record`](Self::add_record) for per-record counts.
    pub fn add_field(&mut self, field: &Field) {
        *self.all.entry(field.tag.to_string()).or_insert(0) += 1;
    }

    /// Add the counts of another run, e.g. of a second source.
    pub fn merge(&mut self, other: &TagStatistics) {
        for (tag, count) in &other.all {
            *self.all.entry(tag.clone()).or_insert(0) += count;
        }
        for (tag, count) in &other.per_record {
            *self.per_record.entry(tag.clone()).or_insert(0) += count;
        }
        self.records += other.records;
    }

    /// Total number of fields counted.
    #[must_use]
    pub fn total_fields(&self) -> usize {
        self.all.values().sum()
    }

    /// Tags with their field and record counts, ordered by tag.
    #[must_use]
    pub fn sorted_tags(&self) -> Vec<(&str, usize, usize)> {
        let mut tags: Vec<_> = self
            .all
            .iter()
            .map(|(tag, count)| {
                let records = self.per_record.get(tag).copied().unwrap_or(0);
                (tag.as_str(), *count, records)
            })
            .collect();
        tags.sort_unstable_by(|a, b| a.0.cmp(b.0));
        tags
    }

    /// Serialize as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::SerializationError`](crate::PicaError::SerializationError)
    /// if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tags: &[&str]) -> Record {
        tags.iter()
            .map(|tag| Field::builder(tag).unwrap().subfield('a', "x").build())
            .collect()
    }

    #[test]
    fn test_per_record_counts_once() {
        let mut stats = TagStatistics::new();
        stats.add_record(&record(&["003@", "044K", "044K"]));
        stats.add_record(&record(&["003@", "021A"]));

        assert_eq!(stats.all["044K"], 2);
        assert_eq!(stats.per_record["044K"], 1);
        assert_eq!(stats.per_record["003@"], 2);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.total_fields(), 5);
        assert_eq!(
            stats.all.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["003@", "044K", "021A"]
        );
    }

    #[test]
    fn test_merge_and_sort() {
        let mut first = TagStatistics::new();
        first.add_record(&record(&["044K", "003@"]));
        let mut second = TagStatistics::new();
        second.add_record(&record(&["003@"]));

        first.merge(&second);
        assert_eq!(first.records, 2);
        assert_eq!(
            first.sorted_tags(),
            vec![("003@", 2, 2), ("044K", 1, 1)]
        );
    }

    #[test]
    fn test_to_json() {
        let mut stats = TagStatistics::new();
        stats.add_record(&record(&["003@"]));
        let json: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
        assert_eq!(json["all"]["003@"], 1);
        assert_eq!(json["records"], 1);
    }
}
