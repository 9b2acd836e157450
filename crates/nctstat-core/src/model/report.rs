/// The aggregate report handed back to callers.
///
/// Serialises to the historical report document:
///
/// ```json
/// {
///   "quota_counts": { "АБ": 2, "АГП": 0, ..., "Примечание": { "Сирота": 1 } },
///   "specialization_counts": { "B057 Информационные технологии": 3 },
///   "metadata": { "total_rows_processed": 3, ... }
/// }
/// ```
///
/// No personal identity value ever reaches a report; only counts and hex
/// digests.
use crate::dedup::CacheStats;
use crate::vocabulary::{QuotaCategory, ANNOTATION_KEY};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Per-category `+` counts plus the free-text annotation tally.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaCounts {
    categories: BTreeMap<QuotaCategory, u64>,
    /// Annotation item -> occurrences. Reported under [`ANNOTATION_KEY`].
    pub annotations: BTreeMap<String, u64>,
}

impl Default for QuotaCounts {
    fn default() -> Self {
        Self {
            categories: QuotaCategory::ALL.iter().map(|&c| (c, 0)).collect(),
            annotations: BTreeMap::new(),
        }
    }
}

impl QuotaCounts {
    pub fn count(&self, category: QuotaCategory) -> u64 {
        self.categories.get(&category).copied().unwrap_or(0)
    }

    /// Count by exact category label; `None` for labels outside the closed set.
    pub fn get(&self, label: &str) -> Option<u64> {
        QuotaCategory::from_label(label).map(|c| self.count(c))
    }

    pub fn increment(&mut self, category: QuotaCategory) {
        *self.categories.entry(category).or_insert(0) += 1;
    }

    pub fn add_annotation(&mut self, item: &str) {
        *self.annotations.entry(item.to_owned()).or_insert(0) += 1;
    }

    /// Sum of all category counts (annotations excluded).
    pub fn total(&self) -> u64 {
        self.categories.values().sum()
    }

    /// `(label, count)` pairs in report order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        QuotaCategory::ALL.iter().map(|&c| (c.label(), self.count(c)))
    }
}

impl Serialize for QuotaCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(!self.annotations.is_empty());
        let mut map = serializer.serialize_map(Some(QuotaCategory::ALL.len() + extra))?;
        for (label, count) in self.iter() {
            map.serialize_entry(label, &count)?;
        }
        if !self.annotations.is_empty() {
            map.serialize_entry(ANNOTATION_KEY, &self.annotations)?;
        }
        map.end()
    }
}

/// Processing statistics for one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMetadata {
    /// Every data row visited, duplicates and failures included.
    pub total_rows_processed: u64,
    pub rows_with_quotas: u64,
    pub rows_with_specializations: u64,
    pub rows_with_annotation: u64,
    pub blocks_processed: u64,
    /// Rows whose identity digest was recent; excluded from every tally.
    pub duplicate_rows_skipped: u64,
    /// New rows whose tallies were committed. Failed rows are not included:
    /// `total = duplicate_rows_skipped + unique_rows_processed + rows_failed`.
    pub unique_rows_processed: u64,
    /// New rows skipped because their content could not be interpreted.
    /// Their digest stays recorded.
    pub rows_failed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub row_cache: Option<CacheStats>,
    pub file_cache: Option<CacheStats>,
    /// File name only; directories are never reported.
    pub source_file: Option<String>,
    pub file_digest: Option<String>,
}

impl ReportMetadata {
    /// Fresh metadata with zeroed counters, stamped as starting at `now`.
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            total_rows_processed: 0,
            rows_with_quotas: 0,
            rows_with_specializations: 0,
            rows_with_annotation: 0,
            blocks_processed: 0,
            duplicate_rows_skipped: 0,
            unique_rows_processed: 0,
            rows_failed: 0,
            started_at: now,
            finished_at: now,
            duration_seconds: 0.0,
            row_cache: None,
            file_cache: None,
            source_file: None,
            file_digest: None,
        }
    }

    /// Stamp the end time and derive the duration.
    pub fn finish(&mut self, now: DateTime<Utc>) {
        self.finished_at = now;
        let elapsed = now.signed_duration_since(self.started_at);
        self.duration_seconds = elapsed
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub quota_counts: QuotaCounts,
    /// Specialization label -> first-choice count for the target institution.
    pub specialization_counts: BTreeMap<String, u64>,
    pub metadata: ReportMetadata,
}

impl Report {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            quota_counts: QuotaCounts::default(),
            specialization_counts: BTreeMap::new(),
            metadata: ReportMetadata::started(started_at),
        }
    }

    pub fn specialization(&self, label: &str) -> u64 {
        self.specialization_counts.get(label).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_counts_cover_every_category() {
        let counts = QuotaCounts::default();
        assert_eq!(counts.iter().count(), 13);
        assert_eq!(counts.total(), 0);
        assert_eq!(counts.get("АБ"), Some(0));
        assert_eq!(counts.get("unknown"), None);
    }

    #[test]
    fn annotation_key_only_serialised_when_present() {
        let mut counts = QuotaCounts::default();
        let json = serde_json::to_value(&counts).unwrap();
        assert!(json.get(ANNOTATION_KEY).is_none());
        assert_eq!(json["АБ"], 0);

        counts.increment(QuotaCategory::Ab);
        counts.add_annotation("Сирота");
        counts.add_annotation("Сирота");
        let json = serde_json::to_value(&counts).unwrap();
        assert_eq!(json["АБ"], 1);
        assert_eq!(json[ANNOTATION_KEY]["Сирота"], 2);
    }

    #[test]
    fn finish_computes_duration() {
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap();
        let mut meta = ReportMetadata::started(start);
        meta.finish(start + chrono::TimeDelta::milliseconds(1_500));
        assert!((meta.duration_seconds - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn report_serialises_top_level_sections() {
        let start = Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap();
        let mut report = Report::new(start);
        report
            .specialization_counts
            .insert("B057 Информационные технологии".into(), 3);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["quota_counts"].is_object());
        assert_eq!(
            json["specialization_counts"]["B057 Информационные технологии"],
            3
        );
        assert_eq!(json["metadata"]["total_rows_processed"], 0);
    }
}
