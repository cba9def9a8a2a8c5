use std::time::{Duration, Instant};

use crate::jobs::SkipReason;
use crate::tally::Count;

/// Statistics collected during a counting run
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub lines_read: usize,
    pub blank_lines: usize,
    pub records_mapped: usize,
    pub skipped_delimiters: usize,
    pub skipped_unclassified: usize,
    pub emissions: Count,
    pub partitions: usize,
    pub distinct_keys: usize,
    pub files_processed: usize,
    pub processing_time: Duration,
    pub start_time: Option<Instant>,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::Extract(_) => self.skipped_delimiters += 1,
            SkipReason::Classify(_) => self.skipped_unclassified += 1,
        }
    }

    pub fn records_skipped(&self) -> usize {
        self.skipped_delimiters + self.skipped_unclassified
    }

    /// Fold the counters of a worker partition into these totals.
    /// `lines_read` and `files_processed` belong to the reader and are not merged.
    pub fn merge(&mut self, other: &ProcessingStats) {
        self.blank_lines += other.blank_lines;
        self.records_mapped += other.records_mapped;
        self.skipped_delimiters += other.skipped_delimiters;
        self.skipped_unclassified += other.skipped_unclassified;
        self.emissions += other.emissions;
        self.partitions += other.partitions;
    }

    pub fn finish(&mut self) {
        if let Some(start) = self.start_time {
            self.processing_time = start.elapsed();
        }
    }

    pub fn format_stats(&self) -> String {
        let mut output = format!(
            "Lines processed: {} total, {} blank, {} skipped",
            self.lines_read,
            self.blank_lines,
            self.records_skipped()
        );

        if self.records_skipped() > 0 {
            output.push_str(&format!(
                " ({} too few delimiters, {} unclassifiable)",
                self.skipped_delimiters, self.skipped_unclassified
            ));
        }

        output.push_str(&format!(
            "; Records mapped: {}, {} emissions, {} keys, {} partitions",
            self.records_mapped, self.emissions, self.distinct_keys, self.partitions
        ));

        if self.files_processed > 0 {
            output.push_str(&format!(", {} files", self.files_processed));
        }

        let processing_time_ms = self.processing_time.as_millis();
        output.push_str(&format!(" in {}ms", processing_time_ms));

        if processing_time_ms > 0 && self.lines_read > 0 {
            let lines_per_sec = (self.lines_read as f64 * 1000.0) / processing_time_ms as f64;
            output.push_str(&format!(" ({:.0} lines/s)", lines_per_sec));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractError;
    use crate::useragent::ClassifyError;

    #[test]
    fn test_skips_are_split_by_reason() {
        let mut stats = ProcessingStats::new();
        stats.record_skip(&SkipReason::Extract(ExtractError::TooFewDelimiters {
            delimiter: '"',
            found: 2,
            wanted: 7,
        }));
        stats.record_skip(&SkipReason::Classify(ClassifyError::Missing));
        stats.record_skip(&SkipReason::Classify(ClassifyError::Missing));

        assert_eq!(stats.skipped_delimiters, 1);
        assert_eq!(stats.skipped_unclassified, 2);
        assert_eq!(stats.records_skipped(), 3);
    }

    #[test]
    fn test_merge_leaves_reader_counters_alone() {
        let mut global = ProcessingStats::new();
        global.lines_read = 10;

        let worker = ProcessingStats {
            lines_read: 99,
            blank_lines: 1,
            records_mapped: 4,
            emissions: 9,
            partitions: 1,
            ..Default::default()
        };
        global.merge(&worker);
        global.merge(&worker);

        assert_eq!(global.lines_read, 10);
        assert_eq!(global.blank_lines, 2);
        assert_eq!(global.records_mapped, 8);
        assert_eq!(global.emissions, 18);
        assert_eq!(global.partitions, 2);
    }

    #[test]
    fn test_format_stats() {
        let stats = ProcessingStats {
            lines_read: 5,
            blank_lines: 1,
            records_mapped: 3,
            skipped_delimiters: 1,
            emissions: 7,
            distinct_keys: 4,
            partitions: 1,
            ..Default::default()
        };
        let formatted = stats.format_stats();
        assert!(formatted.starts_with("Lines processed: 5 total, 1 blank, 1 skipped"));
        assert!(formatted.contains("(1 too few delimiters, 0 unclassifiable)"));
        assert!(formatted.contains("Records mapped: 3, 7 emissions, 4 keys, 1 partitions"));
    }
}
