use std::collections::HashMap;
use tracing::warn;

use crate::error::ErrorKind;
use crate::utils::constants::NO_ERRORS_MESSAGE;

/// Occurrences of one error kind. `count == line_numbers.len()` always holds and
/// `line_numbers` is kept ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorRecord {
    pub count: usize,
    pub line_numbers: Vec<usize>,
}

impl ErrorRecord {
    fn push(&mut self, line_number: usize) {
        // Sequential runs append; anything recorded out of order is slotted into place
        let position = self.line_numbers.partition_point(|&n| n <= line_number);
        self.line_numbers.insert(position, line_number);
        self.count += 1;
    }
}

/// Collects row-local failures by kind without interrupting processing.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    records: HashMap<ErrorKind, ErrorRecord>,
    order: Vec<ErrorKind>,
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: ErrorKind, line_number: usize) {
        warn!("{} on line number {}", kind, line_number);

        match self.records.get_mut(&kind) {
            Some(record) => record.push(line_number),
            None => {
                let mut record = ErrorRecord::default();
                record.push(line_number);
                self.order.push(kind.clone());
                self.records.insert(kind, record);
            }
        }
    }

    /// Every kind seen so far in first-seen order, or `None` when nothing failed
    pub fn snapshot(&self) -> Option<Vec<(&ErrorKind, &ErrorRecord)>> {
        if self.order.is_empty() {
            return None;
        }

        Some(
            self.order
                .iter()
                .filter_map(|kind| self.records.get(kind).map(|record| (kind, record)))
                .collect(),
        )
    }

    pub fn get(&self, kind: &ErrorKind) -> Option<&ErrorRecord> {
        self.records.get(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_errors(&self) -> usize {
        self.records.values().map(|r| r.count).sum()
    }

    /// Console error report
    pub fn generate_summary(&self, lines_processed: usize) -> String {
        let Some(entries) = self.snapshot() else {
            return format!("{}\n", NO_ERRORS_MESSAGE);
        };

        let mut summary = String::new();
        summary.push_str("ERROR REPORT:\n");
        for (kind, record) in entries {
            summary.push_str(&format!("ERROR TYPE: {}\n", kind));
            summary.push_str(&format!(
                "count: {} out of {} lines processed\n",
                record.count, lines_processed
            ));
            summary.push_str(&format!(
                "error happened on lines: {:?}\n",
                record.line_numbers
            ));
            summary.push('\n');
        }

        summary
    }
}
