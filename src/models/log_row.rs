use csv::StringRecord;

use crate::error::RowError;

/// One record of the input log together with its 1-based line number.
#[derive(Debug, Clone)]
pub struct LogRow {
    pub line_number: usize,
    pub record: StringRecord,
}

impl LogRow {
    pub fn new(line_number: usize, record: StringRecord) -> Self {
        Self {
            line_number,
            record,
        }
    }

    /// Build a row from already split fields
    pub fn from_fields<I, T>(line_number: usize, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self::new(line_number, fields.into_iter().collect())
    }

    pub fn ip_address(&self, column: usize) -> std::result::Result<&str, RowError> {
        self.record
            .get(column)
            .map(str::trim)
            .ok_or(RowError::MissingIpField {
                column,
                found: self.record.len(),
            })
    }
}
