use crate::error::Result;
use crate::models::LogRow;
use crate::utils::constants::{DEFAULT_BUFFER_SIZE, LOG_DELIMITER};
use csv::{ByteRecord, StringRecord};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Streams tab-delimited log records. Rows are yielded one at a time so arbitrarily
/// large logs are never held in memory.
///
/// Every physical line is one row, blank lines included, so row numbers match the
/// line numbers an operator sees in the file.
pub struct LogReader {
    delimiter: u8,
}

impl LogReader {
    pub fn new() -> Self {
        Self {
            delimiter: LOG_DELIMITER,
        }
    }

    pub fn open(&self, path: &Path) -> Result<LogRows<BufReader<File>>> {
        let file = File::open(path)?;
        Ok(self.from_reader(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file)))
    }

    pub fn from_reader<R: BufRead>(&self, reader: R) -> LogRows<R> {
        let mut parser = csv::ReaderBuilder::new();
        parser
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true);

        LogRows {
            source: reader,
            parser,
            line: Vec::new(),
            line_number: 0,
        }
    }
}

impl Default for LogReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the lines of one log. Line numbers start at 1.
pub struct LogRows<R: BufRead> {
    source: R,
    parser: csv::ReaderBuilder,
    line: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> LogRows<R> {
    /// Split the current line into fields. A blank line is a row with no fields.
    fn parse_line(&self) -> Result<StringRecord> {
        let mut content = self.line.as_slice();
        if let Some(rest) = content.strip_suffix(b"\n") {
            content = rest;
        }
        if let Some(rest) = content.strip_suffix(b"\r") {
            content = rest;
        }

        let mut record = ByteRecord::new();
        if !content.is_empty() {
            self.parser
                .from_reader(content)
                .read_byte_record(&mut record)?;
        }

        // Invalid UTF-8 is replaced rather than failing the row
        Ok(StringRecord::from_byte_record_lossy(record))
    }
}

impl<R: BufRead> Iterator for LogRows<R> {
    type Item = Result<LogRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line.clear();
        match self.source.read_until(b'\n', &mut self.line) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                let line_number = self.line_number;
                Some(
                    self.parse_line()
                        .map(|record| LogRow::new(line_number, record)),
                )
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}
