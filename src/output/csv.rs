use super::Formatter;
use crate::record::{CSV_HEADER, Record};

pub struct CsvFormatter {
    header: bool,
}

impl CsvFormatter {
    pub fn new(header: bool) -> Self {
        Self { header }
    }
}

impl Formatter for CsvFormatter {
    fn format(&self, record: &Record) -> String {
        record.to_string()
    }

    fn header(&self) -> Option<&'static str> {
        self.header.then_some(CSV_HEADER)
    }
}
