use super::Formatter;
use crate::record::Record;

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, record: &Record) -> String {
        // Infallible for this struct; non-finite floats render as null.
        serde_json::to_string(record).unwrap_or_default()
    }
}
