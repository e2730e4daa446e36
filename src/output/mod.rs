mod csv;
mod json;
mod sink;

use serde::Deserialize;

use crate::position::Coordinates;
use crate::record::Record;

pub use self::csv::CsvFormatter;
pub use self::json::JsonFormatter;
pub use self::sink::{RecordSink, WriterSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Json,
}

pub trait Formatter: Send {
    fn format(&self, record: &Record) -> String;

    fn header(&self) -> Option<&'static str> {
        None
    }
}

pub fn create_formatter(format: OutputFormat, header: bool) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Csv => Box::new(CsvFormatter::new(header)),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// `{name}_{epoch}_({lat},{long})`, naming one power-on session's data.
pub fn session_filename(name: &str, epoch_seconds: i64, coordinates: &Coordinates) -> String {
    format!(
        "{}_{}_({},{})",
        name, epoch_seconds, coordinates.latitude, coordinates.longitude
    )
}
