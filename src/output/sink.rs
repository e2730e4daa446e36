use std::io::Write;

use super::Formatter;
use crate::error::Result;
use crate::record::Record;

/// Transport collaborator: receives each record synchronously, before the
/// next wait begins.
pub trait RecordSink {
    fn send(&mut self, record: &Record) -> Result<()>;
}

/// Writes one formatted line per record, with an optional header first.
pub struct WriterSink<W: Write> {
    writer: W,
    formatter: Box<dyn Formatter>,
    header_pending: bool,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W, formatter: Box<dyn Formatter>) -> Self {
        let header_pending = formatter.header().is_some();
        Self {
            writer,
            formatter,
            header_pending,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for WriterSink<W> {
    fn send(&mut self, record: &Record) -> Result<()> {
        if self.header_pending {
            if let Some(header) = self.formatter.header() {
                writeln!(self.writer, "{}", header)?;
            }
            self.header_pending = false;
        }
        writeln!(self.writer, "{}", self.formatter.format(record))?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{CsvFormatter, JsonFormatter};

    fn record() -> Record {
        "2024-07-02T21:14:09,1719954849,28.6,-81.2,4.2".parse().unwrap()
    }

    #[test]
    fn test_header_written_once() {
        let mut sink = WriterSink::new(Vec::new(), Box::new(CsvFormatter::new(true)));
        sink.send(&record()).unwrap();
        sink.send(&record()).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "ts,epoch,lat,long,distance_km",
                "2024-07-02T21:14:09,1719954849,28.6,-81.2,4.2",
                "2024-07-02T21:14:09,1719954849,28.6,-81.2,4.2",
            ]
        );
    }

    #[test]
    fn test_json_lines() {
        let mut sink = WriterSink::new(Vec::new(), Box::new(JsonFormatter));
        sink.send(&record()).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with('{'));
    }
}
