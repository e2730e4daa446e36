//! NMEA 0183 positioning receiver over a byte stream.
//!
//! Speaks the MTK command set: commands go out as `$<body>*<checksum>\r\n`,
//! and `GGA`/`RMC` sentences (any talker) come back. Until an `RMC` with a
//! date arrives the reported UTC time is the power-on default, so the fix
//! acquirer's sentinel-year guard sees exactly what a fresh receiver reports.

use std::io::{BufRead, Write};

use chrono::NaiveDate;

use crate::clock::CalendarTime;
use crate::error::{NodeError, Result};
use crate::hal::{FixStatus, GpsReceiver, OutputPin};
use crate::position::Coordinates;

/// Upper bound on lines consumed by one `update()`.
const MAX_LINES_PER_UPDATE: usize = 8;

/// XOR of every byte between `$` and `*`.
pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0, |acc, b| acc ^ b)
}

/// Frame a command body as a complete sentence.
pub fn frame_command(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 6);
    out.push(b'$');
    out.extend_from_slice(body);
    out.extend_from_slice(format!("*{:02X}\r\n", checksum(body)).as_bytes());
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sentence {
    /// Fix data: quality 0 means no fix
    Gga {
        quality: u8,
        position: Option<Coordinates>,
    },
    /// Recommended minimum: `valid` is the A/V status flag
    Rmc {
        valid: bool,
        utc: Option<CalendarTime>,
        position: Option<Coordinates>,
    },
}

/// Parse one sentence. Returns `Ok(None)` for well-formed sentences of
/// other types and an error for a bad checksum.
pub fn parse_sentence(line: &str) -> Result<Option<Sentence>> {
    let line = line.trim();
    let Some(line) = line.strip_prefix('$') else {
        return Ok(None);
    };

    let body = match line.split_once('*') {
        Some((body, sum)) => {
            let expected = u8::from_str_radix(sum, 16)
                .map_err(|_| NodeError::Gps(format!("bad checksum field {:?}", sum)))?;
            let actual = checksum(body.as_bytes());
            if actual != expected {
                return Err(NodeError::Gps(format!(
                    "checksum mismatch: got {:02X}, sentence says {:02X}",
                    actual, expected
                )));
            }
            body
        }
        None => line,
    };

    let fields: Vec<&str> = body.split(',').collect();
    let kind = fields[0];
    if kind.len() < 5 {
        return Ok(None);
    }

    match kind.get(kind.len() - 3..).unwrap_or_default() {
        "GGA" if fields.len() >= 7 => Ok(Some(Sentence::Gga {
            quality: fields[6].parse().unwrap_or(0),
            position: parse_position(fields[2], fields[3], fields[4], fields[5]),
        })),
        "RMC" if fields.len() >= 10 => Ok(Some(Sentence::Rmc {
            valid: fields[2] == "A",
            utc: parse_utc(fields[1], fields[9]),
            position: parse_position(fields[3], fields[4], fields[5], fields[6]),
        })),
        _ => Ok(None),
    }
}

fn parse_position(lat: &str, ns: &str, lon: &str, ew: &str) -> Option<Coordinates> {
    let mut latitude = parse_degrees(lat, 2)?;
    let mut longitude = parse_degrees(lon, 3)?;
    match ns {
        "N" => {}
        "S" => latitude = -latitude,
        _ => return None,
    }
    match ew {
        "E" => {}
        "W" => longitude = -longitude,
        _ => return None,
    }
    Some(Coordinates::new(latitude, longitude))
}

/// `ddmm.mmmm` (or `dddmm.mmmm`) to decimal degrees.
fn parse_degrees(field: &str, degree_digits: usize) -> Option<f64> {
    if field.len() < degree_digits + 2 {
        return None;
    }
    let degrees: f64 = field.get(..degree_digits)?.parse().ok()?;
    let minutes: f64 = field.get(degree_digits..)?.parse().ok()?;
    Some(degrees + minutes / 60.0)
}

/// `hhmmss[.ss]` plus `ddmmyy`.
fn parse_utc(time: &str, date: &str) -> Option<CalendarTime> {
    if time.len() < 6 || date.len() != 6 {
        return None;
    }
    let num = |s: &str, range: std::ops::Range<usize>| -> Option<u32> { s.get(range)?.parse().ok() };

    let yy = num(date, 4..6)? as i32;
    let year = if yy < 80 { 2000 + yy } else { 1900 + yy };
    let dt = NaiveDate::from_ymd_opt(year, num(date, 2..4)?, num(date, 0..2)?)?.and_hms_opt(
        num(time, 0..2)?,
        num(time, 2..4)?,
        num(time, 4..6)?,
    )?;
    Some(CalendarTime::from_datetime(&dt))
}

/// Receiver on a serial stream, with its power enable on an output pin.
pub struct NmeaReceiver<R, W, P> {
    reader: R,
    writer: W,
    power: P,
    has_fix: bool,
    utc: CalendarTime,
    position: Option<Coordinates>,
    line: Vec<u8>,
}

impl<R: BufRead, W: Write, P: OutputPin> NmeaReceiver<R, W, P> {
    pub fn new(reader: R, writer: W, power: P) -> Self {
        Self {
            reader,
            writer,
            power,
            has_fix: false,
            utc: CalendarTime::power_on_default(),
            position: None,
            line: Vec::new(),
        }
    }

    fn apply(&mut self, sentence: Sentence) {
        match sentence {
            Sentence::Gga { quality, position } => {
                self.has_fix = quality > 0;
                if self.has_fix {
                    self.position = position.or(self.position);
                }
            }
            Sentence::Rmc {
                valid,
                utc,
                position,
            } => {
                if let Some(utc) = utc {
                    self.utc = utc;
                }
                if valid {
                    self.position = position.or(self.position);
                } else {
                    self.has_fix = false;
                }
            }
        }
    }
}

impl<R: BufRead, W: Write, P: OutputPin> GpsReceiver for NmeaReceiver<R, W, P> {
    fn set_power(&mut self, on: bool) -> Result<()> {
        self.power.set(on)
    }

    fn send_command(&mut self, command: &[u8]) -> Result<()> {
        self.writer.write_all(&frame_command(command))?;
        self.writer.flush()?;
        Ok(())
    }

    fn update(&mut self) -> Result<FixStatus> {
        let mut saw_gga = false;
        let mut saw_rmc = false;

        for _ in 0..MAX_LINES_PER_UPDATE {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                break;
            }
            let Ok(line) = std::str::from_utf8(&self.line) else {
                log::debug!("Dropping {} bytes of line noise", self.line.len());
                continue;
            };
            match parse_sentence(line) {
                Ok(Some(sentence)) => {
                    saw_gga |= matches!(sentence, Sentence::Gga { .. });
                    saw_rmc |= matches!(sentence, Sentence::Rmc { .. });
                    self.apply(sentence);
                }
                Ok(None) => {}
                Err(e) => log::debug!("Dropping sentence: {}", e),
            }
            if saw_gga && saw_rmc {
                break;
            }
        }

        Ok(FixStatus {
            has_fix: self.has_fix,
            utc: self.utc,
        })
    }

    fn position(&self) -> Option<Coordinates> {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{PMTK_SET_UPDATE_RATE_1HZ, SENTINEL_YEAR};
    use crate::hal::NullPin;
    use approx::assert_abs_diff_eq;
    use std::io::Cursor;

    const NO_FIX: &str = "$GPGGA,000001.00,,,,,0,00,99.99,,,,,,*67\r\n$GPRMC,000001.00,V,,,,,,,,,,N*7C\r\n";
    const FIX: &str = "$GNGGA,214409.00,2836.1440,N,08112.0060,W,1,09,0.9,27.1,M,-30.2,M,,*70\r\n$GNRMC,214409.00,A,2836.1440,N,08112.0060,W,0.02,,020724,,,A*45\r\n";

    #[test]
    fn test_frame_command() {
        let framed = frame_command(PMTK_SET_UPDATE_RATE_1HZ.as_bytes());
        assert_eq!(framed, b"$PMTK220,1000*1F\r\n");
    }

    #[test]
    fn test_parse_gga() {
        let s = parse_sentence(
            "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
        )
        .unwrap();
        let Some(Sentence::Gga { quality, position }) = s else {
            panic!("expected GGA, got {:?}", s);
        };
        assert_eq!(quality, 1);
        let p = position.unwrap();
        assert_abs_diff_eq!(p.latitude, 48.1173, epsilon = 1e-9);
        assert_abs_diff_eq!(p.longitude, 11.516_666_666, epsilon = 1e-6);
    }

    #[test]
    fn test_parse_rmc_date_pivot() {
        let s = parse_sentence(
            "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
        )
        .unwrap();
        let Some(Sentence::Rmc { valid, utc, .. }) = s else {
            panic!("expected RMC, got {:?}", s);
        };
        assert!(valid);
        let utc = utc.unwrap();
        assert_eq!((utc.year, utc.month, utc.day), (1994, 3, 23));
        assert_eq!((utc.hour, utc.minute, utc.second), (12, 35, 19));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        assert!(parse_sentence("$GPRMC,000001.00,V,,,,,,,,,,N*00").is_err());
    }

    #[test]
    fn test_other_sentences_ignored() {
        assert_eq!(parse_sentence("$GPGSV,1,1,00*79").unwrap(), None);
        assert_eq!(parse_sentence("garbage").unwrap(), None);
    }

    #[test]
    fn test_receiver_reports_sentinel_until_rmc() {
        let stream = format!("{}{}", NO_FIX, FIX);
        let mut rx = NmeaReceiver::new(Cursor::new(stream.into_bytes()), Vec::new(), NullPin);

        let first = rx.update().unwrap();
        assert!(!first.has_fix);
        assert_eq!(first.utc.year, SENTINEL_YEAR);
        assert_eq!(rx.position(), None);

        let second = rx.update().unwrap();
        assert!(second.has_fix);
        assert_eq!((second.utc.year, second.utc.month, second.utc.day), (2024, 7, 2));
        assert_eq!(second.utc.weekday, 1);
        assert_eq!(second.utc.yearday, 184);
        let p = rx.position().unwrap();
        assert_abs_diff_eq!(p.latitude, 28.6024, epsilon = 1e-9);
        assert_abs_diff_eq!(p.longitude, -81.2001, epsilon = 1e-9);
    }

    #[test]
    fn test_line_noise_is_dropped() {
        let mut stream = b"\xFF\xFE\x80\r\n".to_vec();
        stream.extend_from_slice(FIX.as_bytes());
        let mut rx = NmeaReceiver::new(Cursor::new(stream), Vec::new(), NullPin);

        let status = rx.update().unwrap();

        assert!(status.has_fix);
        assert_eq!(status.utc.year, 2024);
        assert!(rx.position().is_some());
    }

    #[test]
    fn test_send_command_writes_framed_bytes() {
        let mut rx = NmeaReceiver::new(Cursor::new(Vec::new()), Vec::new(), NullPin);
        rx.send_command(b"PMTK220,1000").unwrap();
        assert_eq!(rx.writer, b"$PMTK220,1000*1F\r\n");
    }
}
