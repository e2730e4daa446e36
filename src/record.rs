//! Record assembly.
//!
//! One record per terminal event, rendered as
//! `ISO8601_TIMESTAMP,EPOCH_SECONDS,LATITUDE,LONGITUDE,DISTANCE_KM`.
//! Floats use Rust's shortest round-trip formatting, so a rendered record
//! parses back to exactly the values it was assembled from.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::clock::ClockSnapshot;
use crate::detector::EventOutcome;
use crate::error::NodeError;
use crate::position::Coordinates;

pub const CSV_HEADER: &str = "ts,epoch,lat,long,distance_km";

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    #[serde(rename = "ts")]
    pub timestamp: String,
    #[serde(rename = "epoch")]
    pub epoch_seconds: i64,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "long")]
    pub longitude: f64,
    pub distance_km: f64,
}

/// Combine a clock reading taken after classification with the node's
/// fixed location and the event's distance.
pub fn assemble(
    timestamp: &ClockSnapshot,
    coordinates: &Coordinates,
    outcome: &EventOutcome,
) -> Record {
    Record {
        timestamp: timestamp.iso8601(),
        epoch_seconds: timestamp.epoch_seconds(),
        latitude: coordinates.latitude,
        longitude: coordinates.longitude,
        distance_km: outcome.distance_km(),
    }
}

impl Record {
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, ISO_FORMAT).ok()
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.timestamp, self.epoch_seconds, self.latitude, self.longitude, self.distance_km
        )
    }
}

impl FromStr for Record {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.trim_end_matches(['\r', '\n']).split(',').collect();
        if fields.len() != 5 {
            return Err(NodeError::Record(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        }

        NaiveDateTime::parse_from_str(fields[0], ISO_FORMAT)
            .map_err(|e| NodeError::Record(format!("timestamp {:?}: {}", fields[0], e)))?;

        Ok(Self {
            timestamp: fields[0].to_string(),
            epoch_seconds: parse_field("epoch", fields[1])?,
            latitude: parse_field("latitude", fields[2])?,
            longitude: parse_field("longitude", fields[3])?,
            distance_km: parse_field("distance", fields[4])?,
        })
    }
}

fn parse_field<T: FromStr>(name: &str, value: &str) -> Result<T, NodeError> {
    value
        .parse()
        .map_err(|_| NodeError::Record(format!("invalid {}: {:?}", name, value)))
}
