//! Sentinel values and fixed receiver commands
//!
//! Sentinels are part of the record contract: downstream consumers treat
//! them as "unknown" rather than as measured data.

/// Latitude/longitude reported when positioning is disabled.
pub const SENTINEL_COORDINATE: f64 = -1.0;

/// Distance written to a record when no measurement exists.
pub const NO_DISTANCE_KM: f64 = -1.0;

/// Calendar year the positioning receiver reports before it has real UTC time.
/// Also the power-on year of the soft RTC.
pub const SENTINEL_YEAR: i32 = 2020;

/// Distance code the detector reports when the storm is out of range.
pub const OUT_OF_RANGE_KM: u8 = 63;

/// Enable only the GGA and RMC sentences.
pub const PMTK_SET_NMEA_OUTPUT_RMC_GGA: &str = "PMTK314,0,1,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0";

/// Position update once per second.
pub const PMTK_SET_UPDATE_RATE_1HZ: &str = "PMTK220,1000";

/// Default fix poll period in milliseconds.
pub const DEFAULT_FIX_POLL_MS: u64 = 1000;

/// Minimum wait before powering the receiver down after a fix.
pub const MIN_GPS_SETTLE_MS: u64 = 500;

/// Default pause after a noise interrupt before polling resumes.
pub const DEFAULT_NOISE_SETTLE_MS: u64 = 500;
