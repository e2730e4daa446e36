//! Blocking fix acquisition.
//!
//! Runs once at startup, before any event is trusted: powers the receiver,
//! negotiates its output, polls until the fix flag *and* a real UTC year are
//! both reported, sets the RTC and powers the receiver back down.

use crate::clock::RealTimeClock;
use crate::config::PositioningConfig;
use crate::constants::{
    PMTK_SET_NMEA_OUTPUT_RMC_GGA, PMTK_SET_UPDATE_RATE_1HZ, SENTINEL_COORDINATE,
};
use crate::error::{NodeError, Result};
use crate::hal::{CancelToken, Delay, FixStatus, GpsReceiver};

/// Node location in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// `(-1, -1)`: no fix available or positioning disabled.
    pub fn unknown() -> Self {
        Self::new(SENTINEL_COORDINATE, SENTINEL_COORDINATE)
    }

    pub fn is_unknown(&self) -> bool {
        self.latitude == SENTINEL_COORDINATE && self.longitude == SENTINEL_COORDINATE
    }
}

pub struct FixAcquirer<G, D> {
    receiver: G,
    delay: D,
    config: PositioningConfig,
    cancel: CancelToken,
    polls_waited: u32,
}

impl<G: GpsReceiver, D: Delay> FixAcquirer<G, D> {
    pub fn new(receiver: G, delay: D, config: &PositioningConfig) -> Self {
        Self {
            receiver,
            delay,
            config: config.clone(),
            cancel: CancelToken::new(),
            polls_waited: 0,
        }
    }

    /// Abort the fix wait with [`NodeError::FixCancelled`] once `cancel` is set.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Block until a trustworthy fix is held, set `rtc` from it and return
    /// the coordinates.
    ///
    /// With positioning disabled this returns [`Coordinates::unknown`] at once
    /// and leaves `rtc` untouched.
    pub fn acquire_fix(&mut self, rtc: &mut dyn RealTimeClock) -> Result<Coordinates> {
        self.polls_waited = 0;

        if !self.config.enabled {
            log::info!("Positioning disabled, using sentinel coordinates");
            return Ok(Coordinates::unknown());
        }

        log::info!("Powering positioning receiver");
        self.receiver.set_power(true)?;
        let result = self.acquire_powered(rtc);
        let powered_down = self.receiver.set_power(false);
        let coordinates = result?;
        powered_down?;
        log::debug!("Positioning receiver powered down");

        Ok(coordinates)
    }

    /// Number of polls that failed the fix guard during the last
    /// [`acquire_fix`](Self::acquire_fix).
    pub fn polls_waited(&self) -> u32 {
        self.polls_waited
    }

    pub fn receiver(&self) -> &G {
        &self.receiver
    }

    /// Everything between power-up and power-down. Errors leave power
    /// handling to the caller.
    fn acquire_powered(&mut self, rtc: &mut dyn RealTimeClock) -> Result<Coordinates> {
        self.receiver
            .send_command(PMTK_SET_NMEA_OUTPUT_RMC_GGA.as_bytes())?;
        self.receiver
            .send_command(PMTK_SET_UPDATE_RATE_1HZ.as_bytes())?;

        let status = self.poll_until_valid()?;
        log::info!("Got GPS fix after {} polls", self.polls_waited);

        let coordinates = self
            .receiver
            .position()
            .ok_or_else(|| NodeError::Gps("fix reported without a position".to_string()))?;
        rtc.set(&status.utc)?;

        self.delay.delay_ms(self.config.settle_ms);
        Ok(coordinates)
    }

    /// Poll until the guard passes. The timeout counts wait time requested
    /// through the injected delay, including the interval after the current
    /// poll.
    fn poll_until_valid(&mut self) -> Result<FixStatus> {
        loop {
            if self.cancel.is_cancelled() {
                log::info!("Fix wait cancelled after {} polls", self.polls_waited);
                return Err(NodeError::FixCancelled {
                    polls: self.polls_waited,
                });
            }

            let status = self.receiver.update()?;
            if self.is_trustworthy(&status) {
                return Ok(status);
            }
            if status.has_fix {
                log::warn!(
                    "Receiver reports a fix but sentinel year {}, still waiting",
                    status.utc.year
                );
            } else {
                log::debug!("Waiting for fix...");
            }

            self.polls_waited += 1;
            if let Some(limit) = self.config.fix_timeout_secs {
                let waited_ms = u64::from(self.polls_waited) * self.config.poll_interval_ms;
                if waited_ms >= limit.saturating_mul(1000) {
                    return Err(NodeError::FixTimeout {
                        polls: self.polls_waited,
                    });
                }
            }
            self.delay.delay_ms(self.config.poll_interval_ms);
        }
    }

    /// A fix flag alone is not proof of a valid time base.
    fn is_trustworthy(&self, status: &FixStatus) -> bool {
        status.has_fix && status.utc.year != self.config.sentinel_year
    }
}
