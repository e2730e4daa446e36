//! Node orchestration: `Init -> FixAcquired -> EventLoop*`.
//!
//! [`SensorNode::start`] is the `Init -> FixAcquired` transition; it runs fix
//! acquisition exactly once and pins the coordinates for the node's lifetime.
//! Each [`SensorNode::step`] is one event loop pass: wait, assemble, hand off.

use std::time::Duration;

use crate::clock::RealTimeClock;
use crate::detector::{EventOutcome, EventSource};
use crate::error::Result;
use crate::hal::{CancelToken, Delay, GpsReceiver};
use crate::output::{RecordSink, session_filename};
use crate::position::{Coordinates, FixAcquirer};
use crate::record::{Record, assemble};

pub struct SensorNode<R, E, K, D> {
    rtc: R,
    events: E,
    sink: K,
    delay: D,
    coordinates: Coordinates,
    session_epoch: i64,
    disabled_interval: Duration,
    records_sent: u64,
}

impl<R, E, K, D> SensorNode<R, E, K, D>
where
    R: RealTimeClock,
    E: EventSource,
    K: RecordSink,
    D: Delay,
{
    /// Acquire the fix (blocking), then hold the node ready for its event loop.
    pub fn start<G: GpsReceiver, GD: Delay>(
        acquirer: &mut FixAcquirer<G, GD>,
        mut rtc: R,
        events: E,
        sink: K,
        delay: D,
        disabled_interval: Duration,
    ) -> Result<Self> {
        let coordinates = acquirer.acquire_fix(&mut rtc)?;
        Ok(Self::with_fix(
            coordinates,
            rtc,
            events,
            sink,
            delay,
            disabled_interval,
        ))
    }

    /// Enter the event loop state with coordinates already acquired and the
    /// clock already set.
    pub fn with_fix(
        coordinates: Coordinates,
        rtc: R,
        events: E,
        sink: K,
        delay: D,
        disabled_interval: Duration,
    ) -> Self {
        let session_epoch = rtc.snapshot().epoch_seconds();
        log::info!(
            "Node ready at ({}, {}), clock {}",
            coordinates.latitude,
            coordinates.longitude,
            rtc.snapshot().iso8601()
        );

        Self {
            rtc,
            events,
            sink,
            delay,
            coordinates,
            session_epoch,
            disabled_interval,
            records_sent: 0,
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn records_sent(&self) -> u64 {
        self.records_sent
    }

    /// Name for this session's data, fixed once the clock is set.
    pub fn session_filename(&self, name: &str) -> String {
        session_filename(name, self.session_epoch, &self.coordinates)
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// One event loop pass.
    ///
    /// Returns `None` when the wait was cancelled; no record is assembled
    /// for a cancelled wait.
    pub fn step(&mut self, cancel: &CancelToken) -> Result<Option<Record>> {
        let outcome = self.events.await_event(cancel)?;
        if outcome == EventOutcome::Cancelled {
            return Ok(None);
        }

        // Timestamp is taken after classification, not when waiting began.
        let snapshot = self.rtc.snapshot();
        let record = assemble(&snapshot, &self.coordinates, &outcome);
        log::info!("CREATED={}", record);

        self.sink.send(&record)?;
        self.records_sent += 1;

        if outcome == EventOutcome::Disabled {
            self.delay.delay(self.disabled_interval);
        }
        Ok(Some(record))
    }

    /// Run the event loop until cancelled or `max_records` have been sent.
    pub fn run(&mut self, cancel: &CancelToken, max_records: Option<u64>) -> Result<u64> {
        let mut sent = 0;
        while max_records.is_none_or(|max| sent < max) {
            match self.step(cancel)? {
                Some(_) => sent += 1,
                None => break,
            }
        }
        log::info!("Event loop finished after {} records", sent);
        Ok(sent)
    }
}
