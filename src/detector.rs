//! Interrupt-driven event classification.
//!
//! ```text
//!            pin low
//!          ┌─────────┐
//!          ▼         │
//!   WaitInterrupt ───┘
//!          │ pin high
//!          ▼
//!   ReadRegister ── NOISE ──▶ clear stats, LED off, settle ──▶ WaitInterrupt
//!          │
//!          ├── DISTURBER ──▶ read distance/energy, count, clear stats ──▶ return
//!          └── LIGHTNING ──▶ read distance/energy, LED on, clear stats ──▶ return
//! ```

use std::time::Duration;

use crate::config::DetectorConfig;
use crate::constants::NO_DISTANCE_KM;
use crate::error::{NodeError, Result};
use crate::hal::{CancelToken, Delay, InputPin, InterruptCause, LightningSensor, OutputPin};

/// Classification of one serviced interrupt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassifiedEvent {
    Noise,
    Disturber { distance_km: f64, energy: u32 },
    Lightning { distance_km: f64, energy: u32 },
}

impl ClassifiedEvent {
    /// Disturber and Lightning end a wait; Noise does not.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClassifiedEvent::Noise)
    }

    pub fn distance_km(&self) -> Option<f64> {
        match self {
            ClassifiedEvent::Noise => None,
            ClassifiedEvent::Disturber { distance_km, .. }
            | ClassifiedEvent::Lightning { distance_km, .. } => Some(*distance_km),
        }
    }
}

/// Result of one [`EventClassifier::await_event`] call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventOutcome {
    /// A terminal classification (never `Noise`)
    Detected(ClassifiedEvent),
    /// Detector subsystem disabled; no measurement
    Disabled,
    /// Operator cancelled the wait; no measurement
    Cancelled,
}

impl EventOutcome {
    /// Measured distance, or `-1` when there is no measurement.
    pub fn distance_km(&self) -> f64 {
        match self {
            EventOutcome::Detected(event) => event.distance_km().unwrap_or(NO_DISTANCE_KM),
            EventOutcome::Disabled | EventOutcome::Cancelled => NO_DISTANCE_KM,
        }
    }
}

/// Source of classified events for the node's event loop.
pub trait EventSource {
    fn await_event(&mut self, cancel: &CancelToken) -> Result<EventOutcome>;
}

/// Polls the interrupt line and classifies what the detector raised.
///
/// When enabled, the detector must answer its connectivity check at
/// construction; a missing detector is fatal.
pub struct EventClassifier<S, P, L, D> {
    sensor: S,
    interrupt: P,
    indicator: L,
    delay: D,
    enabled: bool,
    noise_settle: Duration,
    pin_poll_interval: Duration,
    disturber_count: u64,
    noise_count: u64,
}

impl<S, P, L, D> EventClassifier<S, P, L, D>
where
    S: LightningSensor,
    P: InputPin,
    L: OutputPin,
    D: Delay,
{
    /// Check connectivity and write the calibration registers.
    ///
    /// With the detector disabled the hardware is left untouched.
    pub fn new(
        mut sensor: S,
        interrupt: P,
        indicator: L,
        delay: D,
        config: &DetectorConfig,
    ) -> Result<Self> {
        if config.enabled {
            if !sensor.is_connected()? {
                log::error!("Lightning detector not connected. Please check wiring.");
                return Err(NodeError::DetectorNotConnected);
            }

            let cal = &config.calibration;
            sensor.set_mode(cal.mode)?;
            log::info!("The lightning detector is in {} mode", sensor.mode()?);
            sensor.set_noise_floor(cal.noise_floor)?;
            sensor.set_watchdog_threshold(cal.watchdog_threshold)?;
            sensor.set_spike_rejection(cal.spike_rejection)?;
            sensor.set_tune_cap(cal.tune_cap_pf)?;
            log::debug!(
                "Calibration: noise_floor={} watchdog={} spike_reject={} tune_cap={}pF",
                cal.noise_floor,
                cal.watchdog_threshold,
                cal.spike_rejection,
                cal.tune_cap_pf
            );
        }

        Ok(Self {
            sensor,
            interrupt,
            indicator,
            delay,
            enabled: config.enabled,
            noise_settle: Duration::from_millis(config.noise_settle_ms),
            pin_poll_interval: Duration::from_micros(config.pin_poll_interval_us),
            disturber_count: 0,
            noise_count: 0,
        })
    }

    /// Block until the detector reports a disturber or a strike.
    ///
    /// Noise is absorbed and the wait resumes. The cancel token is checked
    /// once per loop iteration, never inside a register pass, and takes
    /// precedence over the disabled outcome.
    pub fn await_event(&mut self, cancel: &CancelToken) -> Result<EventOutcome> {
        loop {
            if cancel.is_cancelled() {
                log::info!("Event wait cancelled");
                return Ok(EventOutcome::Cancelled);
            }

            if !self.enabled {
                return Ok(EventOutcome::Disabled);
            }

            if !self.interrupt.is_high()? {
                if !self.pin_poll_interval.is_zero() {
                    self.delay.delay(self.pin_poll_interval);
                }
                continue;
            }

            let event = self.service_interrupt()?;
            if event.is_terminal() {
                return Ok(EventOutcome::Detected(event));
            }

            self.indicator.set_low()?;
            self.delay.delay(self.noise_settle);
        }
    }

    /// One ReadRegister pass: read the cause, take measurements for real
    /// events, and clear the statistics whatever the cause was.
    pub fn service_interrupt(&mut self) -> Result<ClassifiedEvent> {
        let event = match self.sensor.read_interrupt()? {
            InterruptCause::Noise => {
                self.noise_count += 1;
                log::debug!("Noise.");
                ClassifiedEvent::Noise
            }
            InterruptCause::Disturber => {
                let distance_km = self.sensor.distance_to_storm()?;
                let energy = self.sensor.lightning_energy()?;
                self.disturber_count += 1;
                log::info!(
                    "Disturber {} detected {}km away!",
                    self.disturber_count,
                    distance_km
                );
                ClassifiedEvent::Disturber {
                    distance_km,
                    energy,
                }
            }
            InterruptCause::Lightning => {
                let distance_km = self.sensor.distance_to_storm()?;
                let energy = self.sensor.lightning_energy()?;
                self.indicator.set_high()?;
                log::info!(
                    "Lightning strike detected {}km away! (energy {})",
                    distance_km,
                    energy
                );
                ClassifiedEvent::Lightning {
                    distance_km,
                    energy,
                }
            }
        };
        self.sensor.clear_statistics()?;
        Ok(event)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disturbers seen since start (diagnostic only).
    pub fn disturber_count(&self) -> u64 {
        self.disturber_count
    }

    pub fn noise_count(&self) -> u64 {
        self.noise_count
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn indicator(&self) -> &L {
        &self.indicator
    }
}

impl<S, P, L, D> EventSource for EventClassifier<S, P, L, D>
where
    S: LightningSensor,
    P: InputPin,
    L: OutputPin,
    D: Delay,
{
    fn await_event(&mut self, cancel: &CancelToken) -> Result<EventOutcome> {
        EventClassifier::await_event(self, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AfeMode;
    use crate::simulation::{RecordingDelay, RecordingPin, ScriptedPin, ScriptedSensor};

    fn classifier(
        pin: Vec<bool>,
        causes: Vec<InterruptCause>,
    ) -> EventClassifier<ScriptedSensor, ScriptedPin, RecordingPin, RecordingDelay> {
        EventClassifier::new(
            ScriptedSensor::new(causes).with_readings(vec![(7.0, 420)]),
            ScriptedPin::new(pin),
            RecordingPin::new(),
            RecordingDelay::new(),
            &DetectorConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_not_connected_is_fatal() {
        let result = EventClassifier::new(
            ScriptedSensor::disconnected(),
            ScriptedPin::new(vec![]),
            RecordingPin::new(),
            RecordingDelay::new(),
            &DetectorConfig::default(),
        );
        assert!(matches!(result, Err(NodeError::DetectorNotConnected)));
    }

    #[test]
    fn test_calibration_written_once() {
        let mut config = DetectorConfig::default();
        config.calibration.mode = AfeMode::Indoor;
        config.calibration.noise_floor = 4;
        config.calibration.watchdog_threshold = 3;
        config.calibration.spike_rejection = 5;
        config.calibration.tune_cap_pf = 64;

        let c = EventClassifier::new(
            ScriptedSensor::new(vec![]),
            ScriptedPin::new(vec![]),
            RecordingPin::new(),
            RecordingDelay::new(),
            &config,
        )
        .unwrap();

        let regs = c.sensor().calibration();
        assert_eq!(regs.mode, Some(AfeMode::Indoor));
        assert_eq!(regs.noise_floor, Some(4));
        assert_eq!(regs.watchdog_threshold, Some(3));
        assert_eq!(regs.spike_rejection, Some(5));
        assert_eq!(regs.tune_cap_pf, Some(64));
    }

    #[test]
    fn test_disabled_skips_hardware() {
        let config = DetectorConfig {
            enabled: false,
            ..DetectorConfig::default()
        };
        let mut c = EventClassifier::new(
            ScriptedSensor::disconnected(),
            ScriptedPin::new(vec![true]),
            RecordingPin::new(),
            RecordingDelay::new(),
            &config,
        )
        .unwrap();

        let outcome = c.await_event(&CancelToken::new()).unwrap();
        assert_eq!(outcome, EventOutcome::Disabled);
        assert_eq!(outcome.distance_km(), NO_DISTANCE_KM);
        assert_eq!(c.sensor().interrupt_reads(), 0);
    }

    #[test]
    fn test_cancel_wins_over_disabled() {
        let config = DetectorConfig {
            enabled: false,
            ..DetectorConfig::default()
        };
        let mut c = EventClassifier::new(
            ScriptedSensor::disconnected(),
            ScriptedPin::new(vec![]),
            RecordingPin::new(),
            RecordingDelay::new(),
            &config,
        )
        .unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(c.await_event(&cancel).unwrap(), EventOutcome::Cancelled);
    }

    #[test]
    fn test_statistics_cleared_for_every_cause() {
        let mut c = classifier(
            vec![true],
            vec![
                InterruptCause::Noise,
                InterruptCause::Disturber,
                InterruptCause::Lightning,
            ],
        );
        for _ in 0..3 {
            c.service_interrupt().unwrap();
        }
        assert_eq!(c.sensor().interrupt_reads(), 3);
        assert_eq!(c.sensor().clears(), 3);
    }

    #[test]
    fn test_noise_reads_no_measurement() {
        let mut c = classifier(vec![true], vec![InterruptCause::Noise]);
        assert_eq!(c.service_interrupt().unwrap(), ClassifiedEvent::Noise);
        assert_eq!(c.sensor().measurement_reads(), 0);
    }

    #[test]
    fn test_disturber_counter() {
        let mut c = classifier(
            vec![true],
            vec![InterruptCause::Disturber, InterruptCause::Disturber],
        );
        let cancel = CancelToken::new();
        c.await_event(&cancel).unwrap();
        c.await_event(&cancel).unwrap();
        assert_eq!(c.disturber_count(), 2);
    }

    #[test]
    fn test_noise_clears_indicator_and_settles() {
        let mut c = classifier(
            vec![true],
            vec![
                InterruptCause::Lightning,
                InterruptCause::Noise,
                InterruptCause::Disturber,
            ],
        );
        let cancel = CancelToken::new();

        let first = c.await_event(&cancel).unwrap();
        assert!(matches!(
            first,
            EventOutcome::Detected(ClassifiedEvent::Lightning { .. })
        ));
        assert!(c.indicator().is_high());

        let second = c.await_event(&cancel).unwrap();
        assert!(matches!(
            second,
            EventOutcome::Detected(ClassifiedEvent::Disturber { .. })
        ));
        assert!(!c.indicator().is_high());
        assert_eq!(c.noise_count(), 1);
    }

    #[test]
    fn test_cancel_before_interrupt() {
        let mut c = classifier(vec![false], vec![InterruptCause::Lightning]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = c.await_event(&cancel).unwrap();
        assert_eq!(outcome, EventOutcome::Cancelled);
        assert_eq!(outcome.distance_km(), NO_DISTANCE_KM);
        assert_eq!(c.sensor().interrupt_reads(), 0);
    }

    #[test]
    fn test_pin_poll_interval() {
        let config = DetectorConfig {
            pin_poll_interval_us: 250,
            ..DetectorConfig::default()
        };
        let delay = RecordingDelay::new();
        let mut c = EventClassifier::new(
            ScriptedSensor::new(vec![InterruptCause::Disturber]),
            ScriptedPin::new(vec![false, false, true]),
            RecordingPin::new(),
            delay.clone(),
            &config,
        )
        .unwrap();

        c.await_event(&CancelToken::new()).unwrap();
        assert_eq!(delay.recorded(), vec![Duration::from_micros(250); 2]);
    }
}
