//! Scripted hardware doubles.
//!
//! Each double replays a fixed script and records what the code under test
//! did to it. Recording doubles are cheap `Rc` handles: clone one before
//! handing it to a component and inspect the clone afterwards.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};

use crate::clock::{CalendarTime, RealTimeClock};
use crate::config::AfeMode;
use crate::error::{NodeError, Result};
use crate::hal::{Delay, FixStatus, GpsReceiver, InputPin, InterruptCause, LightningSensor, OutputPin};
use crate::output::RecordSink;
use crate::position::Coordinates;
use crate::record::Record;

/// Positioning receiver replaying a sequence of status reports.
/// The last report repeats once the script runs out.
pub struct ScriptedGps {
    script: Vec<FixStatus>,
    position: Option<Coordinates>,
    updates: usize,
    commands: Vec<Vec<u8>>,
    power_log: Vec<bool>,
}

impl ScriptedGps {
    pub fn new(script: Vec<FixStatus>, position: Coordinates) -> Self {
        Self {
            script,
            position: Some(position),
            updates: 0,
            commands: Vec::new(),
            power_log: Vec::new(),
        }
    }

    /// Receiver that reports `(has_fix, year)` pairs, all other calendar
    /// fields at the power-on default.
    pub fn from_years(script: &[(bool, i32)], position: Coordinates) -> Self {
        let script = script
            .iter()
            .map(|&(has_fix, year)| {
                let mut utc = CalendarTime::power_on_default();
                utc.year = year;
                FixStatus { has_fix, utc }
            })
            .collect();
        Self::new(script, position)
    }

    /// Receiver that claims fixes but never reports a position.
    pub fn without_position(mut self) -> Self {
        self.position = None;
        self
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn commands(&self) -> &[Vec<u8>] {
        &self.commands
    }

    pub fn power_log(&self) -> &[bool] {
        &self.power_log
    }
}

impl GpsReceiver for ScriptedGps {
    fn set_power(&mut self, on: bool) -> Result<()> {
        self.power_log.push(on);
        Ok(())
    }

    fn send_command(&mut self, command: &[u8]) -> Result<()> {
        self.commands.push(command.to_vec());
        Ok(())
    }

    fn update(&mut self) -> Result<FixStatus> {
        let status = self
            .script
            .get(self.updates)
            .or_else(|| self.script.last())
            .copied()
            .ok_or_else(|| NodeError::Gps("empty receiver script".to_string()))?;
        self.updates += 1;
        Ok(status)
    }

    fn position(&self) -> Option<Coordinates> {
        self.position.filter(|_| self.updates > 0)
    }
}

/// Calibration registers as written by the code under test.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationLog {
    pub mode: Option<AfeMode>,
    pub noise_floor: Option<u8>,
    pub watchdog_threshold: Option<u8>,
    pub spike_rejection: Option<u8>,
    pub tune_cap_pf: Option<u8>,
}

/// Detector replaying a sequence of interrupt causes.
///
/// Reading past the end of the cause script is an error, so a test that
/// forgets a terminal event fails instead of spinning. Distance/energy
/// readings are consumed one pair per distance read; the last pair repeats.
pub struct ScriptedSensor {
    connected: bool,
    causes: Vec<InterruptCause>,
    readings: Vec<(f64, u32)>,
    interrupt_reads: usize,
    measurement_reads: usize,
    current: (f64, u32),
    clears: usize,
    calibration: CalibrationLog,
}

impl ScriptedSensor {
    pub fn new(causes: Vec<InterruptCause>) -> Self {
        Self {
            connected: true,
            causes,
            readings: vec![(1.0, 0)],
            interrupt_reads: 0,
            measurement_reads: 0,
            current: (1.0, 0),
            clears: 0,
            calibration: CalibrationLog::default(),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_readings(mut self, readings: Vec<(f64, u32)>) -> Self {
        self.readings = readings;
        self
    }

    pub fn interrupt_reads(&self) -> usize {
        self.interrupt_reads
    }

    pub fn measurement_reads(&self) -> usize {
        self.measurement_reads
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    pub fn calibration(&self) -> &CalibrationLog {
        &self.calibration
    }
}

impl LightningSensor for ScriptedSensor {
    fn is_connected(&mut self) -> Result<bool> {
        Ok(self.connected)
    }

    fn set_mode(&mut self, mode: AfeMode) -> Result<()> {
        self.calibration.mode = Some(mode);
        Ok(())
    }

    fn mode(&mut self) -> Result<AfeMode> {
        self.calibration
            .mode
            .ok_or_else(|| NodeError::Detector("mode never written".to_string()))
    }

    fn set_noise_floor(&mut self, level: u8) -> Result<()> {
        self.calibration.noise_floor = Some(level);
        Ok(())
    }

    fn set_watchdog_threshold(&mut self, threshold: u8) -> Result<()> {
        self.calibration.watchdog_threshold = Some(threshold);
        Ok(())
    }

    fn set_spike_rejection(&mut self, setting: u8) -> Result<()> {
        self.calibration.spike_rejection = Some(setting);
        Ok(())
    }

    fn set_tune_cap(&mut self, picofarads: u8) -> Result<()> {
        self.calibration.tune_cap_pf = Some(picofarads);
        Ok(())
    }

    fn read_interrupt(&mut self) -> Result<InterruptCause> {
        let cause = self
            .causes
            .get(self.interrupt_reads)
            .copied()
            .ok_or_else(|| NodeError::Detector("interrupt script exhausted".to_string()))?;
        self.interrupt_reads += 1;
        Ok(cause)
    }

    fn distance_to_storm(&mut self) -> Result<f64> {
        self.current = self
            .readings
            .get(self.measurement_reads)
            .or_else(|| self.readings.last())
            .copied()
            .unwrap_or((1.0, 0));
        self.measurement_reads += 1;
        Ok(self.current.0)
    }

    fn lightning_energy(&mut self) -> Result<u32> {
        Ok(self.current.1)
    }

    fn clear_statistics(&mut self) -> Result<()> {
        self.clears += 1;
        Ok(())
    }
}

/// Interrupt line replaying a sequence of levels; the last level repeats.
/// An empty script reads low forever.
pub struct ScriptedPin {
    levels: Vec<bool>,
    reads: Rc<Cell<usize>>,
}

impl ScriptedPin {
    pub fn new(levels: Vec<bool>) -> Self {
        Self {
            levels,
            reads: Rc::new(Cell::new(0)),
        }
    }

    /// Shared read counter, valid after the pin has been moved.
    pub fn read_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.reads)
    }
}

impl InputPin for ScriptedPin {
    fn is_high(&mut self) -> Result<bool> {
        let n = self.reads.get();
        self.reads.set(n + 1);
        Ok(self
            .levels
            .get(n)
            .or_else(|| self.levels.last())
            .copied()
            .unwrap_or(false))
    }
}

/// Output pin that records every write.
#[derive(Debug, Clone, Default)]
pub struct RecordingPin {
    writes: Rc<RefCell<Vec<bool>>>,
}

impl RecordingPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.writes.borrow().last().copied().unwrap_or(false)
    }

    pub fn writes(&self) -> Vec<bool> {
        self.writes.borrow().clone()
    }
}

impl OutputPin for RecordingPin {
    fn set(&mut self, high: bool) -> Result<()> {
        self.writes.borrow_mut().push(high);
        Ok(())
    }
}

/// Delay that returns immediately and records what was asked for.
/// Optionally advances a [`ManualClock`] by the same amount.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    recorded: Rc<RefCell<Vec<Duration>>>,
    clock: Option<ManualClock>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advancing(clock: &ManualClock) -> Self {
        Self {
            recorded: Rc::default(),
            clock: Some(clock.clone()),
        }
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.recorded.borrow().clone()
    }
}

impl Delay for RecordingDelay {
    fn delay(&mut self, duration: Duration) {
        self.recorded.borrow_mut().push(duration);
        if let Some(clock) = &self.clock {
            clock.advance(duration);
        }
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<NaiveDateTime>>,
    sets: Rc<Cell<usize>>,
}

impl ManualClock {
    /// Clock at the power-on default.
    pub fn new() -> Self {
        let now = CalendarTime::power_on_default()
            .to_datetime()
            .unwrap_or(NaiveDateTime::UNIX_EPOCH);
        Self {
            now: Rc::new(Cell::new(now)),
            sets: Rc::new(Cell::new(0)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let delta = TimeDelta::from_std(duration).unwrap_or(TimeDelta::zero());
        self.now.set(self.now.get() + delta);
    }

    /// Times [`RealTimeClock::set`] has been called.
    pub fn set_count(&self) -> usize {
        self.sets.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RealTimeClock for ManualClock {
    fn set(&mut self, time: &CalendarTime) -> Result<()> {
        self.now.set(time.to_datetime()?);
        self.sets.set(self.sets.get() + 1);
        Ok(())
    }

    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

/// Transport that keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.borrow().clone()
    }
}

impl RecordSink for MemorySink {
    fn send(&mut self, record: &Record) -> Result<()> {
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }
}
