//! Seeded random storm for bench runs without hardware.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;
use rand::RngExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, Normal};

use crate::clock::CalendarTime;
use crate::config::AfeMode;
use crate::constants::{OUT_OF_RANGE_KM, SENTINEL_YEAR};
use crate::error::{NodeError, Result};
use crate::hal::{FixStatus, GpsReceiver, InputPin, InterruptCause, LightningSensor};
use crate::position::Coordinates;

/// Largest distance the detector resolves before reporting out of range.
const MAX_RESOLVED_KM: f64 = 40.0;

/// Largest value of the detector's 20-bit energy register.
const MAX_ENERGY: f64 = ((1u32 << 20) - 1) as f64;

#[derive(Clone, Debug, serde::Deserialize)]
#[serde(default)]
pub struct StormConfig {
    pub seed: Option<u64>,
    /// Probability that a given interrupt pin read finds the line raised
    pub interrupt_probability: f64,
    /// Relative weights of noise, disturber and lightning interrupts
    pub noise_weight: f64,
    pub disturber_weight: f64,
    pub lightning_weight: f64,
    /// Storm distance when the simulation starts
    pub initial_distance_km: f64,
    /// How far the storm moves toward the node per strike or disturber
    pub approach_km_per_event: f64,
    /// Standard deviation of each distance estimate
    pub distance_jitter_km: f64,
    pub mean_energy: f64,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            seed: None,
            interrupt_probability: 0.002,
            noise_weight: 0.5,
            disturber_weight: 0.3,
            lightning_weight: 0.2,
            initial_distance_km: 45.0,
            approach_km_per_event: 1.5,
            distance_jitter_km: 1.5,
            mean_energy: 150_000.0,
        }
    }
}

impl StormConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.interrupt_probability) {
            return Err(NodeError::Config(
                "interrupt_probability must be in 0..=1".to_string(),
            ));
        }
        let total = self.noise_weight + self.disturber_weight + self.lightning_weight;
        let negative = [self.noise_weight, self.disturber_weight, self.lightning_weight]
            .iter()
            .any(|w| *w < 0.0);
        if total <= 0.0 || negative {
            return Err(NodeError::Config(
                "interrupt cause weights must be non-negative and not all zero".to_string(),
            ));
        }
        if self.mean_energy <= 0.0 || self.distance_jitter_km < 0.0 {
            return Err(NodeError::Config(
                "mean_energy must be positive and distance_jitter_km non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

struct StormState {
    config: StormConfig,
    rng: ChaCha8Rng,
    energy: Exp<f64>,
    jitter: Normal<f64>,
    pending: Option<InterruptCause>,
    storm_km: f64,
    last_energy: u32,
    mode: AfeMode,
}

impl StormState {
    fn roll_cause(&mut self) -> InterruptCause {
        let c = &self.config;
        let total = c.noise_weight + c.disturber_weight + c.lightning_weight;
        let pick = self.rng.random::<f64>() * total;
        if pick < c.noise_weight {
            InterruptCause::Noise
        } else if pick < c.noise_weight + c.disturber_weight {
            InterruptCause::Disturber
        } else {
            InterruptCause::Lightning
        }
    }

    fn estimate_distance(&mut self) -> f64 {
        self.storm_km = (self.storm_km - self.config.approach_km_per_event).max(1.0);
        let estimate = (self.storm_km + self.jitter.sample(&mut self.rng)).round();
        if estimate > MAX_RESOLVED_KM {
            OUT_OF_RANGE_KM as f64
        } else {
            estimate.max(1.0)
        }
    }
}

/// A storm shared by one interrupt pin and one detector.
#[derive(Clone)]
pub struct SimulatedStorm {
    state: Rc<RefCell<StormState>>,
}

impl SimulatedStorm {
    pub fn new(config: StormConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => rand::make_rng(),
        };
        let energy = Exp::new(1.0 / config.mean_energy)
            .map_err(|e| NodeError::Config(format!("mean_energy: {}", e)))?;
        let jitter = Normal::new(0.0, config.distance_jitter_km)
            .map_err(|e| NodeError::Config(format!("distance_jitter_km: {}", e)))?;
        let storm_km = config.initial_distance_km;

        Ok(Self {
            state: Rc::new(RefCell::new(StormState {
                config,
                rng,
                energy,
                jitter,
                pending: None,
                storm_km,
                last_energy: 0,
                mode: AfeMode::Outdoor,
            })),
        })
    }

    pub fn pin(&self) -> StormPin {
        StormPin {
            state: Rc::clone(&self.state),
        }
    }

    pub fn sensor(&self) -> StormSensor {
        StormSensor {
            state: Rc::clone(&self.state),
        }
    }
}

/// Interrupt line of a [`SimulatedStorm`].
pub struct StormPin {
    state: Rc<RefCell<StormState>>,
}

impl InputPin for StormPin {
    fn is_high(&mut self) -> Result<bool> {
        let state = &mut *self.state.borrow_mut();
        if state.pending.is_none() {
            let p = state.config.interrupt_probability;
            if state.rng.random::<f64>() < p {
                let cause = state.roll_cause();
                state.pending = Some(cause);
            }
        }
        Ok(state.pending.is_some())
    }
}

/// Detector registers of a [`SimulatedStorm`].
pub struct StormSensor {
    state: Rc<RefCell<StormState>>,
}

impl LightningSensor for StormSensor {
    fn is_connected(&mut self) -> Result<bool> {
        Ok(true)
    }

    fn set_mode(&mut self, mode: AfeMode) -> Result<()> {
        self.state.borrow_mut().mode = mode;
        Ok(())
    }

    fn mode(&mut self) -> Result<AfeMode> {
        Ok(self.state.borrow().mode)
    }

    fn set_noise_floor(&mut self, level: u8) -> Result<()> {
        log::trace!("sim: noise floor {}", level);
        Ok(())
    }

    fn set_watchdog_threshold(&mut self, threshold: u8) -> Result<()> {
        log::trace!("sim: watchdog threshold {}", threshold);
        Ok(())
    }

    fn set_spike_rejection(&mut self, setting: u8) -> Result<()> {
        log::trace!("sim: spike rejection {}", setting);
        Ok(())
    }

    fn set_tune_cap(&mut self, picofarads: u8) -> Result<()> {
        log::trace!("sim: tune cap {}pF", picofarads);
        Ok(())
    }

    fn read_interrupt(&mut self) -> Result<InterruptCause> {
        // Lowers the line, as reading the register does on the real part.
        Ok(self
            .state
            .borrow_mut()
            .pending
            .take()
            .unwrap_or(InterruptCause::Noise))
    }

    fn distance_to_storm(&mut self) -> Result<f64> {
        let state = &mut *self.state.borrow_mut();
        let distance = state.estimate_distance();
        let energy = state.energy.sample(&mut state.rng).min(MAX_ENERGY);
        state.last_energy = energy as u32;
        Ok(distance)
    }

    fn lightning_energy(&mut self) -> Result<u32> {
        Ok(self.state.borrow().last_energy)
    }

    fn clear_statistics(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receiver that holds no fix for `polls_without_fix` polls, then claims a
/// fix with the sentinel year for one poll, then reports current UTC.
pub struct SimulatedGps {
    position: Coordinates,
    polls_without_fix: u32,
    polls: u32,
    powered: bool,
}

impl SimulatedGps {
    pub fn new(position: Coordinates, polls_without_fix: u32) -> Self {
        Self {
            position,
            polls_without_fix,
            polls: 0,
            powered: false,
        }
    }
}

impl GpsReceiver for SimulatedGps {
    fn set_power(&mut self, on: bool) -> Result<()> {
        self.powered = on;
        Ok(())
    }

    fn send_command(&mut self, command: &[u8]) -> Result<()> {
        log::debug!("sim: receiver command {}", String::from_utf8_lossy(command));
        Ok(())
    }

    fn update(&mut self) -> Result<FixStatus> {
        if !self.powered {
            return Err(NodeError::Gps("receiver not powered".to_string()));
        }
        self.polls += 1;
        let mut utc = CalendarTime::power_on_default();
        let has_fix = self.polls > self.polls_without_fix;
        if self.polls > self.polls_without_fix + 1 {
            utc = CalendarTime::from_datetime(&Utc::now().naive_utc());
        }
        Ok(FixStatus { has_fix, utc })
    }

    fn position(&self) -> Option<Coordinates> {
        (self.polls > self.polls_without_fix).then_some(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storm(seed: u64) -> SimulatedStorm {
        SimulatedStorm::new(StormConfig {
            interrupt_probability: 0.5,
            ..StormConfig::default().with_seed(seed)
        })
        .unwrap()
    }

    fn causes(storm: &SimulatedStorm, n: usize) -> Vec<InterruptCause> {
        let mut pin = storm.pin();
        let mut sensor = storm.sensor();
        let mut out = Vec::new();
        while out.len() < n {
            if pin.is_high().unwrap() {
                out.push(sensor.read_interrupt().unwrap());
            }
        }
        out
    }

    #[test]
    fn test_seeded_storm_is_reproducible() {
        assert_eq!(causes(&storm(7), 50), causes(&storm(7), 50));
    }

    #[test]
    fn test_pin_stays_high_until_read() {
        let s = storm(1);
        let mut pin = s.pin();
        while !pin.is_high().unwrap() {}
        assert!(pin.is_high().unwrap());
        s.sensor().read_interrupt().unwrap();
        assert!(s.state.borrow().pending.is_none());
    }

    #[test]
    fn test_distance_within_detector_range() {
        let s = storm(3);
        let mut sensor = s.sensor();
        for _ in 0..100 {
            let d = sensor.distance_to_storm().unwrap();
            assert!(d == OUT_OF_RANGE_KM as f64 || (1.0..=MAX_RESOLVED_KM).contains(&d));
            assert!(sensor.lightning_energy().unwrap() < 1 << 20);
        }
    }

    #[test]
    fn test_lightning_only_weights() {
        let s = SimulatedStorm::new(StormConfig {
            interrupt_probability: 1.0,
            noise_weight: 0.0,
            disturber_weight: 0.0,
            lightning_weight: 1.0,
            ..StormConfig::default().with_seed(11)
        })
        .unwrap();
        assert!(causes(&s, 20).iter().all(|c| *c == InterruptCause::Lightning));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StormConfig {
            noise_weight: 0.0,
            disturber_weight: 0.0,
            lightning_weight: 0.0,
            ..StormConfig::default()
        };
        assert!(SimulatedStorm::new(config).is_err());
    }

    #[test]
    fn test_simulated_gps_passes_through_sentinel_year() {
        let mut gps = SimulatedGps::new(Coordinates::new(28.6, -81.2), 2);
        gps.set_power(true).unwrap();
        let reports: Vec<FixStatus> = (0..4).map(|_| gps.update().unwrap()).collect();
        assert!(!reports[0].has_fix && !reports[1].has_fix);
        assert!(reports[2].has_fix && reports[2].utc.year == SENTINEL_YEAR);
        assert!(reports[3].has_fix && reports[3].utc.year > SENTINEL_YEAR);
    }
}
