use crate::config::AfeMode;
use crate::error::Result;

/// Cause reported by the detector's interrupt register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptCause {
    /// Noise level above the configured floor
    Noise,
    /// Man-made disturber rejected by the detector
    Disturber,
    /// Lightning strike
    Lightning,
}

/// Lightning detector collaborator (AS3935 register interface).
///
/// Calibration setters are write-once: they are applied during
/// [`crate::detector::EventClassifier::new`] and never touched again.
pub trait LightningSensor {
    fn is_connected(&mut self) -> Result<bool>;

    fn set_mode(&mut self, mode: AfeMode) -> Result<()>;
    fn mode(&mut self) -> Result<AfeMode>;
    fn set_noise_floor(&mut self, level: u8) -> Result<()>;
    fn set_watchdog_threshold(&mut self, threshold: u8) -> Result<()>;
    fn set_spike_rejection(&mut self, setting: u8) -> Result<()>;
    fn set_tune_cap(&mut self, picofarads: u8) -> Result<()>;

    fn read_interrupt(&mut self) -> Result<InterruptCause>;
    /// Estimated storm distance in km; the estimate accumulates across events.
    fn distance_to_storm(&mut self) -> Result<f64>;
    /// Dimensionless relative intensity of the last event.
    fn lightning_energy(&mut self) -> Result<u32>;
    /// Reset the detector's accumulated statistics.
    fn clear_statistics(&mut self) -> Result<()>;
}
