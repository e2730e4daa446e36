//! Simulated hardware for tests and bench runs.

mod scripted;
#[cfg(feature = "simulation")]
mod storm;

pub use scripted::{
    CalibrationLog, ManualClock, MemorySink, RecordingDelay, RecordingPin, ScriptedGps,
    ScriptedPin, ScriptedSensor,
};
#[cfg(feature = "simulation")]
pub use storm::{SimulatedGps, SimulatedStorm, StormConfig, StormPin, StormSensor};
