pub mod clock;
pub mod config;
pub mod constants;
pub mod detector;
pub mod error;
pub mod hal;
pub mod nmea;
pub mod node;
pub mod output;
pub mod position;
pub mod record;

#[cfg(any(test, feature = "simulation"))]
pub mod simulation;

pub use config::NodeConfig;
pub use error::{NodeError, Result};
pub use node::SensorNode;
