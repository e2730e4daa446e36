//! Capability handles for the node's hardware collaborators.
//!
//! Bus and pin setup happen outside this crate; components receive these
//! handles at construction so the same code runs against real peripherals
//! and against the doubles in [`crate::simulation`].

pub mod cancel;
pub mod delay;
pub mod gps;
pub mod pins;
pub mod sensor;

pub use cancel::CancelToken;
pub use delay::{Delay, StdDelay};
pub use gps::{FixStatus, GpsReceiver};
pub use pins::{InputPin, NullPin, OutputPin};
pub use sensor::{InterruptCause, LightningSensor};
