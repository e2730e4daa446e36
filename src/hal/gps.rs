use crate::clock::CalendarTime;
use crate::error::Result;
use crate::position::Coordinates;

/// Result of one receiver status query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixStatus {
    /// Whether the receiver currently claims a position fix
    pub has_fix: bool,
    /// Last UTC calendar time the receiver reported
    pub utc: CalendarTime,
}

/// Positioning receiver collaborator.
pub trait GpsReceiver {
    /// Drive the receiver's power enable line.
    fn set_power(&mut self, on: bool) -> Result<()>;

    /// Send one raw configuration command (without framing).
    fn send_command(&mut self, command: &[u8]) -> Result<()>;

    /// Refresh receiver state and report fix flag plus last UTC time.
    fn update(&mut self) -> Result<FixStatus>;

    /// Last reported position, if any.
    fn position(&self) -> Option<Coordinates>;
}

impl<G: GpsReceiver + ?Sized> GpsReceiver for Box<G> {
    fn set_power(&mut self, on: bool) -> Result<()> {
        (**self).set_power(on)
    }

    fn send_command(&mut self, command: &[u8]) -> Result<()> {
        (**self).send_command(command)
    }

    fn update(&mut self) -> Result<FixStatus> {
        (**self).update()
    }

    fn position(&self) -> Option<Coordinates> {
        (**self).position()
    }
}
