use crate::error::Result;

/// Digital input, e.g. the detector's interrupt line (pull-down).
pub trait InputPin {
    fn is_high(&mut self) -> Result<bool>;
}

/// Digital output, e.g. the indicator LED or the receiver's power enable.
pub trait OutputPin {
    fn set(&mut self, high: bool) -> Result<()>;

    fn set_high(&mut self) -> Result<()> {
        self.set(true)
    }

    fn set_low(&mut self) -> Result<()> {
        self.set(false)
    }
}

/// Unwired pin: reads low, ignores writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPin;

impl InputPin for NullPin {
    fn is_high(&mut self) -> Result<bool> {
        Ok(false)
    }
}

impl OutputPin for NullPin {
    fn set(&mut self, _high: bool) -> Result<()> {
        Ok(())
    }
}
