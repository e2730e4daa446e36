use std::time::Duration;

/// Timed yield used by every blocking loop in the node.
pub trait Delay {
    fn delay(&mut self, duration: Duration);

    fn delay_ms(&mut self, ms: u64) {
        self.delay(Duration::from_millis(ms));
    }
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
