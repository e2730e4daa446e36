use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Lightning detector not connected, check wiring")]
    DetectorNotConnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Positioning receiver error: {0}")]
    Gps(String),

    #[error("Lightning detector error: {0}")]
    Detector(String),

    #[error("No valid fix after {polls} polls")]
    FixTimeout { polls: u32 },

    #[error("Fix wait cancelled after {polls} polls")]
    FixCancelled { polls: u32 },

    #[error("Malformed record: {0}")]
    Record(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;
