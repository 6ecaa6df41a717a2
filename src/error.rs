use thiserror::Error;

/// Problems with process configuration; surfaced by the binary before any cycle runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// A single notification could not be delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("channel returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
