use tether_property::PropertyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode envelope: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("applying received value: {0}")]
    Property(#[from] PropertyError),
}
