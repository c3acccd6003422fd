use thiserror::Error;

/// Failure of an outbound call to a market-data or payment API.
///
/// A `Transport` or 5xx `Status` error says nothing about remote state: an
/// invoice that failed to poll is "unknown", never "not paid".
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("unexpected response shape: {0}")]
    Decode(String),
}
