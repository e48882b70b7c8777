//! Error types shared across the crate.

use reqwest::StatusCode;

use crate::api_client::types::MinerId;

/// Everything that can go wrong talking to the crew backend or acting
/// on operator input.
///
/// `Transport`, `Status` and `Decode` are the transport class: they are
/// never fatal to the dashboard and are surfaced inline while polling
/// continues on its normal cadence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no miner selected")]
    NoSelection,

    #[error("miner {0} has no pending delta")]
    NoDeltaHash(MinerId),

    /// The control for this action is off: nothing to apply, or an
    /// update is already in flight.
    #[error("{0} is not available for the selected miner")]
    ControlDisabled(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("dashboard is not running")]
    Closed,
}

impl Error {
    /// True for failures of the network round trip itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::Status { .. } | Error::Decode { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_names_url_and_code() {
        let err = Error::Status {
            url: "http://crew/miners".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert_eq!(
            err.to_string(),
            "http://crew/miners returned 503 Service Unavailable"
        );
        assert!(err.is_transport());
    }

    #[test]
    fn operator_errors_are_not_transport() {
        assert!(!Error::NoSelection.is_transport());
        assert!(!Error::NoDeltaHash(MinerId(0x2a)).is_transport());
        assert_eq!(
            Error::NoDeltaHash(MinerId(0x2a)).to_string(),
            "miner 0x2a has no pending delta"
        );
    }
}
