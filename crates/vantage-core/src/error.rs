use thiserror::Error;

use vantage_api::Vid;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A protocol-channel error, surfaced as-is.
    #[error(transparent)]
    Api(#[from] vantage_api::Error),

    /// The VID is not known to the session.
    #[error("object {vid} not found")]
    NotFound { vid: Vid },

    /// An object with this VID already exists under a different kind.
    #[error("object {vid} is a {existing}, not a {requested}")]
    KindMismatch {
        vid: Vid,
        existing: &'static str,
        requested: &'static str,
    },
}

impl Error {
    /// Fatal authentication failure; never retried.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api(api) if api.is_auth())
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api(api) => api.is_not_found(),
            Self::KindMismatch { .. } => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Api(api) if api.is_transient())
    }
}
