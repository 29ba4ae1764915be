//! Crate-level error aggregation.
//!
//! Construction-time failures surface as typed module errors
//! ([`RouteError`](crate::routing::RouteError),
//! [`HttpError`](crate::http::HttpError)) folded into the unified [`Error`];
//! runtime stage failures travel through the executor as
//! [`Cause`](crate::chain::Cause) values instead, wrapped in
//! [`StageError`](crate::chain::StageError) records while they propagate.

use thiserror::Error;

use crate::chain::Cause;
use crate::http::HttpError;
use crate::routing::RouteError;

/// Result type alias for the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type aggregating the crate's failure categories.
#[derive(Debug, Error)]
pub enum Error {
    #[error("routing error: {0}")]
    Route(#[from] RouteError),

    #[error("http error: {0}")]
    Http(#[from] HttpError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("execution error: {0}")]
    Execution(Cause),
}

impl From<Cause> for Error {
    fn from(cause: Cause) -> Self {
        Error::Execution(cause)
    }
}
