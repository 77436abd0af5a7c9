//! Solr error types.

use thiserror::Error;

pub type SolrResult<T> = Result<T, SolrError>;

#[derive(Debug, Error)]
pub enum SolrError {
    /// An admin action reported failure. `payload` is the raw response.
    #[error("{message}:\n{payload}")]
    Operation { message: String, payload: String },

    /// The request could not be sent or the response not read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body was not what the action returns.
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}
