//! error types for the collection client and identity helpers

use thiserror::Error;

/// failures talking to the remote record collection
#[derive(Error, Debug)]
pub enum CollectionError {
    /// non-2xx status, transport error or unparseable body on a read
    #[error("read failed: {0}")]
    ReadFailure(String),

    /// non-2xx status or transport error on a create
    #[error("write failed: {0}")]
    WriteFailure(String),

    /// the http client could not be built
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// failures of the best-effort identity lookups
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("ip lookup request failed: {0}")]
    Request(String),

    #[error("ip lookup returned HTTP {0}")]
    Status(u16),

    #[error("failed to create ip lookup client: {0}")]
    Client(String),
}
