//! Error types for the Citadel client SDK.

use citadel_stream::StreamError;
use thiserror::Error;

/// Core error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to establish or maintain the gRPC channel.
    #[error("connection error: {0}")]
    Connect(#[from] tonic::transport::Error),

    /// The server rejected or failed an RPC.
    #[error("rpc error: {0}")]
    Rpc(#[from] tonic::Status),

    /// Framing or (de)serialization failure in the artifact stream.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A reconstructed artifact had an unexpected structure.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A run produced no (or no further) metrics within the polling timeout.
    #[error("metric polling timed out: {0}")]
    Timeout(String),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
