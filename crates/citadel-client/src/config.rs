//! Configuration for the Citadel client.

use citadel_stream::DEFAULT_CHUNK_SIZE;
use serde::Deserialize;

use crate::error::{ClientError, Result};

/// Number of samples grouped into one dataset batch artifact by default.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

fn default_endpoint() -> String {
    "http://127.0.0.1:50056".to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_connect_retries() -> usize {
    3
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Server endpoint URL (e.g., "http://localhost:50056").
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Upper bound on the size of one uploaded chunk, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Number of samples per dataset batch artifact.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Connection attempts before giving up.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            chunk_size: default_chunk_size(),
            batch_size: default_batch_size(),
            connect_retries: default_connect_retries(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given endpoint with default sizes.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Self::default() }
    }

    /// Check that the configured sizes are usable.
    ///
    /// # Errors
    /// Returns `ClientError::Config` if a size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ClientError::Config("chunk_size must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ClientError::Config("batch_size must be positive".to_string()));
        }
        if self.connect_retries == 0 {
            return Err(ClientError::Config("connect_retries must be positive".to_string()));
        }
        Ok(())
    }
}
