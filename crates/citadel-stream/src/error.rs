use thiserror::Error;

/// Result type alias for framing operations.
pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Errors raised while encoding or decoding an artifact stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The length-prefix protocol was violated (corrupt stream).
    #[error("corrupt stream: {0}")]
    Framing(String),

    /// The caller-supplied serializer failed; fatal to the stream.
    #[error("artifact serialization failed: {0}")]
    Serialize(String),

    /// The caller-supplied deserializer rejected a completed Record.
    #[error("artifact deserialization failed: {0}")]
    Deserialize(String),

    /// An error raised by the chunk source, propagated unchanged.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_error_display() {
        let err = StreamError::Framing("record declares 99 bytes, stream ended with 3".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("corrupt stream"));
        assert!(msg.contains("99 bytes"));
    }

    #[test]
    fn test_transport_error_passes_through() {
        let err = StreamError::Transport(anyhow::anyhow!("connection reset"));
        assert_eq!(format!("{}", err), "connection reset");
    }
}
