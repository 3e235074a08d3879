// MIT License
// Rust translation of lib/radiora2.js

/// All errors that can occur in the radiora2-bridge library.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected login prompt: {prompt:?}")]
    UnexpectedPrompt { prompt: String },

    #[error("Query timeout: {command}")]
    QueryTimeout { command: String },

    #[error("Socket disconnected")]
    Disconnected,

    #[error("Session task has shut down")]
    SessionClosed,

    #[error("Invalid response: {details}")]
    InvalidResponse { details: String },

    #[error("Channel closed")]
    ChannelClosed,
}

impl BridgeError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Io(_)
                | BridgeError::Disconnected
                | BridgeError::QueryTimeout { .. }
                | BridgeError::ChannelClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(BridgeError::Disconnected.is_retryable());
        assert!(
            BridgeError::QueryTimeout {
                command: "?OUTPUT,1,1".to_string()
            }
            .is_retryable()
        );
        assert!(
            !BridgeError::UnexpectedPrompt {
                prompt: "Username: ".to_string()
            }
            .is_retryable()
        );
        assert!(!BridgeError::SessionClosed.is_retryable());
    }
}
