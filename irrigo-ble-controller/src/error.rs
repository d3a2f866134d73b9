use std::time::Duration;

use irrigo_proto::{DecodeError, Verb};

use crate::transport::TransportError;

/// Every way a client operation can fail. Nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Bluetooth is not supported on this platform")]
    UnsupportedTransport,
    #[error("not connected to device")]
    NotConnected,
    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,
    #[error("already connected to {0}")]
    AlreadyConnected(String),
    #[error("connection attempt cancelled by disconnect")]
    ConnectCancelled,
    #[error("link to device lost")]
    LinkLost,
    #[error("no response to {verb} within {timeout:?}")]
    ResponseTimeout { verb: Verb, timeout: Duration },
    /// The protocol cannot tell overlapping responses apart, so only one
    /// command may be outstanding.
    #[error("cannot send {attempted}: {pending} is still awaiting a response")]
    CommandPending { pending: Verb, attempted: Verb },
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("malformed response: {0}")]
    Protocol(#[from] DecodeError),
    #[error("controller rejected {verb}: {}", message.as_deref().unwrap_or("unknown error"))]
    Controller { verb: Verb, message: Option<String> },
    #[error("unexpected response payload for {0}")]
    UnexpectedPayload(Verb),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::ClientError;

    #[test]
    fn encode_failure_is_reported() {
        let err = serde_json::from_str::<u8>("x").unwrap_err();
        let client: ClientError = err.into();
        assert!(matches!(client, ClientError::Encode(_)));
        assert!(client.to_string().starts_with("failed to encode command"));
    }
}
