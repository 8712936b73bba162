// Transport trait for the message broker
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A failure of the underlying broker call. Always eligible for retry.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(#[source] BoxError),
    #[error("broker refused connection: {0}")]
    Refused(String),
    #[error("publish failed: {0}")]
    Publish(#[source] BoxError),
    #[error("disconnect failed: {0}")]
    Disconnect(#[source] BoxError),
    #[error("{operation} did not complete within {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("broker session closed")]
    SessionClosed,
}

/// The raw broker session owned by `ResilientPublisher`.
///
/// Implementations do not retry and do not bound their own waits; the
/// publisher wraps every call in a timeout and a retry policy.
#[async_trait]
pub trait BrokerTransport: Send {
    /// Establish a fresh authenticated session and wait for the broker to accept it.
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Send one payload and wait for the broker's acknowledgement.
    async fn send(&mut self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Gracefully tear the session down.
    async fn close(&mut self) -> Result<(), TransportError>;
}
