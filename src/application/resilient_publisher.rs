// Resilient publisher - Broker connection lifecycle and acknowledged publishing
use crate::application::broker_transport::{BrokerTransport, TransportError};
use crate::application::retry::{RetryExecutor, RetryPolicy};
use crate::domain::telemetry::TelemetrySample;
use bytes::Bytes;
use futures::FutureExt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("not connected to broker (state: {0:?})")]
    NotConnected(ConnectionState),
    #[error("failed to encode telemetry payload")]
    Encode(#[from] serde_json::Error),
    #[error("{operation} failed after {attempts} attempts")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        last: TransportError,
    },
}

pub struct ResilientPublisher<T> {
    transport: T,
    topic: String,
    state: ConnectionState,
    retry: RetryExecutor,
    connect_policy: RetryPolicy,
    publish_policy: RetryPolicy,
}

impl<T: BrokerTransport> ResilientPublisher<T> {
    pub fn new(transport: T, topic: impl Into<String>, retry: RetryExecutor) -> Self {
        Self {
            transport,
            topic: topic.into(),
            state: ConnectionState::Disconnected,
            retry,
            connect_policy: RetryPolicy::CONNECT,
            publish_policy: RetryPolicy::PUBLISH,
        }
    }

    pub fn with_policies(mut self, connect: RetryPolicy, publish: RetryPolicy) -> Self {
        self.connect_policy = connect;
        self.publish_policy = publish;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open the broker session, retrying with the connect policy.
    /// Each attempt is bounded to 10s.
    pub async fn connect(&mut self) -> Result<(), PublisherError> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }

        let attempt = ConnectAttempt::begin(&mut self.state);
        tracing::info!(topic = %self.topic, "iot_connecting");

        let policy = self.connect_policy;
        let result = self
            .retry
            .execute("connect", &policy, &mut self.transport, |transport| {
                bounded("connect", CONNECT_TIMEOUT, transport.open()).boxed()
            })
            .await;

        match result {
            Ok(()) => {
                attempt.succeed();
                tracing::info!("iot_connected");
                Ok(())
            }
            Err(last) => {
                drop(attempt);
                Err(PublisherError::RetryExhausted {
                    operation: "connect",
                    attempts: policy.max_attempts(),
                    last,
                })
            }
        }
    }

    /// Serialize `sample` and send it with broker acknowledgement.
    ///
    /// Fails immediately, without touching the transport, unless connected.
    pub async fn publish(&mut self, sample: &TelemetrySample) -> Result<(), PublisherError> {
        if self.state != ConnectionState::Connected {
            return Err(PublisherError::NotConnected(self.state));
        }

        let payload = Bytes::from(sample.to_payload()?);
        let size = payload.len();
        let topic = self.topic.clone();
        let policy = self.publish_policy;

        self.retry
            .execute("publish", &policy, &mut self.transport, move |transport| {
                let topic = topic.clone();
                let payload = payload.clone();
                async move { bounded("publish", PUBLISH_TIMEOUT, transport.send(&topic, payload)).await }
                    .boxed()
            })
            .await
            .map_err(|last| PublisherError::RetryExhausted {
                operation: "publish",
                attempts: policy.max_attempts(),
                last,
            })?;

        tracing::debug!(
            topic = %self.topic,
            size,
            vehicle_id = %sample.vehicle_id,
            "message_published"
        );
        Ok(())
    }

    /// Tear the session down. A no-op unless connected; teardown errors are
    /// logged and the publisher always ends up disconnected.
    pub async fn disconnect(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }

        self.state = ConnectionState::Disconnecting;
        tracing::info!("iot_disconnecting");

        if let Err(err) = bounded("disconnect", DISCONNECT_TIMEOUT, self.transport.close()).await {
            tracing::warn!(error = %err, "iot_disconnect_failed");
        }

        self.state = ConnectionState::Disconnected;
        tracing::info!("iot_disconnected");
    }
}

/// Holds the publisher in `Connecting` for one `connect` call. Dropping it
/// without `succeed`, including when the connect future itself is dropped,
/// returns the publisher to `Disconnected`.
struct ConnectAttempt<'a> {
    state: &'a mut ConnectionState,
}

impl<'a> ConnectAttempt<'a> {
    fn begin(state: &'a mut ConnectionState) -> Self {
        *state = ConnectionState::Connecting;
        Self { state }
    }

    fn succeed(self) {
        *self.state = ConnectionState::Connected;
    }
}

impl Drop for ConnectAttempt<'_> {
    fn drop(&mut self) {
        if *self.state == ConnectionState::Connecting {
            *self.state = ConnectionState::Disconnected;
        }
    }
}

async fn bounded<F>(operation: &'static str, limit: Duration, call: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(TransportError::Timeout {
            operation,
            after: limit,
        }))
}
