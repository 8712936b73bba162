// MQTT over mutual TLS broker transport
use crate::application::broker_transport::{BrokerTransport, TransportError};
use crate::infrastructure::config::IotSettings;
use crate::infrastructure::credentials::Credentials;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    TlsConfiguration, Transport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 10;
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// Publish progress reported by the event loop driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// A publish left the request queue and was assigned this packet id.
    Sent(u16),
    /// The broker acknowledged this packet id.
    Acked(u16),
}

/// Pairs the newest enqueued publish with its packet id, then its PUBACK.
///
/// Publishes leave the request queue in order, so the newest one is the
/// `Sent` that brings the in-flight count back to zero. Acks for any other
/// packet id belong to abandoned attempts.
#[derive(Debug, Default)]
struct AckMatcher {
    in_flight: usize,
    awaiting: Option<u16>,
}

impl AckMatcher {
    fn enqueued(&mut self) {
        self.in_flight += 1;
        self.awaiting = None;
    }

    /// True once the newest publish has been acknowledged.
    fn observe(&mut self, delivery: Delivery) -> bool {
        match delivery {
            Delivery::Sent(pkid) => {
                if self.in_flight > 0 {
                    self.in_flight -= 1;
                    if self.in_flight == 0 {
                        self.awaiting = Some(pkid);
                    }
                }
                false
            }
            Delivery::Acked(pkid) => self.awaiting == Some(pkid),
        }
    }
}

struct Session {
    client: AsyncClient,
    deliveries: mpsc::UnboundedReceiver<Delivery>,
    matcher: AckMatcher,
    driver: JoinHandle<()>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// rumqttc-backed transport: persistent session, QoS 1 publishes.
pub struct MqttTransport {
    client_id: String,
    host: String,
    port: u16,
    credentials: Arc<Credentials>,
    session: Option<Session>,
}

impl MqttTransport {
    pub fn new(settings: &IotSettings, credentials: Arc<Credentials>) -> Self {
        Self {
            client_id: settings.thing_name.clone(),
            host: settings.endpoint.clone(),
            port: settings.port,
            credentials,
            session: None,
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(KEEP_ALIVE);
        // keep broker-side session state across reconnects
        options.set_clean_session(false);
        options.set_transport(Transport::Tls(TlsConfiguration::Simple {
            ca: self.credentials.ca_chain.clone(),
            alpn: None,
            client_auth: Some((
                self.credentials.client_cert.clone(),
                self.credentials.private_key.clone(),
            )),
        }));
        options
    }
}

#[async_trait]
impl BrokerTransport for MqttTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.session = None;

        tracing::debug!(host = %self.host, port = self.port, client_id = %self.client_id, "mqtt_open");
        let (client, mut eventloop) = AsyncClient::new(self.options(), REQUEST_CAPACITY);

        loop {
            let event = eventloop
                .poll()
                .await
                .map_err(|err| TransportError::Connect(Box::new(err)))?;

            if let Event::Incoming(Packet::ConnAck(ack)) = event {
                if ack.code != ConnectReturnCode::Success {
                    return Err(TransportError::Refused(format!("{:?}", ack.code)));
                }
                tracing::debug!(session_present = ack.session_present, "mqtt_connack");
                break;
            }
        }

        let (delivery_tx, deliveries) = mpsc::unbounded_channel();
        let driver = tokio::spawn(drive(eventloop, delivery_tx));
        self.session = Some(Session {
            client,
            deliveries,
            matcher: AckMatcher::default(),
            driver,
        });
        Ok(())
    }

    async fn send(&mut self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let session = self.session.as_mut().ok_or(TransportError::SessionClosed)?;

        while let Ok(delivery) = session.deliveries.try_recv() {
            session.matcher.observe(delivery);
        }

        session
            .client
            .publish_bytes(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|err| TransportError::Publish(Box::new(err)))?;
        session.matcher.enqueued();

        while let Some(delivery) = session.deliveries.recv().await {
            if session.matcher.observe(delivery) {
                tracing::trace!(?delivery, "mqtt_puback");
                return Ok(());
            }
        }
        Err(TransportError::SessionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        session
            .client
            .disconnect()
            .await
            .map_err(|err| TransportError::Disconnect(Box::new(err)))?;
        (&mut session.driver)
            .await
            .map_err(|err| TransportError::Disconnect(Box::new(err)))
    }
}

/// Polls the event loop for the life of the session, forwarding outgoing
/// publish and PUBACK packet ids. rumqttc reconnects on the next poll after
/// an error.
async fn drive(mut eventloop: EventLoop, deliveries: mpsc::UnboundedSender<Delivery>) {
    loop {
        let delivery = match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => Delivery::Sent(pkid),
            Ok(Event::Incoming(Packet::PubAck(ack))) => Delivery::Acked(ack.pkid),
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => continue,
            Err(ConnectionError::RequestsDone) => break,
            Err(err) => {
                tracing::warn!(error = %err, "mqtt_connection_lost");
                tokio::time::sleep(RECONNECT_PAUSE).await;
                continue;
            }
        };
        if deliveries.send(delivery).is_err() {
            break;
        }
    }
}
