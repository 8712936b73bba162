// Scripted in-memory broker for publisher and sampling loop tests
use crate::application::broker_transport::{BrokerTransport, TransportError};
use crate::domain::telemetry::{BrakeReading, EngineReading, TelemetrySample};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
pub struct FakeTransport {
    pub fail_opens: u32,
    pub fail_sends: u32,
    pub hang_open: bool,
    pub hang_send: bool,
    pub fail_close: bool,
    /// The first `slow_sends` sends take `send_delay` before completing.
    pub slow_sends: u32,
    pub send_delay: Duration,

    pub opens: u32,
    pub send_attempts: u32,
    pub closes: u32,
    pub sent_at: Vec<Instant>,
    pub delivered: Vec<(String, Bytes)>,
}

#[async_trait]
impl BrokerTransport for FakeTransport {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.opens += 1;
        if self.hang_open {
            std::future::pending::<()>().await;
        }
        if self.opens <= self.fail_opens {
            return Err(TransportError::Connect("broker unreachable".into()));
        }
        Ok(())
    }

    async fn send(&mut self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        self.send_attempts += 1;
        self.sent_at.push(Instant::now());
        if self.hang_send {
            std::future::pending::<()>().await;
        }
        if self.send_attempts <= self.slow_sends {
            tokio::time::sleep(self.send_delay).await;
        }
        if self.send_attempts <= self.fail_sends {
            return Err(TransportError::Publish("no puback".into()));
        }
        self.delivered.push((topic.to_string(), payload));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closes += 1;
        if self.fail_close {
            return Err(TransportError::Disconnect("socket reset".into()));
        }
        Ok(())
    }
}

pub fn sample() -> TelemetrySample {
    TelemetrySample::new(
        "vehicle-test".to_string(),
        1_700_000_000_000,
        "00000000-0000-4000-8000-000000000000".to_string(),
        BrakeReading {
            brake_pedal_position: 0.0,
            brake_line_pressure: 0.0,
            brake_disc_temp: 25.0,
            brake_fade: 0.0,
        },
        EngineReading {
            engine_rpm: 800,
            engine_oil_temp: 90.0,
            engine_oil_pressure: 4.5,
            engine_coolant_temp: 85.0,
            boost_pressure: 0.0,
            fuel_consumption_rate: 8.0,
            throttle_position: 0.0,
        },
    )
}
