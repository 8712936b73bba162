// Sampling loop - Drift-free generate + publish schedule for one session
use crate::application::broker_transport::BrokerTransport;
use crate::application::resilient_publisher::ResilientPublisher;
use crate::application::telemetry_generator::TelemetryGenerator;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const PROGRESS_EVERY: u64 = 100;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Absolute tick deadlines anchored to the session start.
///
/// Deadlines are computed from the tick count rather than by chaining
/// sleeps, so a slow tick never shifts the ones after it.
#[derive(Debug, Clone, Copy)]
pub struct TickSchedule {
    start: Instant,
    rate_hz: u32,
}

impl TickSchedule {
    pub fn new(start: Instant, rate_hz: u32) -> Self {
        Self {
            start,
            rate_hz: rate_hz.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.offset(1)
    }

    /// When tick `tick` (0-based) is due.
    pub fn deadline(&self, tick: u64) -> Instant {
        self.start + self.offset(tick)
    }

    /// How long to wait at `now` before tick `tick`; zero once it is overdue.
    pub fn pause_before(&self, tick: u64, now: Instant) -> Duration {
        self.deadline(tick).saturating_duration_since(now)
    }

    fn offset(&self, tick: u64) -> Duration {
        let nanos = tick as u128 * NANOS_PER_SEC / self.rate_hz as u128;
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub ticks: u64,
    pub published: u64,
    pub failed: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl SessionSummary {
    pub fn average_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.published as f64 / secs } else { 0.0 }
    }
}

pub struct SamplingLoop {
    sample_rate_hz: u32,
    session_duration: Duration,
}

impl SamplingLoop {
    pub fn new(sample_rate_hz: u32, session_duration: Duration) -> Self {
        Self {
            sample_rate_hz,
            session_duration,
        }
    }

    /// Run ticks until the session duration elapses or `cancel` fires, then
    /// disconnect the publisher.
    ///
    /// A failed tick is logged and counted; it never ends the session.
    pub async fn run<T: BrokerTransport>(
        &self,
        generator: &mut TelemetryGenerator,
        publisher: &mut ResilientPublisher<T>,
        cancel: &CancellationToken,
    ) -> SessionSummary {
        let start = Instant::now();
        let schedule = TickSchedule::new(start, self.sample_rate_hz);
        let mut summary = SessionSummary::default();

        tracing::info!(
            session_id = generator.session_id(),
            interval_ms = schedule.interval().as_millis() as u64,
            "telemetry_started"
        );

        loop {
            if cancel.is_cancelled() {
                tracing::info!(ticks = summary.ticks, "simulator_interrupted");
                summary.cancelled = true;
                break;
            }
            if start.elapsed() >= self.session_duration {
                break;
            }

            let sample = generator.generate_sample(wall_clock_seconds());
            match publisher.publish(&sample).await {
                Ok(()) => summary.published += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(tick = summary.ticks, error = %err, "telemetry_error");
                }
            }
            summary.ticks += 1;

            if summary.ticks % PROGRESS_EVERY == 0 {
                let elapsed = start.elapsed().as_secs_f64();
                tracing::info!(
                    samples = summary.ticks,
                    failed = summary.failed,
                    elapsed_secs = elapsed,
                    rate = summary.published as f64 / elapsed.max(f64::EPSILON),
                    "telemetry_progress"
                );
            }

            let pause = schedule.pause_before(summary.ticks, Instant::now());
            if !pause.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }

        summary.elapsed = start.elapsed();
        publisher.disconnect().await;

        tracing::info!(
            samples = summary.published,
            failed = summary.failed,
            duration_secs = summary.elapsed.as_secs_f64(),
            avg_rate = summary.average_rate(),
            cancelled = summary.cancelled,
            "simulator_finished"
        );
        summary
    }
}

fn wall_clock_seconds() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
