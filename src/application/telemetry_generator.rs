// Telemetry generator - Combines sensor readings into one record per tick
use crate::domain::brake::BrakeSensor;
use crate::domain::engine::EngineSensor;
use crate::domain::telemetry::TelemetrySample;
use crate::infrastructure::config::SimulatorConfig;
use rand::distr::weighted::Error as WeightError;
use uuid::Uuid;

const ENGINE_RNG_STREAM: u64 = 1;
const BRAKE_RNG_STREAM: u64 = 2;

pub struct TelemetryGenerator {
    vehicle_id: String,
    session_id: String,
    engine: EngineSensor,
    brake: BrakeSensor,
}

impl TelemetryGenerator {
    pub fn new(vehicle_id: impl Into<String>, engine: EngineSensor, brake: BrakeSensor) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            session_id: Uuid::new_v4().to_string(),
            engine,
            brake,
        }
    }

    pub fn from_config(config: &SimulatorConfig) -> Result<Self, WeightError> {
        let engine = EngineSensor::new(config.engine.params(), config.vehicle.rng(ENGINE_RNG_STREAM))?;
        let brake = BrakeSensor::new(config.brake.params(), config.vehicle.rng(BRAKE_RNG_STREAM))?;
        Ok(Self::new(config.vehicle.vehicle_id.clone(), engine, brake))
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Sample every sensor once; `timestamp` is seconds since the epoch.
    pub fn generate_sample(&mut self, timestamp: f64) -> TelemetrySample {
        let brake = self.brake.sample();
        let engine = self.engine.sample();

        TelemetrySample::new(
            self.vehicle_id.clone(),
            (timestamp * 1000.0).round() as i64,
            self.session_id.clone(),
            brake,
            engine,
        )
    }
}
