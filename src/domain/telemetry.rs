// Telemetry record domain models
use serde::Serialize;

/// Driving mode drawn independently every engine tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrivingMode {
    Idle,
    Cruise,
    Race,
}

impl DrivingMode {
    pub const ALL: [DrivingMode; 3] = [DrivingMode::Idle, DrivingMode::Cruise, DrivingMode::Race];
    pub const WEIGHTS: [f64; 3] = [0.10, 0.60, 0.30];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineReading {
    pub engine_rpm: u32,
    pub engine_oil_temp: f64,
    pub engine_oil_pressure: f64,
    pub engine_coolant_temp: f64,
    pub boost_pressure: f64,
    pub fuel_consumption_rate: f64,
    pub throttle_position: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrakeReading {
    pub brake_pedal_position: f64,
    pub brake_line_pressure: f64,
    pub brake_disc_temp: f64,
    pub brake_fade: f64,
}

/// One flat record per tick; serialized as the wire payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub vehicle_id: String,
    pub timestamp: i64,
    pub session_id: String,
    #[serde(flatten)]
    pub brake: BrakeReading,
    #[serde(flatten)]
    pub engine: EngineReading,
}

impl TelemetrySample {
    pub fn new(
        vehicle_id: String,
        timestamp: i64,
        session_id: String,
        brake: BrakeReading,
        engine: EngineReading,
    ) -> Self {
        Self {
            vehicle_id,
            timestamp,
            session_id,
            brake,
            engine,
        }
    }

    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
