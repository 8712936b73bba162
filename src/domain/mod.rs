// Domain layer - Telemetry records and sensor physics
pub mod brake;
pub mod engine;
pub mod telemetry;
