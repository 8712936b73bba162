// Library root - Resilient vehicle telemetry publishing pipeline
pub mod application;
pub mod domain;
pub mod infrastructure;
