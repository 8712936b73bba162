// Application layer - Resilient publishing pipeline
pub mod broker_transport;
pub mod resilient_publisher;
pub mod retry;
pub mod sampling_loop;
pub mod telemetry_generator;

#[cfg(test)]
pub mod testing;
