use crate::domain::brake::BrakeParams;
use crate::domain::engine::EngineParams;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "REDLINE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration from {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },
    #[error("invalid configuration: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    pub vehicle: VehicleSettings,
    pub iot: IotSettings,
    pub brake: BrakeSettings,
    pub engine: EngineSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VehicleSettings {
    pub vehicle_id: String,
    pub session_duration_sec: u64,
    pub sample_rate_hz: u32,
    /// Seeds every random source when set, for reproducible sessions.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IotSettings {
    pub endpoint: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub topic: String,
    pub cert_path: PathBuf,
    pub private_key_path: PathBuf,
    pub ca_path: PathBuf,
    pub thing_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrakeSettings {
    pub fade_coefficient: f64,
    pub cooling_rate: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    pub max_rpm: u32,
    pub idle_rpm: u32,
}

fn default_port() -> u16 {
    8883
}

impl VehicleSettings {
    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_sec)
    }

    /// Random source for one consumer. Each `stream` gets its own sequence
    /// so sensors and retry jitter never share draws.
    pub fn rng(&self, stream: u64) -> StdRng {
        match self.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_os_rng(),
        }
    }
}

impl BrakeSettings {
    pub fn params(&self) -> BrakeParams {
        BrakeParams {
            fade_coefficient: self.fade_coefficient,
            cooling_rate: self.cooling_rate,
        }
    }
}

impl EngineSettings {
    pub fn params(&self) -> EngineParams {
        EngineParams {
            max_rpm: self.max_rpm,
            idle_rpm: self.idle_rpm,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.vehicle.vehicle_id.trim().is_empty() {
            return invalid("vehicle.vehicle_id", "must not be empty");
        }
        if self.vehicle.sample_rate_hz == 0 {
            return invalid("vehicle.sample_rate_hz", "must be at least 1");
        }
        if self.vehicle.session_duration_sec == 0 {
            return invalid("vehicle.session_duration_sec", "must be at least 1");
        }
        if self.engine.idle_rpm == 0 || self.engine.idle_rpm >= self.engine.max_rpm {
            return invalid("engine.idle_rpm", "must be positive and below engine.max_rpm");
        }
        for (field, value) in [
            ("brake.fade_coefficient", self.brake.fade_coefficient),
            ("brake.cooling_rate", self.brake.cooling_rate),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return invalid(field, "must be in (0, 1]");
            }
        }
        for (field, value) in [
            ("iot.endpoint", &self.iot.endpoint),
            ("iot.topic", &self.iot.topic),
            ("iot.thing_name", &self.iot.thing_name),
        ] {
            if value.trim().is_empty() {
                return invalid(field, "must not be empty");
            }
        }
        Ok(())
    }
}

/// Load the YAML file at `path`, apply `REDLINE__SECTION__KEY` environment
/// overrides, and validate the result.
pub fn load_config(path: &Path) -> Result<SimulatorConfig, ConfigError> {
    load_with_env(path, env_overrides())
}

fn env_overrides() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn load_with_env(path: &Path, environment: config::Environment) -> Result<SimulatorConfig, ConfigError> {
    let load_error = |source| ConfigError::Load {
        path: path.to_path_buf(),
        source,
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(environment)
        .build()
        .map_err(load_error)?;

    let config: SimulatorConfig = settings.try_deserialize().map_err(load_error)?;
    config.validate()?;
    Ok(config)
}
