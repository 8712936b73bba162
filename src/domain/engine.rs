// Engine sensor physics model
//
// First-order thermal model: oil heats with load and relaxes toward a 90°C
// baseline, coolant tracks oil, the turbo spools toward a throttle-derived
// target and decays when the throttle closes.
use super::telemetry::{DrivingMode, EngineReading};
use rand::Rng;
use rand::distr::weighted::{Error as WeightError, WeightedIndex};
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

const OIL_BASELINE_C: f64 = 90.0;
const OIL_TEMP_RANGE_C: (f64, f64) = (60.0, 150.0);
const COOLANT_TEMP_RANGE_C: (f64, f64) = (60.0, 130.0);
const MIN_OIL_PRESSURE_BAR: f64 = 1.0;
const MAX_BOOST_BAR: f64 = 1.8;
const OVERHEAT_PROBABILITY: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineParams {
    pub max_rpm: u32,
    pub idle_rpm: u32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            max_rpm: 9000,
            idle_rpm: 800,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub rpm: f64,
    pub oil_temp: f64,
    pub oil_pressure: f64,
    pub coolant_temp: f64,
    pub boost: f64,
    pub throttle: f64,
    pub fuel_rate: f64,
    pub mode: DrivingMode,
}

impl EngineState {
    fn idle(params: &EngineParams) -> Self {
        Self {
            rpm: params.idle_rpm as f64,
            oil_temp: 90.0,
            oil_pressure: 4.5,
            coolant_temp: 85.0,
            boost: 0.0,
            throttle: 0.0,
            fuel_rate: 0.0,
            mode: DrivingMode::Idle,
        }
    }
}

/// RPM and throttle chosen for one tick before the physics step runs.
#[derive(Debug, Clone, Copy)]
struct DriveCommand {
    mode: DrivingMode,
    rpm: f64,
    throttle: f64,
}

pub struct EngineSensor {
    params: EngineParams,
    state: EngineState,
    modes: WeightedIndex<f64>,
    rng: StdRng,
    overheat_events: u64,
}

impl EngineSensor {
    pub fn new(params: EngineParams, rng: StdRng) -> Result<Self, WeightError> {
        Ok(Self {
            state: EngineState::idle(&params),
            modes: WeightedIndex::new(DrivingMode::WEIGHTS)?,
            params,
            rng,
            overheat_events: 0,
        })
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Number of overheat anomalies injected so far.
    pub fn overheat_events(&self) -> u64 {
        self.overheat_events
    }

    /// Advance the model by one tick and return the resulting reading.
    pub fn sample(&mut self) -> EngineReading {
        let mode = self.draw_mode();
        let command = self.draw_command(mode);
        self.apply_drive(command);

        if self.rng.random_bool(OVERHEAT_PROBABILITY) {
            self.inject_overheat();
        }

        let (oil_min, oil_max) = OIL_TEMP_RANGE_C;
        let (coolant_min, coolant_max) = COOLANT_TEMP_RANGE_C;
        self.state.oil_temp = self.state.oil_temp.clamp(oil_min, oil_max);
        self.state.coolant_temp = self.state.coolant_temp.clamp(coolant_min, coolant_max);

        self.reading()
    }

    fn draw_mode(&mut self) -> DrivingMode {
        DrivingMode::ALL[self.rng.sample(&self.modes)]
    }

    fn draw_command(&mut self, mode: DrivingMode) -> DriveCommand {
        let (mean, std_dev) = match mode {
            DrivingMode::Idle => (self.params.idle_rpm as f64, 50.0),
            DrivingMode::Cruise => (3500.0, 300.0),
            DrivingMode::Race => (7500.0, 500.0),
        };
        let z: f64 = self.rng.sample(StandardNormal);
        let rpm = mean + std_dev * z;

        let throttle = match mode {
            DrivingMode::Idle => 0.0,
            DrivingMode::Cruise => self.rng.random_range(0.2..=0.4),
            DrivingMode::Race => self.rng.random_range(0.7..=1.0),
        };

        DriveCommand {
            mode,
            rpm,
            throttle,
        }
    }

    /// Deterministic part of the tick: everything except the anomaly roll
    /// and the final temperature clamp.
    fn apply_drive(&mut self, command: DriveCommand) {
        let max_rpm = self.params.max_rpm as f64;
        let state = &mut self.state;

        state.mode = command.mode;
        state.throttle = command.throttle.clamp(0.0, 1.0);
        state.rpm = command.rpm.clamp(self.params.idle_rpm as f64, max_rpm);

        let load = state.rpm / max_rpm;
        state.oil_temp += load * 0.5 - 0.2 * (state.oil_temp - OIL_BASELINE_C);

        let base_pressure = 5.0 * load;
        let temp_penalty = 0.001 * (state.oil_temp - OIL_BASELINE_C).max(0.0);
        state.oil_pressure = (base_pressure * (1.0 - temp_penalty)).max(MIN_OIL_PRESSURE_BAR);

        state.coolant_temp = state.oil_temp * 0.95;

        if state.throttle > 0.5 {
            let target = (state.throttle - 0.5) * 2.0 * MAX_BOOST_BAR;
            state.boost += (target - state.boost) * 0.3;
        } else {
            state.boost *= 0.7;
        }
        state.boost = state.boost.max(0.0);

        state.fuel_rate = 8.0 + state.throttle * 12.0;
    }

    /// Coolant leak / radiator failure: a sudden jump that only the normal
    /// cooling term brings back down.
    fn inject_overheat(&mut self) {
        self.state.coolant_temp += self.rng.random_range(20.0..=35.0);
        self.state.oil_temp += self.rng.random_range(10.0..=20.0);
        self.overheat_events += 1;
    }

    fn reading(&self) -> EngineReading {
        EngineReading {
            engine_rpm: self.state.rpm as u32,
            engine_oil_temp: self.state.oil_temp,
            engine_oil_pressure: self.state.oil_pressure,
            engine_coolant_temp: self.state.coolant_temp,
            boost_pressure: self.state.boost,
            fuel_consumption_rate: self.state.fuel_rate,
            throttle_position: self.state.throttle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sensor(seed: u64) -> EngineSensor {
        EngineSensor::new(EngineParams::default(), StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_starts_at_idle_defaults() {
        let engine = sensor(1);
        let state = engine.state();
        assert_eq!(state.rpm, 800.0);
        assert_eq!(state.oil_temp, 90.0);
        assert_eq!(state.oil_pressure, 4.5);
        assert_eq!(state.coolant_temp, 85.0);
        assert_eq!(state.boost, 0.0);
        assert_eq!(state.throttle, 0.0);
    }

    #[test]
    fn test_readings_stay_within_physical_bounds() {
        let mut engine = sensor(7);
        for _ in 0..20_000 {
            let r = engine.sample();
            assert!((800..=9000).contains(&r.engine_rpm), "rpm {}", r.engine_rpm);
            assert!((60.0..=150.0).contains(&r.engine_oil_temp));
            assert!((60.0..=130.0).contains(&r.engine_coolant_temp));
            assert!(r.engine_oil_pressure >= 1.0);
            assert!(r.boost_pressure >= 0.0);
            assert!((0.0..=1.0).contains(&r.throttle_position));
            assert!((8.0..=20.0).contains(&r.fuel_consumption_rate));
        }
    }

    #[test]
    fn test_race_tick_spools_boost() {
        let mut engine = sensor(3);
        engine.apply_drive(DriveCommand {
            mode: DrivingMode::Race,
            rpm: 7500.0,
            throttle: 0.85,
        });

        let expected = (0.85 - 0.5) * 2.0 * 1.8 * 0.3;
        assert!((engine.state().boost - expected).abs() < 1e-9);
        assert!((engine.state().boost - 0.378).abs() < 1e-9);
        assert!((engine.state().fuel_rate - 18.2).abs() < 1e-9);
    }

    #[test]
    fn test_boost_decays_when_throttle_closes() {
        let mut engine = sensor(3);
        engine.state.boost = 1.0;
        engine.apply_drive(DriveCommand {
            mode: DrivingMode::Cruise,
            rpm: 3500.0,
            throttle: 0.3,
        });
        assert!((engine.state().boost - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_oil_temperature_relaxes_toward_baseline() {
        let mut engine = sensor(3);
        engine.state.oil_temp = 120.0;
        engine.apply_drive(DriveCommand {
            mode: DrivingMode::Idle,
            rpm: 800.0,
            throttle: 0.0,
        });

        let heat = (800.0 / 9000.0) * 0.5;
        let expected = 120.0 + heat - 0.2 * 30.0;
        assert!((engine.state().oil_temp - expected).abs() < 1e-9);
        assert!((engine.state().coolant_temp - expected * 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_oil_pressure_has_floor() {
        let mut engine = sensor(3);
        engine.apply_drive(DriveCommand {
            mode: DrivingMode::Idle,
            rpm: 800.0,
            throttle: 0.0,
        });
        // 5.0 * 800/9000 is well below one bar
        assert_eq!(engine.state().oil_pressure, 1.0);
    }

    #[test]
    fn test_rpm_is_clamped_to_engine_limits() {
        let mut engine = sensor(3);
        engine.apply_drive(DriveCommand {
            mode: DrivingMode::Race,
            rpm: 12_000.0,
            throttle: 1.0,
        });
        assert_eq!(engine.state().rpm, 9000.0);

        engine.apply_drive(DriveCommand {
            mode: DrivingMode::Idle,
            rpm: 100.0,
            throttle: 0.0,
        });
        assert_eq!(engine.state().rpm, 800.0);
    }

    #[test]
    fn test_overheat_rate_matches_probability() {
        let ticks = 10_000u64;
        let mut engine = sensor(42);
        for _ in 0..ticks {
            engine.sample();
        }

        // Binomial(10_000, 0.02): mean 200, sigma ~14; allow four sigma.
        let count = engine.overheat_events();
        assert!((144..=256).contains(&count), "overheat count {count}");
    }

    #[test]
    fn test_mode_mix_follows_weights() {
        let mut engine = sensor(11);
        let mut counts = [0u32; 3];
        for _ in 0..10_000 {
            engine.sample();
            let idx = match engine.state().mode {
                DrivingMode::Idle => 0,
                DrivingMode::Cruise => 1,
                DrivingMode::Race => 2,
            };
            counts[idx] += 1;
        }
        assert!((850..=1150).contains(&counts[0]), "{counts:?}");
        assert!((5700..=6300).contains(&counts[1]), "{counts:?}");
        assert!((2700..=3300).contains(&counts[2]), "{counts:?}");
    }
}
