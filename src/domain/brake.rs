// Brake sensor physics model
use super::telemetry::BrakeReading;
use rand::Rng;
use rand::distr::weighted::{Error as WeightError, WeightedIndex};
use rand::rngs::StdRng;

const AMBIENT_C: f64 = 25.0;
const MAX_DISC_TEMP_C: f64 = 800.0;
const MAX_LINE_PRESSURE_BAR: f64 = 120.0;
const HEAT_PER_PEDAL_C: f64 = 60.0;
const FADE_ANOMALY_PROBABILITY: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrakeParams {
    /// Fade gained per tick at full pedal.
    pub fade_coefficient: f64,
    /// Fraction of the excess over ambient shed per tick.
    pub cooling_rate: f64,
}

impl Default for BrakeParams {
    fn default() -> Self {
        Self {
            fade_coefficient: 0.05,
            cooling_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrakingDemand {
    Coast,
    Light,
    Hard,
}

impl BrakingDemand {
    const ALL: [BrakingDemand; 3] = [BrakingDemand::Coast, BrakingDemand::Light, BrakingDemand::Hard];
    const WEIGHTS: [f64; 3] = [0.60, 0.30, 0.10];
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrakeState {
    pub pedal: f64,
    pub line_pressure: f64,
    pub disc_temp: f64,
    pub fade: f64,
}

impl Default for BrakeState {
    fn default() -> Self {
        Self {
            pedal: 0.0,
            line_pressure: 0.0,
            disc_temp: AMBIENT_C,
            fade: 0.0,
        }
    }
}

pub struct BrakeSensor {
    params: BrakeParams,
    state: BrakeState,
    demands: WeightedIndex<f64>,
    rng: StdRng,
    fade_events: u64,
}

impl BrakeSensor {
    pub fn new(params: BrakeParams, rng: StdRng) -> Result<Self, WeightError> {
        Ok(Self {
            params,
            state: BrakeState::default(),
            demands: WeightedIndex::new(BrakingDemand::WEIGHTS)?,
            rng,
            fade_events: 0,
        })
    }

    pub fn state(&self) -> &BrakeState {
        &self.state
    }

    pub fn fade_events(&self) -> u64 {
        self.fade_events
    }

    pub fn sample(&mut self) -> BrakeReading {
        let pedal = match self.draw_demand() {
            BrakingDemand::Coast => 0.0,
            BrakingDemand::Light => self.rng.random_range(0.1..=0.4),
            BrakingDemand::Hard => self.rng.random_range(0.6..=1.0),
        };
        self.apply_pedal(pedal);

        if self.rng.random_bool(FADE_ANOMALY_PROBABILITY) {
            self.inject_fade();
        }

        self.state.disc_temp = self.state.disc_temp.clamp(AMBIENT_C, MAX_DISC_TEMP_C);
        self.state.fade = self.state.fade.clamp(0.0, 1.0);
        self.state.line_pressure = self.state.line_pressure.max(0.0);

        BrakeReading {
            brake_pedal_position: self.state.pedal,
            brake_line_pressure: self.state.line_pressure,
            brake_disc_temp: self.state.disc_temp,
            brake_fade: self.state.fade,
        }
    }

    fn draw_demand(&mut self) -> BrakingDemand {
        BrakingDemand::ALL[self.rng.sample(&self.demands)]
    }

    fn apply_pedal(&mut self, pedal: f64) {
        let BrakeParams {
            fade_coefficient,
            cooling_rate,
        } = self.params;
        let state = &mut self.state;

        state.pedal = pedal.clamp(0.0, 1.0);
        state.disc_temp += state.pedal * HEAT_PER_PEDAL_C - cooling_rate * (state.disc_temp - AMBIENT_C);
        state.fade = (state.fade + fade_coefficient * state.pedal - cooling_rate * state.fade).clamp(0.0, 1.0);
        state.line_pressure = MAX_LINE_PRESSURE_BAR * state.pedal * (1.0 - 0.5 * state.fade);
    }

    fn inject_fade(&mut self) {
        self.state.disc_temp += self.rng.random_range(100.0..=200.0);
        self.state.fade += self.rng.random_range(0.1..=0.2);
        self.fade_events += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sensor(seed: u64) -> BrakeSensor {
        BrakeSensor::new(BrakeParams::default(), StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_readings_stay_within_bounds() {
        let mut brake = sensor(5);
        for _ in 0..20_000 {
            let r = brake.sample();
            assert!((0.0..=1.0).contains(&r.brake_pedal_position));
            assert!((25.0..=800.0).contains(&r.brake_disc_temp));
            assert!((0.0..=1.0).contains(&r.brake_fade));
            assert!((0.0..=120.0).contains(&r.brake_line_pressure));
        }
    }

    #[test]
    fn test_sustained_braking_builds_fade() {
        let mut brake = sensor(5);
        for _ in 0..50 {
            brake.apply_pedal(1.0);
        }
        let hot = brake.state().clone();
        // fixed point of fade += 0.05 - 0.1 * fade
        assert!((hot.fade - 0.5).abs() < 0.01, "fade {}", hot.fade);
        assert!(hot.disc_temp > 600.0);
        assert!(hot.line_pressure < 120.0 * 0.8);

        for _ in 0..100 {
            brake.apply_pedal(0.0);
        }
        assert!(brake.state().fade < 0.01);
        assert!(brake.state().disc_temp < 30.0);
        assert_eq!(brake.state().line_pressure, 0.0);
    }

    #[test]
    fn test_single_application_from_rest() {
        let mut brake = sensor(5);
        brake.apply_pedal(0.5);

        let state = brake.state();
        assert!((state.disc_temp - 55.0).abs() < 1e-9);
        assert!((state.fade - 0.025).abs() < 1e-9);
        assert!((state.line_pressure - 120.0 * 0.5 * (1.0 - 0.0125)).abs() < 1e-9);
    }

    #[test]
    fn test_fade_anomaly_rate_matches_probability() {
        let mut brake = sensor(99);
        for _ in 0..10_000 {
            brake.sample();
        }
        let count = brake.fade_events();
        assert!((144..=256).contains(&count), "fade events {count}");
    }

    #[test]
    fn test_demand_mix_follows_weights() {
        let mut brake = sensor(13);
        let mut counts = [0u32; 3];
        for _ in 0..10_000 {
            let pedal = brake.sample().brake_pedal_position;
            let idx = if pedal == 0.0 {
                0
            } else if pedal <= 0.4 {
                1
            } else {
                2
            };
            counts[idx] += 1;
        }
        assert!((5700..=6300).contains(&counts[0]), "{counts:?}");
        assert!((2700..=3300).contains(&counts[1]), "{counts:?}");
        assert!((850..=1150).contains(&counts[2]), "{counts:?}");
    }
}
