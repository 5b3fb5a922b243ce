use std::f64::consts::TAU;

use crate::coords::{self, LatLon};

// --- Constants ---

/// Slack on the orbit radius when deciding approach is over. Great-circle
/// stepping can land a hair outside the radius, which would otherwise leave
/// the unit creeping forward by nanometres forever.
const ORBIT_CAPTURE_M: f64 = 0.5;

// --- Types ---

#[derive(Clone, Debug)]
pub struct FlightParams {
    pub tick_ms: u64,
    pub speed_mps: f64,
    pub orbit_radius_m: f64,
    /// Time for one full revolution.
    pub orbit_period_ms: u64,
    /// Orbit time before the collected data is reported.
    pub data_after_ms: u64,
}

impl Default for FlightParams {
    fn default() -> Self {
        Self {
            tick_ms: 120,
            speed_mps: 220.0,
            orbit_radius_m: 800.0,
            orbit_period_ms: 5_000,
            data_after_ms: 5_000,
        }
    }
}

impl FlightParams {
    fn step_m(&self) -> f64 {
        self.speed_mps * self.tick_ms as f64 / 1000.0
    }

    /// rad/s
    fn angular_speed(&self) -> f64 {
        TAU / (self.orbit_period_ms as f64 / 1000.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FlightStage {
    Approach,
    Orbit { started_ms: u64, start_angle: f64 },
}

impl FlightStage {
    pub fn label(&self) -> &'static str {
        match self {
            FlightStage::Approach => "APPROACH",
            FlightStage::Orbit { .. } => "ORBIT",
        }
    }
}

/// What one tick produced.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlightTick {
    /// New position, if the unit moved.
    pub position: Option<LatLon>,
    /// Raised once per run, when orbit time first reaches `data_after_ms`.
    pub data_ready: bool,
}

/// One unit flying to a target and holding an orbit around it.
#[derive(Clone, Debug)]
pub struct FlightSim {
    pub unit_id: String,
    pub unit_name: String,
    target: LatLon,
    position: LatLon,
    stage: FlightStage,
    data_latched: bool,
    params: FlightParams,
}

impl FlightSim {
    pub fn new(
        unit_id: impl Into<String>,
        unit_name: impl Into<String>,
        start: LatLon,
        target: LatLon,
        params: FlightParams,
    ) -> Self {
        let unit_name = unit_name.into();
        log::info!(
            "[flight] {} launched, {:.0}m to target at {:.0}m/s",
            unit_name,
            coords::distance_m(start, target),
            params.speed_mps,
        );
        Self {
            unit_id: unit_id.into(),
            unit_name,
            target,
            position: start,
            stage: FlightStage::Approach,
            data_latched: false,
            params,
        }
    }

    pub fn tick(&mut self, now_ms: u64) -> FlightTick {
        match self.stage {
            FlightStage::Approach => self.tick_approach(now_ms),
            FlightStage::Orbit {
                started_ms,
                start_angle,
            } => self.tick_orbit(now_ms, started_ms, start_angle),
        }
    }

    fn tick_approach(&mut self, now_ms: u64) -> FlightTick {
        let radius = self.params.orbit_radius_m;
        let dist = coords::distance_m(self.position, self.target);

        if dist <= radius + ORBIT_CAPTURE_M {
            // Orbit picks up from the current bearing so the path stays continuous
            let start_angle = coords::bearing_rad(self.target, self.position);
            self.stage = FlightStage::Orbit {
                started_ms: now_ms,
                start_angle,
            };
            log::info!(
                "[flight] {} entering orbit at {:.0}m, angle {:.1}°",
                self.unit_name,
                dist,
                start_angle.to_degrees().rem_euclid(360.0),
            );
            // the capture tick already places the unit on the circle
            return self.tick_orbit(now_ms, now_ms, start_angle);
        }

        let allowed = (dist - radius).max(0.0);
        let step = self.params.step_m().min(allowed);
        self.position = coords::move_towards(self.position, self.target, step);
        FlightTick {
            position: Some(self.position),
            data_ready: false,
        }
    }

    fn tick_orbit(&mut self, now_ms: u64, started_ms: u64, start_angle: f64) -> FlightTick {
        let elapsed_ms = now_ms.saturating_sub(started_ms);

        let mut data_ready = false;
        if !self.data_latched && elapsed_ms >= self.params.data_after_ms {
            self.data_latched = true;
            data_ready = true;
            log::info!("[flight] {} orbit data available", self.unit_name);
        }

        let angle = start_angle + self.params.angular_speed() * (elapsed_ms as f64 / 1000.0);
        self.position = coords::destination_point(self.target, self.params.orbit_radius_m, angle);
        FlightTick {
            position: Some(self.position),
            data_ready,
        }
    }

    pub fn position(&self) -> LatLon {
        self.position
    }

    pub fn target(&self) -> LatLon {
        self.target
    }

    pub fn stage(&self) -> FlightStage {
        self.stage
    }

    pub fn distance_to_target(&self) -> f64 {
        coords::distance_m(self.position, self.target)
    }
}
