use crate::flight::FlightParams;

/// Scenario timing and geometry.
#[derive(Clone, Debug)]
pub struct Settings {
    pub api_base: String,
    /// Delay before the hidden HQ reveals itself.
    pub reveal_delay_ms: u64,
    pub health_poll_ms: u64,
    /// Lat/lon tolerance (degrees) of the geometric HQ match.
    pub hq_match_tolerance_deg: f64,
    pub flight: FlightParams,
}

impl Settings {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            reveal_delay_ms: 5_000,
            health_poll_ms: 4_000,
            hq_match_tolerance_deg: 1e-4, // ~11m
            flight: FlightParams::default(),
        }
    }
}
