use serde::{Deserialize, Serialize};

// Spherical Earth model
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Below this separation two points count as coincident.
const COINCIDENT_M: f64 = 1e-6;

/// Geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Haversine great-circle distance in meters.
pub fn distance_m(a: LatLon, b: LatLon) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let la1 = a.lat.to_radians();
    let la2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + la1.cos() * la2.cos() * (d_lon / 2.0).sin().powi(2);
    // clamp: rounding can push h a hair above 1 for antipodal points
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing (radians, 0 = north, clockwise positive).
/// Coincident points yield atan2(0, 0) = 0.
pub fn bearing_rad(from: LatLon, to: LatLon) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let d_lon = (to.lon - from.lon).to_radians();

    let y = d_lon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lon.cos();
    y.atan2(x)
}

/// Forward projection from `origin` along `bearing` for `distance` meters.
pub fn destination_point(origin: LatLon, distance: f64, bearing: f64) -> LatLon {
    let phi1 = origin.lat.to_radians();
    let lambda1 = origin.lon.to_radians();
    let delta = distance / EARTH_RADIUS_M;

    let (s_phi1, c_phi1) = phi1.sin_cos();
    let (s_delta, c_delta) = delta.sin_cos();

    let phi2 = (s_phi1 * c_delta + c_phi1 * s_delta * bearing.cos()).asin();
    let lambda2 = lambda1 + (bearing.sin() * s_delta * c_phi1).atan2(c_delta - s_phi1 * phi2.sin());

    LatLon {
        lat: phi2.to_degrees(),
        lon: lambda2.to_degrees(),
    }
}

/// Advance from `a` toward `b` by `step` meters along the great circle.
/// Lands exactly on `b` when the step covers the remaining distance, so
/// iterative stepping terminates without overshoot.
pub fn move_towards(a: LatLon, b: LatLon, step: f64) -> LatLon {
    let dist = distance_m(a, b);
    if dist <= COINCIDENT_M || step >= dist {
        return b;
    }
    if step <= 0.0 {
        return a;
    }
    destination_point(a, step, bearing_rad(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE_M: f64 = 0.01; // 1cm

    const DRONE_START: LatLon = LatLon::new(48.2000, 39.9000);
    const HQ: LatLon = LatLon::new(48.247165, 39.950965);

    #[test]
    fn distance_zero_for_same_point() {
        assert!(distance_m(HQ, HQ) < 1e-9);
    }

    #[test]
    fn distance_symmetric() {
        let ab = distance_m(DRONE_START, HQ);
        let ba = distance_m(HQ, DRONE_START);
        assert!((ab - ba).abs() < 1e-9, "{ab} vs {ba}");
    }

    #[test]
    fn one_degree_of_latitude() {
        // 2πR / 360 ≈ 111_195m
        let d = distance_m(LatLon::new(0.0, 0.0), LatLon::new(1.0, 0.0));
        assert!((d - 111_194.93).abs() < 1.0, "1° lat = {d}");
    }

    #[test]
    fn scenario_leg_length() {
        // drone start → HQ is roughly 6.4km
        let d = distance_m(DRONE_START, HQ);
        assert!(d > 6_000.0 && d < 7_000.0, "leg = {d}");
    }

    #[test]
    fn bearing_cardinal_directions() {
        let origin = LatLon::new(0.0, 0.0);
        let north = bearing_rad(origin, LatLon::new(1.0, 0.0));
        let east = bearing_rad(origin, LatLon::new(0.0, 1.0));
        let south = bearing_rad(origin, LatLon::new(-1.0, 0.0));

        assert!(north.abs() < 1e-12, "north: {north}");
        assert!((east - std::f64::consts::FRAC_PI_2).abs() < 1e-12, "east: {east}");
        assert!((south.abs() - std::f64::consts::PI).abs() < 1e-12, "south: {south}");
    }

    #[test]
    fn bearing_coincident_is_stable() {
        assert_eq!(bearing_rad(HQ, HQ), 0.0);
    }

    #[test]
    fn destination_inverts_distance_and_bearing() {
        let d = distance_m(DRONE_START, HQ);
        let brg = bearing_rad(DRONE_START, HQ);
        let landed = destination_point(DRONE_START, d, brg);
        let error = distance_m(landed, HQ);
        assert!(error < TOLERANCE_M, "projection error {error:.6}m");
    }

    #[test]
    fn destination_distance_matches_request() {
        for deg in [0.0_f64, 45.0, 133.0, 270.0] {
            let p = destination_point(HQ, 800.0, deg.to_radians());
            let d = distance_m(HQ, p);
            assert!((d - 800.0).abs() < TOLERANCE_M, "bearing {deg}: {d}");
        }
    }

    #[test]
    fn move_towards_returns_target_when_step_covers_distance() {
        let d = distance_m(DRONE_START, HQ);
        assert_eq!(move_towards(DRONE_START, HQ, d), HQ);
        assert_eq!(move_towards(DRONE_START, HQ, d + 1000.0), HQ);
    }

    #[test]
    fn move_towards_coincident_returns_target() {
        let nearly = LatLon::new(HQ.lat + 1e-12, HQ.lon);
        assert_eq!(move_towards(nearly, HQ, 5.0), HQ);
    }

    #[test]
    fn move_towards_progress_is_monotonic() {
        let total = distance_m(DRONE_START, HQ);
        let mut last = 0.0;
        let mut step = 0.0;
        while step <= total {
            let p = move_towards(DRONE_START, HQ, step);
            let travelled = distance_m(DRONE_START, p);
            assert!(travelled + 1e-6 >= last, "went backwards at step {step}");
            assert!((travelled - step).abs() < TOLERANCE_M, "step {step}: {travelled}");
            last = travelled;
            step += 250.0;
        }
    }

    #[test]
    fn move_towards_stays_on_great_circle() {
        let total = distance_m(DRONE_START, HQ);
        let p = move_towards(DRONE_START, HQ, 1_000.0);
        let remaining = distance_m(p, HQ);
        assert!((1_000.0 + remaining - total).abs() < TOLERANCE_M);
    }
}
