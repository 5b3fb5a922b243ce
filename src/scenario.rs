use crate::coords::LatLon;
use crate::units::{normalize_name, Echelon, Side, Unit, UnitType};

/// The hidden headquarters the scenario reveals.
pub struct ScenarioHq {
    pub name: &'static str,
    pub side: Side,
    pub unit_type: UnitType,
    pub echelon: Echelon,
    pub position: LatLon,
}

pub const SCENARIO_HQ: ScenarioHq = ScenarioHq {
    name: "RUS-HQ-COMINT",
    side: Side::Unknown,
    unit_type: UnitType::CommandPost,
    echelon: Echelon::Brigade,
    position: LatLon::new(48.247165, 39.950965),
};

/// Locate the scenario HQ: exact (normalized) name, or matching
/// side/type/echelon within `tolerance_deg` on both axes.
pub fn find_scenario_hq(units: &[Unit], tolerance_deg: f64) -> Option<&Unit> {
    units.iter().find(|u| {
        if normalize_name(&u.name) == SCENARIO_HQ.name {
            return true;
        }
        u.side == SCENARIO_HQ.side
            && u.unit_type == SCENARIO_HQ.unit_type
            && u.echelon == Some(SCENARIO_HQ.echelon)
            && (u.position.lat - SCENARIO_HQ.position.lat).abs() <= tolerance_deg
            && (u.position.lon - SCENARIO_HQ.position.lon).abs() <= tolerance_deg
    })
}

/// Identity of the tracked HQ unit.
#[derive(Clone, Debug, PartialEq)]
pub struct HqRef {
    pub id: String,
    pub name: String,
    pub position: LatLon,
}

impl From<&Unit> for HqRef {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id.clone(),
            name: unit.name.clone(),
            position: unit.position,
        }
    }
}

/// Delayed one-shot reveal of the scenario HQ.
pub struct RevealController {
    delay_ms: u64,
    tolerance_deg: f64,
    hq: Option<HqRef>,
    revealed: bool,
    alert_open: bool,
    deadline_ms: Option<u64>,
}

impl RevealController {
    pub fn new(delay_ms: u64, tolerance_deg: f64) -> Self {
        Self {
            delay_ms,
            tolerance_deg,
            hq: None,
            revealed: false,
            alert_open: false,
            deadline_ms: None,
        }
    }

    /// Re-arm against a freshly loaded unit set. No HQ, no timer.
    pub fn schedule(&mut self, units: &[Unit], now_ms: u64) {
        self.deadline_ms = None;
        self.revealed = false;
        self.alert_open = false;
        self.hq = find_scenario_hq(units, self.tolerance_deg).map(HqRef::from);

        match &self.hq {
            Some(hq) => {
                let deadline = now_ms.saturating_add(self.delay_ms);
                log::info!("[reveal] HQ {} tracked, reveal at t={}ms", hq.name, deadline);
                self.deadline_ms = Some(deadline);
            }
            None => log::info!("[reveal] no scenario HQ in {} units", units.len()),
        }
    }

    /// Fire the pending reveal once its deadline has passed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                self.revealed = true;
                self.alert_open = true;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        if self.deadline_ms.take().is_some() {
            log::debug!("[reveal] pending reveal cancelled");
        }
    }

    /// Manual "see on map": returns where to focus the camera.
    pub fn reveal(&mut self) -> Option<LatLon> {
        self.alert_open = false;
        let hq = self.hq.as_ref()?;
        self.revealed = true;
        Some(hq.position)
    }

    pub fn dismiss_alert(&mut self) {
        self.alert_open = false;
    }

    /// Re-resolve the HQ identity, leaving timer and visibility alone.
    pub fn refresh(&mut self, units: &[Unit]) {
        self.hq = find_scenario_hq(units, self.tolerance_deg).map(HqRef::from);
    }

    pub fn hides(&self, unit: &Unit) -> bool {
        if self.revealed {
            return false;
        }
        let same_id = self.hq.as_ref().is_some_and(|hq| hq.id == unit.id);
        same_id || normalize_name(&unit.name) == SCENARIO_HQ.name
    }

    pub fn hq(&self) -> Option<&HqRef> {
        self.hq.as_ref()
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn alert_open(&self) -> bool {
        self.alert_open
    }

    pub fn deadline_ms(&self) -> Option<u64> {
        self.deadline_ms
    }
}
