//! Unit model shared by the scenario, flight and chat systems.
//!
//! Symbol codes are a fixed demo lookup shaped like APP-6 SIDCs. They select
//! an icon and nothing more.
use serde::{Deserialize, Serialize};

use crate::coords::LatLon;

/// Affiliation of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Friend,
    #[serde(alias = "HOSTILE")]
    Enemy,
    Neutral,
    Unknown,
}

impl Side {
    /// Affiliation letter used in the symbol code.
    fn sidc_code(self) -> char {
        match self {
            Side::Friend => 'F',
            Side::Enemy => 'H',
            Side::Neutral => 'N',
            Side::Unknown => 'U',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Friend => "FRIEND",
            Side::Enemy => "ENEMY",
            Side::Neutral => "NEUTRAL",
            Side::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "FRIEND" => Some(Side::Friend),
            "ENEMY" | "HOSTILE" => Some(Side::Enemy),
            "NEUTRAL" => Some(Side::Neutral),
            "UNKNOWN" => Some(Side::Unknown),
            _ => None,
        }
    }
}

/// Organizational size tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Echelon {
    #[default]
    Section,
    Battalion,
    Brigade,
}

impl Echelon {
    fn sidc_modifier(self) -> char {
        match self {
            Echelon::Section => 'C',
            Echelon::Battalion => 'F',
            Echelon::Brigade => 'H',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Echelon::Section => "SECTION",
            Echelon::Battalion => "BATTALION",
            Echelon::Brigade => "BRIGADE",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "SECTION" => Some(Echelon::Section),
            "BATTALION" => Some(Echelon::Battalion),
            "BRIGADE" => Some(Echelon::Brigade),
            _ => None,
        }
    }
}

/// Battle dimension of a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimension {
    Ground,
    Air,
}

impl Dimension {
    fn code(self) -> char {
        match self {
            Dimension::Ground => 'G',
            Dimension::Air => 'A',
        }
    }
}

/// Symbol table row: dimension, function id, display label.
#[derive(Clone, Copy, Debug)]
pub struct SymbolSpec {
    pub dimension: Dimension,
    pub function_id: &'static str,
    pub label: &'static str,
}

const fn ground(function_id: &'static str, label: &'static str) -> SymbolSpec {
    SymbolSpec {
        dimension: Dimension::Ground,
        function_id,
        label,
    }
}

const fn air(function_id: &'static str, label: &'static str) -> SymbolSpec {
    SymbolSpec {
        dimension: Dimension::Air,
        function_id,
        label,
    }
}

macro_rules! unit_types {
    ($($variant:ident => $spec:expr),+ $(,)?) => {
        /// Ground unit kinds plus the unmanned aerial subtypes.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum UnitType {
            $($variant),+
        }

        impl UnitType {
            pub const ALL: &'static [UnitType] = &[$(UnitType::$variant),+];

            pub fn symbol(self) -> SymbolSpec {
                match self {
                    $(UnitType::$variant => $spec),+
                }
            }
        }
    };
}

unit_types! {
    Infantry => ground("UCI---", "Infantry"),
    Armor => ground("UCA---", "Armor"),
    Artillery => ground("UCF---", "Artillery"),
    CommandPost => ground("UH1---", "Command post (HQ)"),
    Uas => air("MFQ---", "UAS - Generic"),
    UasAttack => air("MFQA--", "UAS - Attack"),
    UasBomber => air("MFQB--", "UAS - Bomber"),
    UasCargo => air("MFQC--", "UAS - Cargo"),
    UasCommandPost => air("MFQD--", "UAS - Command post"),
    UasFighter => air("MFQF--", "UAS - Fighter"),
    UasCsar => air("MFQH--", "UAS - CSAR"),
    UasJammer => air("MFQJ--", "UAS - Jammer/ECM"),
    UasTanker => air("MFQK--", "UAS - Tanker"),
    UasVtol => air("MFQL--", "UAS - VTOL"),
    UasSof => air("MFQM--", "UAS - SOF"),
    UasMcm => air("MFQI--", "UAS - Mine countermeasures"),
    UasAsuw => air("MFQN--", "UAS - Anti-surface warfare"),
    UasPatrol => air("MFQP--", "UAS - Patrol"),
    UasRecon => air("MFQR--", "UAS - Recon"),
    UasAew => air("MFQRW-", "UAS - Airborne early warning"),
    UasEsm => air("MFQRZ-", "UAS - Electronic surveillance"),
    UasPhotographic => air("MFQRX-", "UAS - Photographic"),
    UasAsw => air("MFQS--", "UAS - Anti-submarine warfare"),
    UasTrainer => air("MFQT--", "UAS - Trainer"),
    UasUtility => air("MFQU--", "UAS - Utility"),
    UasComm => air("MFQY--", "UAS - Communications"),
    UasMedevac => air("MFQO--", "UAS - Medevac"),
}

impl UnitType {
    /// Wire name, e.g. `UAS_RECON`.
    pub fn wire_name(self) -> String {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn parse(token: &str) -> Option<Self> {
        let wanted = token.trim().to_ascii_uppercase();
        Self::ALL.iter().copied().find(|t| t.wire_name() == wanted)
    }
}

/// Demo symbol code: `S{affiliation}{dimension}P{function}-{echelon}`.
pub fn sidc_for(side: Side, unit_type: UnitType, echelon: Echelon) -> String {
    let spec = unit_type.symbol();
    format!(
        "S{}{}P{}-{}",
        side.sidc_code(),
        spec.dimension.code(),
        spec.function_id,
        echelon.sidc_modifier()
    )
}

/// Case and whitespace-insensitive form used for every name comparison.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub id: String,
    pub name: String,
    pub side: Side,
    pub unit_type: UnitType,
    pub echelon: Option<Echelon>,
    pub sidc: Option<String>,
    pub position: LatLon,
}

impl Unit {
    /// Stored symbol code, or the demo mapping when the backend has none.
    pub fn symbol_code(&self) -> String {
        match &self.sidc {
            Some(code) if !code.trim().is_empty() => code.clone(),
            _ => sidc_for(self.side, self.unit_type, self.echelon.unwrap_or_default()),
        }
    }
}

/// Operator-chosen attributes for a unit about to be placed.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitDraft {
    pub name: String,
    pub side: Side,
    pub unit_type: UnitType,
    pub echelon: Echelon,
}

impl UnitDraft {
    pub fn sidc(&self) -> String {
        sidc_for(self.side, self.unit_type, self.echelon)
    }
}

/// In-memory working set of units, in backend order.
#[derive(Default)]
pub struct UnitStore {
    units: Vec<Unit>,
}

impl UnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, units: Vec<Unit>) {
        self.units = units;
    }

    pub fn get(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Unit> {
        let wanted = normalize_name(name);
        self.units.iter().find(|u| normalize_name(&u.name) == wanted)
    }

    /// Returns false when the unit is no longer in the set.
    pub fn set_position(&mut self, id: &str, position: LatLon) -> bool {
        match self.units.iter_mut().find(|u| u.id == id) {
            Some(unit) => {
                unit.position = position;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    pub fn as_slice(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn test_unit(id: &str, name: &str, unit_type: UnitType, lat: f64, lon: f64) -> Unit {
    Unit {
        id: id.to_string(),
        name: name.to_string(),
        side: Side::Friend,
        unit_type,
        echelon: Some(Echelon::Section),
        sidc: None,
        position: LatLon::new(lat, lon),
    }
}
