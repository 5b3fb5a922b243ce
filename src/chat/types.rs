//! Shared types for the C2 chat panel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scenario::SCENARIO_HQ;

pub const DEFAULT_ORDER_TITLE: &str = "RECON DRONE MISSION ORDER";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn label(self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "Assistant",
            ChatRole::System => "System",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Action object as the backend sends it: `{type, payload}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

/// Free-text sections of a recon order as proposed by the backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReconOrderPayload {
    pub title: Option<String>,
    pub situation: Option<String>,
    pub mission: Option<String>,
    pub execution: Option<String>,
    pub soutien: Option<String>,
    pub commandement_transmissions: Option<String>,
}

/// Backend-declared action, decoded into the closed set this client acts on.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatAction {
    ConfirmHqEnemy { name: String },
    DraftReconOrder(ReconOrderPayload),
    Unknown { kind: String },
}

/// String field of an object payload; anything else counts as absent.
fn payload_string(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

impl From<&WireAction> for ChatAction {
    fn from(wire: &WireAction) -> Self {
        let p = &wire.payload;
        match wire.kind.as_str() {
            "confirm_hq_enemy" => ChatAction::ConfirmHqEnemy {
                name: payload_string(p, "name").unwrap_or_else(|| SCENARIO_HQ.name.to_string()),
            },
            "draft_recon_order" => ChatAction::DraftReconOrder(ReconOrderPayload {
                title: payload_string(p, "title"),
                situation: payload_string(p, "situation"),
                mission: payload_string(p, "mission"),
                execution: payload_string(p, "execution"),
                soutien: payload_string(p, "soutien"),
                commandement_transmissions: payload_string(p, "commandement_transmissions"),
            }),
            other => ChatAction::Unknown {
                kind: other.to_string(),
            },
        }
    }
}

/// Editable mission order bound to one recon drone.
#[derive(Clone, Debug, PartialEq)]
pub struct MissionOrderDraft {
    pub title: String,
    pub situation: String,
    pub mission: String,
    pub execution: String,
    pub soutien: String,
    pub commandement_transmissions: String,
    pub drone_id: String,
    pub drone_name: String,
}

impl MissionOrderDraft {
    pub fn from_payload(payload: ReconOrderPayload, drone_id: &str, drone_name: &str) -> Self {
        Self {
            title: payload.title.unwrap_or_else(|| DEFAULT_ORDER_TITLE.to_string()),
            situation: payload.situation.unwrap_or_default(),
            mission: payload.mission.unwrap_or_default(),
            execution: payload.execution.unwrap_or_default(),
            soutien: payload.soutien.unwrap_or_default(),
            commandement_transmissions: payload.commandement_transmissions.unwrap_or_default(),
            drone_id: drone_id.to_string(),
            drone_name: drone_name.to_string(),
        }
    }

    pub fn set(&mut self, field: DraftField, text: String) {
        match field {
            DraftField::Title => self.title = text,
            DraftField::Situation => self.situation = text,
            DraftField::Mission => self.mission = text,
            DraftField::Execution => self.execution = text,
            DraftField::Soutien => self.soutien = text,
            DraftField::CommandementTransmissions => self.commandement_transmissions = text,
        }
    }

    /// Numbered sections in order-of-battle layout.
    pub fn sections(&self) -> [(&'static str, &str); 5] {
        [
            ("1. SITUATION", &self.situation),
            ("2. MISSION", &self.mission),
            ("3. EXECUTION", &self.execution),
            ("4. SOUTIEN", &self.soutien),
            ("5. COMMANDEMENT & TRANSMISSIONS", &self.commandement_transmissions),
        ]
    }

    /// Plain-text order: title line, then each section with its body indented.
    pub fn render(&self) -> String {
        let mut out = format!("{}  [{}]", self.title, self.drone_name);
        for (heading, body) in self.sections() {
            let body = if body.trim().is_empty() { "-" } else { body };
            out.push_str(&format!("\n{heading}\n  {body}"));
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftField {
    Title,
    Situation,
    Mission,
    Execution,
    Soutien,
    CommandementTransmissions,
}

impl DraftField {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "title" => Some(DraftField::Title),
            "situation" => Some(DraftField::Situation),
            "mission" => Some(DraftField::Mission),
            "execution" => Some(DraftField::Execution),
            "soutien" | "support" => Some(DraftField::Soutien),
            "commandement" | "transmissions" | "commandement_transmissions" => {
                Some(DraftField::CommandementTransmissions)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(kind: &str, payload: Value) -> WireAction {
        WireAction {
            kind: kind.to_string(),
            payload,
        }
    }

    #[test]
    fn confirm_action_reads_name() {
        let action = ChatAction::from(&wire("confirm_hq_enemy", json!({"name": "rus-hq-comint"})));
        assert_eq!(
            action,
            ChatAction::ConfirmHqEnemy {
                name: "rus-hq-comint".into()
            }
        );
    }

    #[test]
    fn confirm_action_defaults_to_scenario_hq() {
        let action = ChatAction::from(&wire("confirm_hq_enemy", json!({"name": 42})));
        assert_eq!(
            action,
            ChatAction::ConfirmHqEnemy {
                name: SCENARIO_HQ.name.into()
            }
        );
    }

    #[test]
    fn draft_action_ignores_non_string_fields() {
        let action = ChatAction::from(&wire(
            "draft_recon_order",
            json!({"mission": "Observe HQ", "execution": ["not", "text"]}),
        ));
        let ChatAction::DraftReconOrder(payload) = action else {
            panic!("expected draft action");
        };
        assert_eq!(payload.mission.as_deref(), Some("Observe HQ"));
        assert_eq!(payload.execution, None);
    }

    #[test]
    fn unknown_kind_is_kept_for_logging() {
        let action = ChatAction::from(&wire("place_unit", Value::Null));
        assert_eq!(
            action,
            ChatAction::Unknown {
                kind: "place_unit".into()
            }
        );
    }

    #[test]
    fn wire_action_payload_is_optional() {
        let parsed: WireAction = serde_json::from_str(r#"{"type": "suggest_uav"}"#).unwrap();
        assert_eq!(parsed.payload, Value::Null);
    }

    #[test]
    fn draft_defaults_missing_sections() {
        let payload = ReconOrderPayload {
            situation: Some("Enemy CP suspected".into()),
            ..Default::default()
        };
        let draft = MissionOrderDraft::from_payload(payload, "d1", "UAV-REC-001");
        assert_eq!(draft.title, DEFAULT_ORDER_TITLE);
        assert_eq!(draft.situation, "Enemy CP suspected");
        assert_eq!(draft.mission, "");
        assert_eq!(draft.commandement_transmissions, "");
        assert_eq!(draft.drone_name, "UAV-REC-001");
    }

    #[test]
    fn rendered_draft_lists_every_section() {
        let payload = ReconOrderPayload {
            mission: Some("Observe RUS-HQ-COMINT".into()),
            ..Default::default()
        };
        let mut draft = MissionOrderDraft::from_payload(payload, "d1", "UAV-REC-001");
        draft.set(DraftField::Execution, "Orbit 800m".into());
        let text = draft.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "RECON DRONE MISSION ORDER  [UAV-REC-001]");
        assert_eq!(lines.len(), 11);
        assert!(text.contains("2. MISSION\n  Observe RUS-HQ-COMINT"));
        assert!(text.contains("3. EXECUTION\n  Orbit 800m"));
        assert!(text.contains("1. SITUATION\n  -"));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let msg = ChatMessage::assistant("ok");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"role": "assistant", "content": "ok"})
        );
    }
}
