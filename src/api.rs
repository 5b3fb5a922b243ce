//! REST client for the C2 backend.
//!
//! `Request`/`Response` are the vocabulary the session speaks. `HttpBackend`
//! turns one into the other over HTTP; nothing else in the crate touches the
//! network.

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::chat::types::{ChatAction, ChatMessage, WireAction};
use crate::coords::LatLon;
use crate::units::{Echelon, Side, Unit, UnitType};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{method} {path} failed: HTTP {status}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
    },
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
pub struct Feature {
    pub properties: FeatureProps,
    pub geometry: Geometry,
}

#[derive(Debug, Deserialize)]
pub struct FeatureProps {
    pub id: String,
    pub name: String,
    pub side: String,
    pub unit_type: String,
    #[serde(default)]
    pub echelon: Option<String>,
    #[serde(default)]
    pub sidc: Option<String>,
}

/// GeoJSON point; coordinates are `[lon, lat]`.
#[derive(Debug, Deserialize)]
pub struct Geometry {
    pub coordinates: Vec<f64>,
}

impl Feature {
    /// None when the feature names a unit type this client has no symbol for,
    /// or carries no usable point.
    pub fn into_unit(self) -> Option<Unit> {
        let props = self.properties;
        let unit_type = UnitType::parse(&props.unit_type)?;
        let (lon, lat) = match self.geometry.coordinates.as_slice() {
            [lon, lat, ..] => (*lon, *lat),
            _ => return None,
        };
        Some(Unit {
            id: props.id,
            name: props.name,
            side: Side::parse(&props.side).unwrap_or(Side::Unknown),
            unit_type,
            echelon: props.echelon.as_deref().and_then(Echelon::parse),
            sidc: props.sidc,
            position: LatLon::new(lat, lon),
        })
    }
}

impl FeatureCollection {
    pub fn into_units(self) -> Vec<Unit> {
        self.features
            .into_iter()
            .filter_map(|f| {
                let label = format!("{} ({})", f.properties.name, f.properties.unit_type);
                let unit = f.into_unit();
                if unit.is_none() {
                    log::warn!("[api] skipping unrecognized unit {label}");
                }
                unit
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewUnit {
    pub name: String,
    pub side: Side,
    pub unit_type: UnitType,
    pub echelon: Echelon,
    pub sidc: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UnitPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidc: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Deleted {
    pub ok: bool,
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Health {
    pub status: String,
    pub boot_id: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScenarioRestored {
    pub ok: bool,
    #[serde(default)]
    pub restored_units: u32,
    #[serde(default)]
    pub backup_path: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub actions: Option<Vec<Value>>,
}

impl ChatReply {
    /// Decoded actions in backend order. Entries without a `type` are dropped.
    pub fn actions(&self) -> Vec<ChatAction> {
        self.actions
            .iter()
            .flatten()
            .filter_map(|raw| match serde_json::from_value::<WireAction>(raw.clone()) {
                Ok(wire) => Some(ChatAction::from(&wire)),
                Err(err) => {
                    log::warn!("[api] malformed chat action {raw}: {err}");
                    None
                }
            })
            .collect()
    }
}

// --- Request / Response ---

/// Why a unit reload was issued; decides how the reveal reacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadPurpose {
    /// Initial load or after a reset: re-arm the reveal timer.
    Rearm,
    /// Routine refresh after a create/delete.
    Refresh,
    /// After a side change: re-resolve the HQ, keep the timer.
    AfterConfirm,
}

impl LoadPurpose {
    /// Purpose owed by a reload that supersedes both `self` and `other`.
    pub fn merge(self, other: LoadPurpose) -> LoadPurpose {
        use LoadPurpose::*;
        match (self, other) {
            (Rearm, _) | (_, Rearm) => Rearm,
            (AfterConfirm, _) | (_, AfterConfirm) => AfterConfirm,
            _ => Refresh,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    /// `seq` increases with every load issued; only the newest reply is applied.
    LoadUnits { purpose: LoadPurpose, seq: u64 },
    CreateUnit(NewUnit),
    PatchUnit { id: String, patch: UnitPatch },
    DeleteUnit { id: String },
    Health,
    ResetScenario,
    Chat { messages: Vec<ChatMessage> },
}

#[derive(Debug)]
pub enum Response {
    Units {
        purpose: LoadPurpose,
        seq: u64,
        result: Result<Vec<Unit>, ApiError>,
    },
    Created(Result<Option<Unit>, ApiError>),
    Patched {
        id: String,
        result: Result<Option<Unit>, ApiError>,
    },
    Deleted {
        id: String,
        result: Result<Deleted, ApiError>,
    },
    Health(Result<Health, ApiError>),
    ScenarioReset(Result<ScenarioRestored, ApiError>),
    Chat(Result<ChatReply, ApiError>),
}

// --- HTTP ---

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base: String,
}

impl HttpBackend {
    pub fn new(base: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("c2map/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base, path))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        method: &'static str,
        path: &str,
    ) -> Result<T, ApiError> {
        log::debug!("[api] {method} {path}");
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            log::warn!("[api] {method} {path} -> {status}");
            return Err(ApiError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    fn unit_path(id: &str) -> String {
        format!("/units/{}", urlencoding::encode(id))
    }

    pub async fn list_units(&self) -> Result<Vec<Unit>, ApiError> {
        let path = "/units";
        let fc: FeatureCollection = self
            .fetch(self.request(Method::GET, path), "GET", path)
            .await?;
        Ok(fc.into_units())
    }

    pub async fn create_unit(&self, unit: &NewUnit) -> Result<Option<Unit>, ApiError> {
        let path = "/units";
        let feature: Feature = self
            .fetch(self.request(Method::POST, path).json(unit), "POST", path)
            .await?;
        Ok(feature.into_unit())
    }

    pub async fn patch_unit(&self, id: &str, patch: &UnitPatch) -> Result<Option<Unit>, ApiError> {
        let path = Self::unit_path(id);
        let feature: Feature = self
            .fetch(self.request(Method::PATCH, &path).json(patch), "PATCH", &path)
            .await?;
        Ok(feature.into_unit())
    }

    pub async fn delete_unit(&self, id: &str) -> Result<Deleted, ApiError> {
        let path = Self::unit_path(id);
        self.fetch(self.request(Method::DELETE, &path), "DELETE", &path)
            .await
    }

    pub async fn health(&self) -> Result<Health, ApiError> {
        let path = "/health";
        self.fetch(self.request(Method::GET, path), "GET", path).await
    }

    pub async fn reset_scenario(&self) -> Result<ScenarioRestored, ApiError> {
        let path = "/scenario/reset";
        self.fetch(self.request(Method::POST, path), "POST", path)
            .await
    }

    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatReply, ApiError> {
        let path = "/chat";
        let body = ChatRequest { messages };
        self.fetch(self.request(Method::POST, path).json(&body), "POST", path)
            .await
    }

    pub async fn execute(&self, request: Request) -> Response {
        match request {
            Request::LoadUnits { purpose, seq } => Response::Units {
                purpose,
                seq,
                result: self.list_units().await,
            },
            Request::CreateUnit(unit) => Response::Created(self.create_unit(&unit).await),
            Request::PatchUnit { id, patch } => {
                let result = self.patch_unit(&id, &patch).await;
                Response::Patched { id, result }
            }
            Request::DeleteUnit { id } => {
                let result = self.delete_unit(&id).await;
                Response::Deleted { id, result }
            }
            Request::Health => Response::Health(self.health().await),
            Request::ResetScenario => Response::ScenarioReset(self.reset_scenario().await),
            Request::Chat { messages } => Response::Chat(self.chat(&messages).await),
        }
    }
}
