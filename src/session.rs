//! Session controller: the single owner of all mutable scenario state.
//!
//! Network work is never awaited here. Operations push `Outbound` requests
//! tagged with the current generation; the runtime executes them and feeds
//! the results back through [`Session::complete`]. A full reset bumps the
//! generation so answers to requests issued before it are dropped.

use std::collections::VecDeque;

use crate::api::{LoadPurpose, NewUnit, Request, Response, UnitPatch};
use crate::chat::links::{self, ChatLink};
use crate::chat::types::{ChatAction, ChatRole, DraftField, MissionOrderDraft, ReconOrderPayload};
use crate::chat::ChatLog;
use crate::coords::LatLon;
use crate::flight::FlightSim;
use crate::scenario::RevealController;
use crate::settings::Settings;
use crate::units::{normalize_name, sidc_for, Side, Unit, UnitDraft, UnitStore, UnitType};
use crate::watchdog::{BootVerdict, BootWatch};

pub const SELECT_RECON_FIRST: &str =
    "Select a UAS - Recon drone on the map before drafting an order.";

/// A request waiting to be executed by the runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct Outbound {
    pub generation: u64,
    pub request: Request,
}

/// The answer to an `Outbound`, carrying the generation it was issued under.
#[derive(Debug)]
pub struct Completion {
    pub generation: u64,
    pub response: Response,
}

/// Things the presentation layer should react to.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    UnitsLoaded { count: usize },
    HqDetected { name: String },
    FocusRequested { key: u64, position: LatLon },
    DraftOpened { drone: String },
    OrderSent { drone: String },
    DroneDataReady { drone: String },
    ChatReplied { text: String },
    ChatReset { token: u64 },
    BackendRestarted,
    ScenarioRestored { restored_units: u32 },
    OpenMedia { title: String, url: String },
    OpenExternal { url: String },
    Error(String),
}

/// Line drawn from a tasked drone to its objective.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderTrail {
    pub drone_id: String,
    pub from: LatLon,
    pub to: LatLon,
}

pub struct Session {
    settings: Settings,
    units: UnitStore,
    reveal: RevealController,
    watchdog: BootWatch,
    flight: Option<FlightSim>,
    trail: Option<OrderTrail>,
    chat: ChatLog,
    chat_reset_token: u64,
    selected: Option<String>,
    placement: Option<UnitDraft>,
    draft: Option<MissionOrderDraft>,
    banner: Option<String>,
    /// Drone named in the "order sent" acknowledgment.
    order_notice: Option<String>,
    /// Drone whose in-orbit data is waiting for review.
    drone_data: Option<String>,
    focus_seq: u64,
    restarting: bool,
    generation: u64,
    /// Sequence of the newest unit load issued.
    load_seq: u64,
    /// Purposes of the loads the next applied reply stands in for.
    pending_load: Option<LoadPurpose>,
    events: VecDeque<SessionEvent>,
    outbox: Vec<Outbound>,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        let reveal = RevealController::new(settings.reveal_delay_ms, settings.hq_match_tolerance_deg);
        Self {
            settings,
            units: UnitStore::new(),
            reveal,
            watchdog: BootWatch::new(),
            flight: None,
            trail: None,
            chat: ChatLog::new(),
            chat_reset_token: 0,
            selected: None,
            placement: None,
            draft: None,
            banner: None,
            order_notice: None,
            drone_data: None,
            focus_seq: 0,
            restarting: false,
            generation: 0,
            load_seq: 0,
            pending_load: None,
            events: VecDeque::new(),
            outbox: Vec::new(),
        }
    }

    // --- Plumbing ---

    fn send(&mut self, request: Request) {
        self.outbox.push(Outbound {
            generation: self.generation,
            request,
        });
    }

    fn emit(&mut self, event: SessionEvent) {
        self.events.push_back(event);
    }

    fn set_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("[session] {message}");
        self.banner = Some(message.clone());
        self.emit(SessionEvent::Error(message));
    }

    pub fn take_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    fn load_units(&mut self, purpose: LoadPurpose) {
        self.load_seq += 1;
        self.pending_load = Some(self.pending_load.map_or(purpose, |p| p.merge(purpose)));
        let seq = self.load_seq;
        self.send(Request::LoadUnits { purpose, seq });
    }

    fn stop_flight(&mut self) {
        if let Some(flight) = self.flight.take() {
            log::info!("[flight] {} stopped", flight.unit_name);
        }
    }

    // --- Timers ---

    pub fn bootstrap(&mut self) {
        self.load_units(LoadPurpose::Rearm);
    }

    pub fn health_tick(&mut self) {
        if self.watchdog.begin_probe() {
            self.send(Request::Health);
        }
    }

    pub fn poll_reveal(&mut self, now_ms: u64) {
        if self.reveal.poll(now_ms) {
            let name = self
                .reveal
                .hq()
                .map(|hq| hq.name.clone())
                .unwrap_or_default();
            log::info!("[reveal] {name} detected");
            self.emit(SessionEvent::HqDetected { name });
        }
    }

    pub fn reveal_deadline(&self) -> Option<u64> {
        self.reveal.deadline_ms()
    }

    pub fn tick_flight(&mut self, now_ms: u64) {
        let Some(flight) = self.flight.as_mut() else {
            return;
        };
        if self.units.get(&flight.unit_id).is_none() {
            log::info!("[flight] {} left the map", flight.unit_name);
            self.stop_flight();
            return;
        }

        let tick = flight.tick(now_ms);
        let unit_id = flight.unit_id.clone();
        let unit_name = flight.unit_name.clone();

        if let Some(position) = tick.position {
            self.units.set_position(&unit_id, position);
            if let Some(trail) = self.trail.as_mut().filter(|t| t.drone_id == unit_id) {
                trail.from = position;
            }
        }
        if tick.data_ready {
            self.drone_data = Some(unit_name.clone());
            self.emit(SessionEvent::DroneDataReady { drone: unit_name });
        }
    }

    // --- Completions ---

    pub fn complete(&mut self, completion: Completion, now_ms: u64) {
        if completion.generation != self.generation {
            match completion.response {
                Response::Health(_) => self.watchdog.probe_failed(),
                Response::ScenarioReset(_) => self.restarting = false,
                _ => {}
            }
            log::debug!(
                "[session] dropped response from generation {} (now {})",
                completion.generation,
                self.generation
            );
            return;
        }

        match completion.response {
            Response::Units {
                purpose,
                seq,
                result,
            } => {
                // an older snapshot must not overwrite a newer one
                if seq != self.load_seq {
                    log::debug!("[session] dropped unit load #{seq}, #{} outstanding", self.load_seq);
                    return;
                }
                let purpose = self.pending_load.take().unwrap_or(purpose);
                match result {
                    Ok(units) => self.units_loaded(purpose, units, now_ms),
                    Err(err) => {
                        self.set_error(err.to_string());
                        if purpose == LoadPurpose::Rearm {
                            self.reveal.schedule(&[], now_ms);
                        }
                    }
                }
            }
            Response::Created(result) => match result {
                Ok(_) => {
                    self.placement = None;
                    self.load_units(LoadPurpose::Refresh);
                }
                Err(err) => self.set_error(err.to_string()),
            },
            Response::Patched { id, result } => match result {
                Ok(_) => {
                    if self.selected.as_deref() == Some(id.as_str()) {
                        self.selected = None;
                    }
                    self.load_units(LoadPurpose::AfterConfirm);
                }
                Err(err) => self.set_error(err.to_string()),
            },
            Response::Deleted { id, result } => match result {
                Ok(_) => self.unit_deleted(&id),
                Err(err) => self.set_error(err.to_string()),
            },
            Response::Health(result) => match result {
                Ok(health) => {
                    if self.watchdog.observe(&health.boot_id) == BootVerdict::Restarted {
                        self.emit(SessionEvent::BackendRestarted);
                        self.full_reset();
                    }
                }
                Err(err) => {
                    log::debug!("[watchdog] probe failed: {err}");
                    self.watchdog.probe_failed();
                }
            },
            Response::ScenarioReset(result) => {
                self.restarting = false;
                match result {
                    Ok(restored) => {
                        log::info!(
                            "[session] scenario restored, {} units (backup {})",
                            restored.restored_units,
                            restored.backup_path.as_deref().unwrap_or("-")
                        );
                        self.emit(SessionEvent::ScenarioRestored {
                            restored_units: restored.restored_units,
                        });
                        self.full_reset();
                    }
                    Err(err) => self.set_error(err.to_string()),
                }
            }
            Response::Chat(result) => match result {
                Ok(reply) => {
                    let actions = reply.actions();
                    self.chat.finish_turn(reply.reply);
                    let text = self
                        .chat
                        .last_from(ChatRole::Assistant)
                        .map(|m| m.content.clone())
                        .unwrap_or_default();
                    self.emit(SessionEvent::ChatReplied { text });
                    for action in actions {
                        self.dispatch(action);
                    }
                }
                Err(err) => self.chat.fail_turn(&err.to_string()),
            },
        }
    }

    fn units_loaded(&mut self, purpose: LoadPurpose, units: Vec<Unit>, now_ms: u64) {
        log::info!("[session] {} units loaded ({purpose:?})", units.len());
        self.units.replace(units);
        self.banner = None;
        if let Some(id) = &self.selected {
            if self.units.get(id).is_none() {
                self.selected = None;
            }
        }
        match purpose {
            LoadPurpose::Rearm => self.reveal.schedule(self.units.as_slice(), now_ms),
            LoadPurpose::AfterConfirm => self.reveal.refresh(self.units.as_slice()),
            LoadPurpose::Refresh => {}
        }
        self.emit(SessionEvent::UnitsLoaded {
            count: self.units.len(),
        });
    }

    fn unit_deleted(&mut self, id: &str) {
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        if self.flight.as_ref().is_some_and(|f| f.unit_id == id) {
            self.stop_flight();
        }
        if self.trail.as_ref().is_some_and(|t| t.drone_id == id) {
            self.trail = None;
        }
        self.load_units(LoadPurpose::Refresh);
    }

    fn full_reset(&mut self) {
        self.generation += 1;
        log::info!("[session] full reset, generation {}", self.generation);
        self.stop_flight();
        self.reveal.cancel();
        self.placement = None;
        self.draft = None;
        self.trail = None;
        self.order_notice = None;
        self.drone_data = None;
        self.selected = None;
        self.chat.reset();
        self.chat_reset_token += 1;
        self.emit(SessionEvent::ChatReset {
            token: self.chat_reset_token,
        });
        self.pending_load = None;
        self.load_units(LoadPurpose::Rearm);
    }

    // --- Chat ---

    pub fn submit_chat(&mut self, text: &str) -> bool {
        match self.chat.begin_turn(text) {
            Some(messages) => {
                self.send(Request::Chat { messages });
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, action: ChatAction) {
        match action {
            ChatAction::ConfirmHqEnemy { name } => self.confirm_hq_enemy(&name),
            ChatAction::DraftReconOrder(payload) => self.draft_recon_order(payload),
            ChatAction::Unknown { kind } => log::debug!("[chat] ignoring action {kind}"),
        }
    }

    fn confirm_hq_enemy(&mut self, name: &str) {
        let Some(unit) = self.units.find_by_name(name) else {
            self.set_error(format!("Unit {} not found on the map.", normalize_name(name)));
            return;
        };
        let sidc = sidc_for(Side::Enemy, unit.unit_type, unit.echelon.unwrap_or_default());
        log::info!("[chat] confirming {} as ENEMY ({sidc})", unit.name);
        let id = unit.id.clone();
        self.send(Request::PatchUnit {
            id,
            patch: UnitPatch {
                side: Some(Side::Enemy),
                sidc: Some(sidc),
            },
        });
    }

    fn draft_recon_order(&mut self, payload: ReconOrderPayload) {
        let drone = self
            .selected_unit()
            .filter(|u| u.unit_type == UnitType::UasRecon)
            .map(|u| (u.id.clone(), u.name.clone()));
        let Some((id, name)) = drone else {
            self.set_error(SELECT_RECON_FIRST);
            return;
        };
        self.draft = Some(MissionOrderDraft::from_payload(payload, &id, &name));
        self.emit(SessionEvent::DraftOpened { drone: name });
    }

    // --- Mission order ---

    pub fn edit_draft(&mut self, field: DraftField, text: String) -> bool {
        match self.draft.as_mut() {
            Some(draft) => {
                draft.set(field, text);
                true
            }
            None => false,
        }
    }

    pub fn close_draft(&mut self) {
        self.draft = None;
    }

    pub fn send_mission_order(&mut self) -> bool {
        let Some(draft) = self.draft.as_ref() else {
            self.set_error("No mission order to send.");
            return false;
        };
        let drone = match self.units.get(&draft.drone_id) {
            Some(unit) if unit.unit_type == UnitType::UasRecon => unit.clone(),
            _ => {
                let name = draft.drone_name.clone();
                self.set_error(format!("Drone {name} is no longer on the map."));
                return false;
            }
        };
        if self.reveal.hq().is_none() {
            self.reveal.refresh(self.units.as_slice());
        }
        let Some(target) = self.reveal.hq().map(|hq| hq.position) else {
            self.set_error("Scenario HQ not found on the map.");
            return false;
        };

        self.stop_flight();
        self.trail = Some(OrderTrail {
            drone_id: drone.id.clone(),
            from: drone.position,
            to: target,
        });
        self.draft = None;
        self.selected = None;
        self.order_notice = Some(drone.name.clone());
        self.drone_data = None;
        self.flight = Some(FlightSim::new(
            drone.id,
            drone.name.clone(),
            drone.position,
            target,
            self.settings.flight.clone(),
        ));
        self.emit(SessionEvent::OrderSent { drone: drone.name });
        true
    }

    // --- Selection and alerts ---

    pub fn select_unit(&mut self, id: &str) -> bool {
        if self.trail.as_ref().is_some_and(|t| t.drone_id == id) {
            return false;
        }
        match self.units.get(id) {
            Some(unit) if !self.reveal.hides(unit) => {
                self.selected = Some(id.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    fn focus(&mut self, position: LatLon) {
        self.focus_seq += 1;
        self.emit(SessionEvent::FocusRequested {
            key: self.focus_seq,
            position,
        });
    }

    pub fn see_on_map(&mut self) {
        if let Some(position) = self.reveal.reveal() {
            self.selected = self.reveal.hq().map(|hq| hq.id.clone());
            self.focus(position);
        }
    }

    pub fn dismiss_hq_alert(&mut self) {
        self.reveal.dismiss_alert();
    }

    pub fn dismiss_order_notice(&mut self) {
        self.order_notice = None;
    }

    pub fn dismiss_drone_data(&mut self) {
        self.drone_data = None;
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    pub fn watch_drone_data(&mut self) -> bool {
        match self.drone_data.take() {
            Some(drone) => self.submit_chat(&format!("Review new data from {drone}")),
            None => false,
        }
    }

    // --- Unit editing ---

    pub fn begin_placement(&mut self, draft: UnitDraft) {
        self.placement = Some(draft);
    }

    pub fn cancel_placement(&mut self) {
        self.placement = None;
    }

    pub fn place_at(&mut self, position: LatLon) -> bool {
        let Some(draft) = self.placement.as_ref() else {
            return false;
        };
        let unit = NewUnit {
            name: draft.name.trim().to_string(),
            side: draft.side,
            unit_type: draft.unit_type,
            echelon: draft.echelon,
            sidc: draft.sidc(),
            lat: position.lat,
            lon: position.lon,
        };
        self.send(Request::CreateUnit(unit));
        true
    }

    pub fn delete_unit(&mut self, id: &str) {
        self.send(Request::DeleteUnit { id: id.to_string() });
    }

    pub fn restart_scenario(&mut self) -> bool {
        if self.restarting {
            return false;
        }
        self.restarting = true;
        self.send(Request::ResetScenario);
        true
    }

    // --- Links ---

    pub fn open_link(&mut self, url: &str, label: Option<&str>) {
        match links::classify(url, &self.settings.api_base, label) {
            ChatLink::ReconDrone(name) => {
                let drone = self
                    .units
                    .find_by_name(&name)
                    .filter(|u| u.unit_type == UnitType::UasRecon)
                    .map(|u| (u.id.clone(), u.position));
                match drone {
                    Some((id, position)) => {
                        self.selected = Some(id);
                        self.focus(position);
                    }
                    None => self.set_error(format!("Drone {name} not found on the map.")),
                }
            }
            ChatLink::Media { title, url } => self.emit(SessionEvent::OpenMedia { title, url }),
            ChatLink::External(url) => self.emit(SessionEvent::OpenExternal { url }),
        }
    }

    // --- Accessors ---

    pub fn visible_units(&self) -> Vec<&Unit> {
        self.units.iter().filter(|u| !self.reveal.hides(u)).collect()
    }

    pub fn units(&self) -> &UnitStore {
        &self.units
    }

    pub fn selected_unit(&self) -> Option<&Unit> {
        self.selected.as_deref().and_then(|id| self.units.get(id))
    }

    pub fn flight(&self) -> Option<&FlightSim> {
        self.flight.as_ref()
    }

    pub fn trail(&self) -> Option<&OrderTrail> {
        self.trail.as_ref()
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn chat_reset_token(&self) -> u64 {
        self.chat_reset_token
    }

    pub fn draft(&self) -> Option<&MissionOrderDraft> {
        self.draft.as_ref()
    }

    pub fn placement(&self) -> Option<&UnitDraft> {
        self.placement.as_ref()
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn order_notice(&self) -> Option<&str> {
        self.order_notice.as_deref()
    }

    pub fn drone_data(&self) -> Option<&str> {
        self.drone_data.as_deref()
    }

    pub fn hq_alert_open(&self) -> bool {
        self.reveal.alert_open()
    }

    pub fn hq_revealed(&self) -> bool {
        self.reveal.is_revealed()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
