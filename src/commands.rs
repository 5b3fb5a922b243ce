use std::num::ParseFloatError;

use thiserror::Error;

use crate::chat::types::DraftField;
use crate::coords::LatLon;
use crate::session::Session;
use crate::units::{normalize_name, Echelon, Side, UnitDraft, UnitType};

pub const HELP: &str = "\
/units                              list units on the map
/select <name>                      select a unit
/deselect                           clear the selection
/see                                reveal and focus the detected HQ
/dismiss [hq|order|data|error]      close alerts (all by default)
/watch                              review drone data with the assistant
/draft                              show the mission order draft
/edit <field> <text>                edit the mission order draft
/send                               send the mission order
/close                              discard the mission order draft
/delete <name>                      delete a unit
/place <side> <type> <echelon> <lat> <lon> <name...>
/cancel                             cancel a pending placement
/reset                              restore the scenario
/link <url>                         open a link from the chat
/help                               this text
/quit                               exit
anything else is sent to the assistant";

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid coordinate '{value}' for {context}: {source}")]
    InvalidCoordinate {
        value: String,
        context: &'static str,
        source: ParseFloatError,
    },
    #[error("coordinate out of range: {0}")]
    OutOfRange(String),
    #[error("invalid side '{0}'")]
    InvalidSide(String),
    #[error("invalid unit type '{0}'")]
    InvalidUnitType(String),
    #[error("invalid echelon '{0}'")]
    InvalidEchelon(String),
    #[error("invalid draft field '{0}'")]
    InvalidField(String),
    #[error("invalid alert '{0}'")]
    InvalidAlert(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alert {
    Hq,
    Order,
    DroneData,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Chat(String),
    Units,
    Select(String),
    Deselect,
    See,
    Dismiss(Option<Alert>),
    Watch,
    Draft,
    Edit { field: DraftField, text: String },
    Send,
    Close,
    Delete(String),
    Place { draft: UnitDraft, position: LatLon },
    Cancel,
    Reset,
    Link(String),
    Help,
    Quit,
}

/// Text after the verb, with surrounding whitespace removed.
fn rest_after<'a>(line: &'a str, verb: &str) -> &'a str {
    line[verb.len()..].trim()
}

fn required<'a>(value: &'a str, name: &'static str) -> Result<&'a str, CommandParseError> {
    if value.is_empty() {
        Err(CommandParseError::MissingArgument(name))
    } else {
        Ok(value)
    }
}

pub fn parse_command_line(input: &str) -> Result<Command, CommandParseError> {
    let line = input.trim();
    if line.is_empty() {
        return Err(CommandParseError::Empty);
    }
    if !line.starts_with('/') {
        return Ok(Command::Chat(line.to_string()));
    }

    let verb = line.split_whitespace().next().unwrap_or(line);
    let rest = rest_after(line, verb);

    match verb.to_ascii_lowercase().as_str() {
        "/units" => Ok(Command::Units),
        "/select" => Ok(Command::Select(required(rest, "name")?.to_string())),
        "/deselect" => Ok(Command::Deselect),
        "/see" => Ok(Command::See),
        "/dismiss" => {
            let alert = match rest.to_ascii_lowercase().as_str() {
                "" | "all" => None,
                "hq" => Some(Alert::Hq),
                "order" => Some(Alert::Order),
                "data" => Some(Alert::DroneData),
                "error" => Some(Alert::Error),
                other => return Err(CommandParseError::InvalidAlert(other.to_string())),
            };
            Ok(Command::Dismiss(alert))
        }
        "/watch" => Ok(Command::Watch),
        "/draft" => Ok(Command::Draft),
        "/edit" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let field_str = parts
                .next()
                .filter(|s| !s.is_empty())
                .ok_or(CommandParseError::MissingArgument("field"))?;
            let field = DraftField::parse(field_str)
                .ok_or_else(|| CommandParseError::InvalidField(field_str.to_string()))?;
            let text = parts.next().unwrap_or("").trim().to_string();
            Ok(Command::Edit { field, text })
        }
        "/send" => Ok(Command::Send),
        "/close" => Ok(Command::Close),
        "/delete" => Ok(Command::Delete(required(rest, "name")?.to_string())),
        "/place" => parse_place(rest),
        "/cancel" => Ok(Command::Cancel),
        "/reset" => Ok(Command::Reset),
        "/link" => Ok(Command::Link(required(rest, "url")?.to_string())),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_place(rest: &str) -> Result<Command, CommandParseError> {
    let mut parts = rest.split_whitespace();
    let side_str = parts
        .next()
        .ok_or(CommandParseError::MissingArgument("side"))?;
    let type_str = parts
        .next()
        .ok_or(CommandParseError::MissingArgument("type"))?;
    let echelon_str = parts
        .next()
        .ok_or(CommandParseError::MissingArgument("echelon"))?;
    let lat_str = parts
        .next()
        .ok_or(CommandParseError::MissingArgument("lat"))?;
    let lon_str = parts
        .next()
        .ok_or(CommandParseError::MissingArgument("lon"))?;
    let name = parts.collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return Err(CommandParseError::MissingArgument("name"));
    }

    let side = Side::parse(side_str)
        .ok_or_else(|| CommandParseError::InvalidSide(side_str.to_string()))?;
    let unit_type = UnitType::parse(type_str)
        .ok_or_else(|| CommandParseError::InvalidUnitType(type_str.to_string()))?;
    let echelon = Echelon::parse(echelon_str)
        .ok_or_else(|| CommandParseError::InvalidEchelon(echelon_str.to_string()))?;
    let lat = parse_degrees(lat_str, "latitude", 90.0)?;
    let lon = parse_degrees(lon_str, "longitude", 180.0)?;

    Ok(Command::Place {
        draft: UnitDraft {
            name,
            side,
            unit_type,
            echelon,
        },
        position: LatLon::new(lat, lon),
    })
}

fn parse_degrees(value: &str, context: &'static str, limit: f64) -> Result<f64, CommandParseError> {
    let degrees = value
        .parse::<f64>()
        .map_err(|source| CommandParseError::InvalidCoordinate {
            value: value.to_string(),
            context,
            source,
        })?;
    if !degrees.is_finite() || degrees.abs() > limit {
        return Err(CommandParseError::OutOfRange(format!("{context} {value}")));
    }
    Ok(degrees)
}

/// What the operator loop should do after a command.
#[derive(Debug, PartialEq)]
pub enum Flow {
    Continue,
    Print(String),
    Quit,
}

pub fn apply(command: Command, session: &mut Session) -> Flow {
    match command {
        Command::Chat(text) => {
            if !session.submit_chat(&text) {
                return Flow::Print("Waiting for the assistant's reply.".to_string());
            }
        }
        Command::Units => return Flow::Print(unit_listing(session)),
        Command::Select(name) => {
            let id = session.units().find_by_name(&name).map(|u| u.id.clone());
            match id {
                Some(id) if session.select_unit(&id) => {}
                _ => return Flow::Print(format!("Cannot select {name}.")),
            }
        }
        Command::Deselect => session.clear_selection(),
        Command::See => session.see_on_map(),
        Command::Dismiss(alert) => {
            if matches!(alert, None | Some(Alert::Hq)) {
                session.dismiss_hq_alert();
            }
            if matches!(alert, None | Some(Alert::Order)) {
                session.dismiss_order_notice();
            }
            if matches!(alert, None | Some(Alert::DroneData)) {
                session.dismiss_drone_data();
            }
            if matches!(alert, None | Some(Alert::Error)) {
                session.dismiss_banner();
            }
        }
        Command::Watch => {
            if !session.watch_drone_data() {
                return Flow::Print("No drone data to review.".to_string());
            }
        }
        Command::Draft => return draft_text(session),
        Command::Edit { field, text } => {
            session.edit_draft(field, text);
            return draft_text(session);
        }
        Command::Send => {
            session.send_mission_order();
        }
        Command::Close => session.close_draft(),
        Command::Delete(name) => {
            let wanted = normalize_name(&name);
            let id = session
                .visible_units()
                .into_iter()
                .find(|u| normalize_name(&u.name) == wanted)
                .map(|u| u.id.clone());
            match id {
                Some(id) => session.delete_unit(&id),
                None => return Flow::Print(format!("No unit named {name}.")),
            }
        }
        Command::Place { draft, position } => {
            session.begin_placement(draft);
            session.place_at(position);
        }
        Command::Cancel => session.cancel_placement(),
        Command::Reset => {
            if !session.restart_scenario() {
                return Flow::Print("Scenario restore already in progress.".to_string());
            }
        }
        Command::Link(url) => session.open_link(&url, None),
        Command::Help => return Flow::Print(HELP.to_string()),
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}

fn draft_text(session: &Session) -> Flow {
    match session.draft() {
        Some(draft) => Flow::Print(draft.render()),
        None => Flow::Print("No mission order draft open.".to_string()),
    }
}

fn unit_listing(session: &Session) -> String {
    if session.units().is_empty() {
        return "No units on the map.".to_string();
    }
    let selected = session.selected_unit().map(|u| u.id.as_str());
    let mut lines: Vec<String> = session
        .visible_units()
        .iter()
        .map(|u| {
            let marker = if Some(u.id.as_str()) == selected { '*' } else { ' ' };
            format!(
                "{marker} {:<16} {:<8} {:<22} {:<9} {:>10.5} {:>10.5}  {}",
                u.name,
                u.side.label(),
                u.unit_type.symbol().label,
                u.echelon.map_or("-", |e| e.label()),
                u.position.lat,
                u.position.lon,
                u.symbol_code(),
            )
        })
        .collect();

    if let Some(trail) = session.trail() {
        let drone = session
            .units()
            .get(&trail.drone_id)
            .map_or(trail.drone_id.as_str(), |u| u.name.as_str());
        let stage = session
            .flight()
            .filter(|f| f.unit_id == trail.drone_id)
            .map_or("STOPPED", |f| f.stage().label());
        lines.push(format!(
            "order {drone} {stage}: {:.5}, {:.5} -> {:.5}, {:.5}",
            trail.from.lat, trail.from.lon, trail.to.lat, trail.to.lon
        ));
    }
    if let Some(pending) = session.placement() {
        lines.push(format!("placing {} ({})", pending.name, pending.unit_type.symbol().label));
    }
    lines.join("\n")
}
