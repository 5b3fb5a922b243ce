use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Terminal,
};

use crate::chat::types::ChatRole;
use crate::coords::LatLon;
use crate::session::Session;
use crate::units::Side;

const CHAT_TAIL: usize = 20;

#[derive(Clone)]
pub struct UnitRow {
    pub name: String,
    pub side: Side,
    pub type_label: &'static str,
    pub echelon: &'static str,
    pub lat: f64,
    pub lon: f64,
    pub selected: bool,
    pub flying: bool,
}

#[derive(Clone)]
pub struct FlightRow {
    pub drone: String,
    pub stage: &'static str,
    pub distance_m: f64,
    pub position: LatLon,
    pub target: LatLon,
}

/// Order line from the tasked drone to its objective.
#[derive(Clone)]
pub struct TrailRow {
    pub drone: String,
    pub from: LatLon,
    pub to: LatLon,
}

#[derive(Clone)]
pub struct ChatRow {
    pub role: ChatRole,
    pub text: String,
}

/// Snapshot of the session rendered by the dashboard thread.
#[derive(Clone, Default)]
pub struct ConsoleView {
    pub api_base: String,
    pub clock_ms: u64,
    pub units: Vec<UnitRow>,
    pub flight: Option<FlightRow>,
    pub trail: Option<TrailRow>,
    pub reveal_in_ms: Option<u64>,
    pub hq_revealed: bool,
    pub hq_alert: bool,
    pub order_notice: Option<String>,
    pub drone_data: Option<String>,
    pub draft_for: Option<String>,
    /// Rendered mission order, one entry per line.
    pub draft: Vec<String>,
    pub placing: Option<String>,
    pub banner: Option<String>,
    pub awaiting_reply: bool,
    /// Bumped on every chat reset.
    pub chat_session: u64,
    pub chat: Vec<ChatRow>,
}

impl ConsoleView {
    pub fn capture(session: &Session, now_ms: u64) -> Self {
        let selected = session.selected_unit().map(|u| u.id.clone());
        let flying = session.flight().map(|f| f.unit_id.clone());
        let units = session
            .visible_units()
            .into_iter()
            .map(|u| UnitRow {
                name: u.name.clone(),
                side: u.side,
                type_label: u.unit_type.symbol().label,
                echelon: u.echelon.map_or("", |e| e.label()),
                lat: u.position.lat,
                lon: u.position.lon,
                selected: selected.as_deref() == Some(u.id.as_str()),
                flying: flying.as_deref() == Some(u.id.as_str()),
            })
            .collect();

        Self {
            api_base: session.settings().api_base.clone(),
            clock_ms: now_ms,
            units,
            flight: session.flight().map(|f| FlightRow {
                drone: f.unit_name.clone(),
                stage: f.stage().label(),
                distance_m: f.distance_to_target(),
                position: f.position(),
                target: f.target(),
            }),
            trail: session.trail().map(|t| TrailRow {
                drone: session
                    .units()
                    .get(&t.drone_id)
                    .map_or_else(|| t.drone_id.clone(), |u| u.name.clone()),
                from: t.from,
                to: t.to,
            }),
            reveal_in_ms: session.reveal_deadline().map(|d| d.saturating_sub(now_ms)),
            hq_revealed: session.hq_revealed(),
            hq_alert: session.hq_alert_open(),
            order_notice: session.order_notice().map(str::to_string),
            drone_data: session.drone_data().map(str::to_string),
            draft_for: session.draft().map(|d| d.drone_name.clone()),
            draft: session
                .draft()
                .map(|d| d.render().lines().map(str::to_string).collect())
                .unwrap_or_default(),
            placing: session.placement().map(|p| p.name.clone()),
            banner: session.banner().map(str::to_string),
            awaiting_reply: session.chat().awaiting_reply(),
            chat_session: session.chat_reset_token(),
            chat: session
                .chat()
                .tail(CHAT_TAIL)
                .iter()
                .map(|m| ChatRow {
                    role: m.role,
                    text: m.content.clone(),
                })
                .collect(),
        }
    }

    /// Alert lines in display order.
    pub fn alerts(&self) -> Vec<(Color, String)> {
        let mut lines = Vec::new();
        if let Some(banner) = &self.banner {
            lines.push((Color::Red, format!("ERROR  {banner}")));
        }
        if self.hq_alert {
            lines.push((Color::Yellow, "HQ DETECTED  /see to focus".to_string()));
        }
        if let Some(drone) = &self.order_notice {
            lines.push((Color::Green, format!("ORDER SENT  {drone}")));
        }
        if let Some(drone) = &self.drone_data {
            lines.push((Color::Magenta, format!("NEW DATA  {drone}  /watch to review")));
        }
        if let Some(drone) = &self.draft_for {
            lines.push((Color::Cyan, format!("DRAFT OPEN  {drone}  /edit /send /close")));
        }
        if let Some(name) = &self.placing {
            lines.push((Color::Blue, format!("PLACING  {name}  /cancel to abort")));
        }
        lines
    }
}

pub type SharedView = Arc<Mutex<ConsoleView>>;

pub fn new_shared_view() -> SharedView {
    Arc::new(Mutex::new(ConsoleView::default()))
}

pub fn publish(view: &SharedView, snapshot: ConsoleView) {
    match view.lock() {
        Ok(mut guard) => *guard = snapshot,
        Err(poisoned) => *poisoned.into_inner() = snapshot,
    }
}

/// Spawn the ratatui dashboard thread. Runs until `shutdown` is set;
/// pressing `q` sets it.
pub fn spawn_dashboard(view: SharedView, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = run_dashboard(view, &shutdown) {
            log::error!("[dashboard] {e}");
        }
        shutdown.store(true, Ordering::Relaxed);
    })
}

fn run_dashboard(view: SharedView, shutdown: &AtomicBool) -> io::Result<()> {
    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('q') {
                    shutdown.store(true, Ordering::Relaxed);
                }
            }
        }

        let snapshot = match view.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        terminal.draw(|frame| {
            let area = frame.area();
            draw_console(frame, area, &snapshot);
        })?;
    }

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

fn side_color(side: Side) -> Color {
    match side {
        Side::Friend => Color::Cyan,
        Side::Enemy => Color::Red,
        Side::Neutral => Color::Green,
        Side::Unknown => Color::Yellow,
    }
}

fn panel(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
}

fn draw_console(frame: &mut ratatui::Frame, area: Rect, v: &ConsoleView) {
    let outer_block = Block::default()
        .title(format!(" c2map  {} ", v.api_base))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = outer_block.inner(area);
    frame.render_widget(outer_block, area);

    let alerts = v.alerts();
    let draft_height = if v.draft.is_empty() { 0 } else { v.draft.len() as u16 + 2 };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),                              // Flight
            Constraint::Length(alerts.len().max(1) as u16 + 2), // Alerts
            Constraint::Length(draft_height),                   // Draft
            Constraint::Min(5),                                 // Units | Chat
        ])
        .split(inner);

    // Flight
    let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    let label = Style::default().fg(Color::DarkGray);
    let mut flight_spans = vec![
        Span::styled(" T+ ", label),
        Span::styled(format!("{:7.1}s", v.clock_ms as f64 / 1000.0), value),
        Span::raw("  "),
    ];
    match &v.flight {
        Some(f) => flight_spans.extend([
            Span::styled(" UAV ", label),
            Span::styled(f.drone.clone(), value),
            Span::raw("  "),
            Span::styled(f.stage, Style::default().fg(Color::Yellow)),
            Span::raw("  "),
            Span::styled(" POS ", label),
            Span::styled(format!("{:.5}, {:.5}", f.position.lat, f.position.lon), value),
            Span::styled(" TGT ", label),
            Span::styled(format!("{:.5}, {:.5}", f.target.lat, f.target.lon), value),
            Span::styled(format!(" {:7.0} m", f.distance_m), value),
        ]),
        None => flight_spans.push(Span::styled("no active flight", label)),
    }
    if let Some(ms) = v.reveal_in_ms {
        flight_spans.push(Span::raw("  "));
        flight_spans.push(Span::styled(format!(" detection in {:.1}s", ms as f64 / 1000.0), label));
    } else if v.hq_revealed {
        flight_spans.push(Span::raw("  "));
        flight_spans.push(Span::styled(" HQ located", Style::default().fg(Color::Red)));
    }
    let order_line = match &v.trail {
        Some(t) => Line::from(vec![
            Span::styled(" ORDER ", label),
            Span::styled(t.drone.clone(), Style::default().fg(Color::Cyan)),
            Span::styled(
                format!("  {:.5}, {:.5} -> {:.5}, {:.5}", t.from.lat, t.from.lon, t.to.lat, t.to.lon),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        None => Line::from(Span::styled(" no order", label)),
    };
    frame.render_widget(
        Paragraph::new(vec![Line::from(flight_spans), order_line]).block(panel(" Flight ")),
        rows[0],
    );

    // Alerts
    let alert_lines: Vec<Line> = if alerts.is_empty() {
        vec![Line::from(Span::styled(" none", label))]
    } else {
        alerts
            .into_iter()
            .map(|(color, text)| Line::from(Span::styled(format!(" {text}"), Style::default().fg(color))))
            .collect()
    };
    frame.render_widget(Paragraph::new(alert_lines).block(panel(" Alerts ")), rows[1]);

    // Draft
    if !v.draft.is_empty() {
        let draft_lines: Vec<Line> = v
            .draft
            .iter()
            .map(|l| Line::from(Span::styled(l.clone(), Style::default().fg(Color::Cyan))))
            .collect();
        frame.render_widget(
            Paragraph::new(draft_lines)
                .wrap(Wrap { trim: false })
                .block(panel(" Mission order ")),
            rows[2],
        );
    }

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[3]);

    // Units
    let unit_lines: Vec<Line> = v
        .units
        .iter()
        .map(|u| {
            let marker = match (u.selected, u.flying) {
                (true, _) => "*",
                (_, true) => ">",
                _ => " ",
            };
            Line::from(vec![
                Span::styled(format!("{marker} "), Style::default().fg(Color::Yellow)),
                Span::styled(format!("{:<16} ", u.name), Style::default().fg(side_color(u.side))),
                Span::styled(format!("{:<22} ", u.type_label), label),
                Span::styled(format!("{:<10}", u.echelon), label),
                Span::styled(format!("{:9.5} {:9.5}", u.lat, u.lon), Style::default().fg(Color::White)),
            ])
        })
        .collect();
    frame.render_widget(
        Paragraph::new(unit_lines).block(panel(" Units ")),
        cols[0],
    );

    // Chat
    let mut chat_lines: Vec<Line> = v
        .chat
        .iter()
        .map(|m| {
            let color = match m.role {
                ChatRole::User => Color::Cyan,
                ChatRole::Assistant => Color::White,
                ChatRole::System => Color::DarkGray,
            };
            Line::from(vec![
                Span::styled(format!("{:<10} ", m.role.label()), Style::default().fg(Color::DarkGray)),
                Span::styled(m.text.clone(), Style::default().fg(color)),
            ])
        })
        .collect();
    if v.awaiting_reply {
        chat_lines.push(Line::from(Span::styled("           ...", label)));
    }
    let chat_title = format!(" Chat #{} ", v.chat_session);
    frame.render_widget(
        Paragraph::new(chat_lines)
            .wrap(Wrap { trim: false })
            .block(panel(&chat_title)),
        cols[1],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChatReply, LoadPurpose, Request, Response};
    use crate::session::Completion;
    use crate::settings::Settings;
    use crate::units::{test_unit, UnitType};
    use serde_json::json;

    fn loaded_session() -> Session {
        let mut session = Session::new(Settings::default());
        session.bootstrap();
        let outbox = session.take_outbox();
        let Request::LoadUnits { seq, .. } = &outbox[0].request else {
            panic!("expected a unit load");
        };
        session.complete(
            Completion {
                generation: 0,
                response: Response::Units {
                    purpose: LoadPurpose::Rearm,
                    seq: *seq,
                    result: Ok(vec![
                        test_unit("d1", "UAV-REC-001", UnitType::UasRecon, 48.2, 39.9),
                        test_unit("x", "RUS-HQ-COMINT", UnitType::CommandPost, 48.247165, 39.950965),
                    ]),
                },
            },
            0,
        );
        session
    }

    #[test]
    fn capture_hides_unrevealed_hq() {
        let mut session = loaded_session();
        session.select_unit("d1");
        let view = ConsoleView::capture(&session, 1_000);
        assert_eq!(view.units.len(), 1);
        assert!(view.units[0].selected);
        assert_eq!(view.reveal_in_ms, Some(4_000));
        assert_eq!(view.chat.len(), 1);
        assert!(view.alerts().is_empty());
    }

    #[test]
    fn capture_reports_alerts() {
        let mut session = loaded_session();
        session.poll_reveal(5_000);
        session.open_link("/map/uav-recon/UAV-REC-404", None);
        let view = ConsoleView::capture(&session, 5_000);
        assert_eq!(view.units.len(), 2);
        let alerts = view.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].1, "ERROR  Drone UAV-REC-404 not found on the map.");
        assert!(alerts[1].1.starts_with("HQ DETECTED"));
    }

    #[test]
    fn capture_carries_draft_then_order_trail() {
        let mut session = loaded_session();
        session.select_unit("d1");
        session.submit_chat("draft");
        session.take_outbox();
        session.complete(
            Completion {
                generation: 0,
                response: Response::Chat(Ok(ChatReply {
                    reply: None,
                    actions: Some(vec![json!({
                        "type": "draft_recon_order",
                        "payload": {"mission": "Fix the COMINT node"}
                    })]),
                })),
            },
            0,
        );
        let view = ConsoleView::capture(&session, 100);
        assert_eq!(view.draft.len(), 11);
        assert!(view.draft.iter().any(|l| l.trim() == "Fix the COMINT node"));
        assert!(view.trail.is_none());

        assert!(session.send_mission_order());
        session.tick_flight(220);
        let view = ConsoleView::capture(&session, 220);
        assert!(view.draft.is_empty());
        let trail = view.trail.expect("order trail");
        assert_eq!(trail.drone, "UAV-REC-001");
        let flight = view.flight.expect("flight row");
        assert_eq!(trail.from, flight.position);
        assert_eq!(trail.to, flight.target);
        assert_eq!(view.units.iter().filter(|u| u.flying).count(), 1);
    }

    #[test]
    fn capture_tracks_chat_resets() {
        let mut session = loaded_session();
        session.restart_scenario();
        session.take_outbox();
        session.complete(
            Completion {
                generation: 0,
                response: Response::ScenarioReset(Ok(crate::api::ScenarioRestored {
                    ok: true,
                    restored_units: 2,
                    backup_path: None,
                })),
            },
            0,
        );
        let view = ConsoleView::capture(&session, 0);
        assert_eq!(view.chat_session, 1);
        assert!(view.chat.is_empty());
        assert!(!view.hq_revealed);
    }

    #[test]
    fn publish_replaces_snapshot() {
        let view = new_shared_view();
        let session = loaded_session();
        publish(&view, ConsoleView::capture(&session, 42));
        assert_eq!(view.lock().unwrap().clock_ms, 42);
    }
}
