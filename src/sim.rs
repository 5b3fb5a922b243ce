use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::api::HttpBackend;
use crate::chat::links;
use crate::commands::{self, Flow};
use crate::session::{Completion, Session, SessionEvent};
use crate::telemetry::{self, ConsoleView, SharedView};

/// How often the loop looks at the dashboard's shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// What the loop does after a stdin read.
#[derive(Debug, PartialEq)]
enum Input {
    Keep,
    /// Stop reading stdin; timers and requests keep running.
    Detach,
    Quit,
}

// --- SimRunner: owns the session and drives its timers ---

pub struct SimRunner {
    session: Session,
    backend: HttpBackend,
    started: Instant,
    /// Dashboard snapshot; `None` in console mode.
    view: Option<SharedView>,
    shutdown: Arc<AtomicBool>,
}

impl SimRunner {
    pub fn new(
        session: Session,
        backend: HttpBackend,
        view: Option<SharedView>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session,
            backend,
            started: Instant::now(),
            view,
            shutdown,
        }
    }

    /// Milliseconds since the runner started.
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn console(&self) -> bool {
        self.view.is_none()
    }

    /// Hand every queued request to its own task; results come back on `tx`.
    fn flush_outbox(&mut self, tx: &mpsc::UnboundedSender<Completion>) {
        for outbound in self.session.take_outbox() {
            let backend = self.backend.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let response = backend.execute(outbound.request).await;
                // receiver gone means the loop has exited
                let _ = tx.send(Completion {
                    generation: outbound.generation,
                    response,
                });
            });
        }
    }

    fn report_events(&mut self) {
        for event in self.session.drain_events() {
            let line = match &event {
                SessionEvent::UnitsLoaded { count } => {
                    log::debug!("[session] {count} units on the map");
                    continue;
                }
                SessionEvent::HqDetected { name } => {
                    format!("HQ detected: {name}. /see to show it on the map.")
                }
                SessionEvent::FocusRequested { position, .. } => {
                    format!("Map focus {:.5}, {:.5}", position.lat, position.lon)
                }
                SessionEvent::DraftOpened { drone } => {
                    let mut out = format!("Mission order drafted for {drone}. /edit, /send or /close.");
                    if let Some(draft) = self.session.draft() {
                        out.push('\n');
                        out.push_str(&draft.render());
                    }
                    out
                }
                SessionEvent::OrderSent { drone } => format!("Order sent to {drone}."),
                SessionEvent::DroneDataReady { drone } => {
                    format!("{drone} has new data. /watch to review.")
                }
                SessionEvent::ChatReplied { text } => {
                    let mut out = format!("Assistant: {text}");
                    for link in links::extract_links(text) {
                        out.push_str(&format!("\n  [{}] /link {}", link.label, link.url));
                    }
                    out
                }
                SessionEvent::ChatReset { token } => format!("Chat cleared (#{token})."),
                SessionEvent::BackendRestarted => format!(
                    "Backend restarted, scenario reset (generation {}).",
                    self.session.generation()
                ),
                SessionEvent::ScenarioRestored { restored_units } => {
                    format!("Scenario restored ({restored_units} units).")
                }
                SessionEvent::OpenMedia { title, url } => format!("Media {title}: {url}"),
                SessionEvent::OpenExternal { url } => format!("Open {url}"),
                SessionEvent::Error(message) => format!("Error: {message}"),
            };
            log::info!("[session] {line}");
            if self.console() {
                println!("{line}");
            }
        }
    }

    fn publish(&self) {
        if let Some(view) = &self.view {
            telemetry::publish(view, ConsoleView::capture(&self.session, self.now_ms()));
        }
    }

    /// Returns false when the operator asked to quit.
    fn handle_line(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return true;
        }
        match commands::parse_command_line(line) {
            Ok(command) => match commands::apply(command, &mut self.session) {
                Flow::Continue => true,
                Flow::Print(text) => {
                    println!("{text}");
                    true
                }
                Flow::Quit => false,
            },
            Err(err) => {
                println!("{err} (/help for commands)");
                true
            }
        }
    }

    fn on_stdin(&mut self, read: std::io::Result<Option<String>>) -> Input {
        match read {
            Ok(Some(line)) => {
                if self.handle_line(&line) {
                    Input::Keep
                } else {
                    Input::Quit
                }
            }
            Ok(None) => {
                log::info!("[sim] stdin closed, continuing unattended");
                Input::Detach
            }
            Err(e) => {
                log::warn!("[sim] stdin read failed: {e}");
                Input::Detach
            }
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();

        let settings = self.session.settings().clone();
        let mut flight_tick = time::interval(Duration::from_millis(settings.flight.tick_ms));
        flight_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately: the eager startup probe
        let mut health_tick = time::interval(Duration::from_millis(settings.health_poll_ms));
        health_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown_poll = time::interval(SHUTDOWN_POLL);

        // raw-mode dashboard owns the terminal, so no line input there
        let mut stdin_open = self.console();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut ctrl_c_armed = true;

        log::info!("[sim] connecting to {}", self.backend.base());
        if self.console() {
            println!("c2map: {}  (/help for commands)", self.backend.base());
        }
        self.session.bootstrap();

        loop {
            self.flush_outbox(&tx);
            self.report_events();
            self.publish();

            let reveal_at = self.session.reveal_deadline();
            let reveal_deadline = self.started + Duration::from_millis(reveal_at.unwrap_or(0));

            tokio::select! {
                _ = flight_tick.tick() => {
                    let now = self.now_ms();
                    self.session.tick_flight(now);
                }
                _ = health_tick.tick() => self.session.health_tick(),
                _ = time::sleep_until(reveal_deadline), if reveal_at.is_some() => {
                    let now = self.now_ms();
                    self.session.poll_reveal(now);
                }
                Some(completion) = rx.recv() => {
                    let now = self.now_ms();
                    self.session.complete(completion, now);
                }
                line = lines.next_line(), if stdin_open => match self.on_stdin(line) {
                    Input::Keep => {}
                    Input::Detach => stdin_open = false,
                    Input::Quit => break,
                },
                _ = shutdown_poll.tick() => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                }
                res = &mut ctrl_c, if ctrl_c_armed => match res {
                    Ok(()) => break,
                    Err(e) => {
                        log::warn!("[sim] ctrl-c handler unavailable: {e}");
                        ctrl_c_armed = false;
                    }
                },
            }
        }

        self.shutdown.store(true, Ordering::Relaxed);
        log::info!("[sim] stopped at t={}ms", self.now_ms());
        Ok(())
    }
}
