mod api;
mod chat;
mod cli;
mod commands;
mod coords;
mod flight;
mod scenario;
mod session;
mod settings;
mod sim;
mod telemetry;
mod units;
mod watchdog;

use std::fs::File;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use api::HttpBackend;
use session::Session;
use sim::SimRunner;

fn init_logging(args: &cli::Args) -> anyhow::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = args.log_path() {
        let file = File::create(&path)
            .with_context(|| format!("cannot create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging(&args)?;

    let settings = args.settings();
    log::info!(
        "[main] api {} reveal {}ms health {}ms hq tolerance {}°",
        settings.api_base,
        settings.reveal_delay_ms,
        settings.health_poll_ms,
        settings.hq_match_tolerance_deg
    );

    let backend = HttpBackend::new(&settings.api_base).context("cannot build HTTP client")?;
    let shutdown = Arc::new(AtomicBool::new(false));

    let (view, dashboard) = if args.dashboard {
        let view = telemetry::new_shared_view();
        let handle = telemetry::spawn_dashboard(view.clone(), shutdown.clone());
        (Some(view), Some(handle))
    } else {
        (None, None)
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;
    let runner = SimRunner::new(Session::new(settings), backend, view, shutdown);
    let result = runtime.block_on(runner.run());
    // a pending stdin read would otherwise hold the runtime open
    runtime.shutdown_background();

    if let Some(handle) = dashboard {
        if handle.join().is_err() {
            log::error!("[main] dashboard thread panicked");
        }
    }
    result
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}
