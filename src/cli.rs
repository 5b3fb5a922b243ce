use std::path::PathBuf;

use clap::Parser;

use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "c2map", about = "C2 demo scenario client")]
pub struct Args {
    /// Backend base URL
    #[arg(long = "api-base", env = "C2_API_BASE", default_value = "http://localhost:8000")]
    pub api_base: String,

    /// Lat/lon tolerance in degrees when matching the scenario HQ by position
    #[arg(long = "hq-tolerance", default_value_t = 1e-4)]
    pub hq_tolerance: f64,

    /// Full-screen terminal dashboard instead of the line console
    #[arg(short = 'd', long = "dashboard")]
    pub dashboard: bool,

    /// Log file (dashboard mode logs to c2map.log unless set)
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn settings(&self) -> Settings {
        Settings {
            hq_match_tolerance_deg: self.hq_tolerance,
            ..Settings::new(self.api_base.as_str())
        }
    }

    /// Where logs go, if not stderr.
    pub fn log_path(&self) -> Option<PathBuf> {
        match (&self.log_file, self.dashboard) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => Some(PathBuf::from("c2map.log")),
            (None, false) => None,
        }
    }
}
