//! Backend restart detection through the opaque boot id returned by `/health`.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootVerdict {
    /// First observation; recorded as the baseline.
    Baseline,
    Unchanged,
    /// Boot id differs from the recorded one.
    Restarted,
}

#[derive(Default)]
pub struct BootWatch {
    last_boot_id: Option<String>,
    in_flight: bool,
}

impl BootWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the probe slot. False while a probe is still awaiting its answer.
    pub fn begin_probe(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn observe(&mut self, boot_id: &str) -> BootVerdict {
        self.in_flight = false;
        match self.last_boot_id.as_deref() {
            None => {
                log::info!("[watchdog] backend boot id {boot_id}");
                self.last_boot_id = Some(boot_id.to_string());
                BootVerdict::Baseline
            }
            Some(last) if last == boot_id => BootVerdict::Unchanged,
            Some(last) => {
                log::warn!("[watchdog] backend restarted ({last} -> {boot_id})");
                self.last_boot_id = Some(boot_id.to_string());
                BootVerdict::Restarted
            }
        }
    }

    /// Best-effort: the next interval retries.
    pub fn probe_failed(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn last_boot_id(&self) -> Option<&str> {
        self.last_boot_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_baseline() {
        let mut watch = BootWatch::new();
        assert!(watch.begin_probe());
        assert_eq!(watch.observe("boot-a"), BootVerdict::Baseline);
        assert_eq!(watch.last_boot_id(), Some("boot-a"));
    }

    #[test]
    fn same_id_is_unchanged() {
        let mut watch = BootWatch::new();
        watch.observe("boot-a");
        assert_eq!(watch.observe("boot-a"), BootVerdict::Unchanged);
        assert_eq!(watch.observe("boot-a"), BootVerdict::Unchanged);
    }

    #[test]
    fn new_id_restarts_once() {
        let mut watch = BootWatch::new();
        watch.observe("boot-a");
        assert_eq!(watch.observe("boot-b"), BootVerdict::Restarted);
        assert_eq!(watch.observe("boot-b"), BootVerdict::Unchanged);
        assert_eq!(watch.last_boot_id(), Some("boot-b"));
    }

    #[test]
    fn probes_do_not_overlap() {
        let mut watch = BootWatch::new();
        assert!(watch.begin_probe());
        assert!(!watch.begin_probe());
        watch.probe_failed();
        assert!(!watch.in_flight());
        assert!(watch.begin_probe());
    }

    #[test]
    fn failure_keeps_baseline() {
        let mut watch = BootWatch::new();
        watch.begin_probe();
        watch.observe("boot-a");
        watch.begin_probe();
        watch.probe_failed();
        assert_eq!(watch.last_boot_id(), Some("boot-a"));
        assert_eq!(watch.observe("boot-a"), BootVerdict::Unchanged);
    }
}
