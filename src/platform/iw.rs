//! Linux radio backend built on the `iw` and `rfkill` tools.
//!
//! Scans are started with `iw dev <iface> scan trigger`, which returns as soon
//! as the kernel accepts the request. Completion is observed by a background
//! `iw event` process whose `scan finished` / `scan aborted` lines are fanned
//! out to subscribers over a broadcast channel. Results are then read back
//! with `iw dev <iface> scan dump`.

use std::{
    fs,
    path::{Path, PathBuf},
    process::Stdio,
};

use mac_address::MacAddress;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    sync::broadcast,
    task::JoinHandle,
};
use tracing::{debug, error, warn};

use super::{Radio, ScanSignal};
use crate::{error::RadioError, model::NetworkRecord};

// iw reports no signal for some stanzas
const MISSING_SIGNAL_DBM: i32 = -100;

pub struct IwRadio {
    interface: String,
    program: PathBuf,
    sysfs_root: PathBuf,
    // subscribers are resubscribed from this, so they see the channel close
    // once the monitor has gone
    events: broadcast::Receiver<ScanSignal>,
    sender: Option<broadcast::Sender<ScanSignal>>,
    monitor: Option<JoinHandle<()>>,
}

impl IwRadio {
    pub fn new(interface: impl Into<String>) -> Self {
        let (sender, events) = broadcast::channel(16);
        Self {
            interface: interface.into(),
            program: PathBuf::from("iw"),
            sysfs_root: PathBuf::from("/sys"),
            events,
            sender: Some(sender),
            monitor: None,
        }
    }

    /// Run a different `iw` binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    /// Start the `iw event` monitor. Must be called inside a tokio runtime.
    ///
    /// The child process is running when this returns, so a scan triggered
    /// afterwards cannot finish unseen. If it cannot be started, or once it
    /// exits, subscribers see the channel close.
    pub fn watch_events(mut self) -> Self {
        let Some(sender) = self.sender.take() else {
            return self;
        };

        let child = Command::new(&self.program)
            .arg("event")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        match child {
            Ok(child) => {
                let interface = self.interface.clone();
                self.monitor = Some(tokio::spawn(monitor(interface, child, sender)));
            }
            Err(e) => {
                error!("failed to run `iw event`, scan completion will not be seen: {e}");
            }
        }
        self
    }

    async fn iw(&self, args: &[&str]) -> Result<String, RadioError> {
        let command = format!("iw {}", args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RadioError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.trim().to_owned();
            // iw prints "command failed: Operation not permitted (-1)"
            if reason.contains("Operation not permitted") {
                return Err(RadioError::PermissionDenied(reason));
            }
            return Err(RadioError::CommandFailed {
                command,
                reason: format!("exited with {}: {reason}", output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    // Some(true) if any wlan switch is unblocked, None if there are no wlan switches
    fn rfkill_unblocked(&self) -> Option<bool> {
        let entries = fs::read_dir(self.sysfs_root.join("class/rfkill")).ok()?;

        let mut found = false;
        for entry in entries.flatten() {
            let dir = entry.path();
            if read_trimmed(&dir.join("type")).as_deref() != Some("wlan") {
                continue;
            }
            found = true;

            let soft = read_trimmed(&dir.join("soft"));
            let hard = read_trimmed(&dir.join("hard"));
            if soft.as_deref() == Some("0") && hard.as_deref() == Some("0") {
                return Some(true);
            }
        }

        found.then_some(false)
    }
}

impl Drop for IwRadio {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

impl Radio for IwRadio {
    fn is_enabled(&self) -> bool {
        self.rfkill_unblocked().unwrap_or_else(|| {
            self.sysfs_root
                .join("class/net")
                .join(&self.interface)
                .exists()
        })
    }

    fn set_enabled(&self, enabled: bool) {
        let action = if enabled { "unblock" } else { "block" };
        match Command::new("rfkill")
            .args([action, "wifi"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_) => debug!(action, "requested rfkill change"),
            Err(e) => debug!(action, "could not run rfkill: {e}"),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ScanSignal> {
        self.events.resubscribe()
    }

    async fn start_scan(&self) -> Result<(), RadioError> {
        self.iw(&["dev", &self.interface, "scan", "trigger"]).await?;
        Ok(())
    }

    async fn scan_results(&self) -> Result<Vec<NetworkRecord>, RadioError> {
        let output = self.iw(&["dev", &self.interface, "scan", "dump"]).await?;
        Ok(parse_scan_dump(&output))
    }
}

// the sender is dropped when this returns, which closes the channel
async fn monitor(interface: String, mut child: Child, events: broadcast::Sender<ScanSignal>) {
    let Some(stdout) = child.stdout.take() else {
        return;
    };

    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(signal) = parse_event_line(&interface, &line) {
                    debug!(?signal, "scan event");
                    // no subscribers is fine
                    let _ = events.send(signal);
                }
            }
            Ok(None) => {
                warn!("`iw event` exited");
                break;
            }
            Err(e) => {
                warn!("failed to read `iw event` output: {e}");
                break;
            }
        }
    }
}

/// Parse one line of `iw event` output for `interface`.
///
/// Lines look like `wlan0 (phy #0): scan finished: 2412 2437 5180, ""`.
pub fn parse_event_line(interface: &str, line: &str) -> Option<ScanSignal> {
    let (iface, rest) = line.trim().split_once(" (phy #")?;
    if iface != interface {
        return None;
    }
    let (_, message) = rest.split_once("): ")?;

    if message.starts_with("scan finished") {
        Some(ScanSignal::ResultsAvailable { updated: true })
    } else if message.starts_with("scan aborted") {
        Some(ScanSignal::ResultsAvailable { updated: false })
    } else {
        None
    }
}

#[derive(Default)]
struct BssStanza {
    bssid: Option<MacAddress>,
    ssid: Option<String>,
    signal_dbm: Option<f64>,
}

impl BssStanza {
    fn flush(self) -> Option<NetworkRecord> {
        let signal_level = self
            .signal_dbm
            .map(|dbm| dbm.round() as i32)
            .unwrap_or(MISSING_SIGNAL_DBM);
        Some(NetworkRecord::new(
            self.ssid.unwrap_or_default(),
            self.bssid?,
            signal_level,
        ))
    }
}

/// Parse `iw dev <iface> scan dump` output, keeping stanza order.
///
/// Each stanza starts with `BSS aa:bb:cc:dd:ee:ff(on wlan0)` at column 0,
/// followed by indented key-value lines.
pub fn parse_scan_dump(output: &str) -> Vec<NetworkRecord> {
    let mut records = Vec::new();
    let mut current: Option<BssStanza> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("BSS ") {
            if let Some(record) = current.take().and_then(BssStanza::flush) {
                records.push(record);
            }

            let mac_end = rest
                .find(|c: char| !c.is_ascii_hexdigit() && c != ':')
                .unwrap_or(rest.len());
            let bssid: Option<MacAddress> = rest[..mac_end].parse().ok();
            if bssid.is_none() {
                debug!("skipping BSS line without a valid address: {line}");
            }
            current = Some(BssStanza {
                bssid,
                ..Default::default()
            });
            continue;
        }

        let Some(stanza) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("SSID:") {
            // first SSID wins
            if stanza.ssid.is_none() {
                stanza.ssid = Some(rest.trim().to_owned());
            }
        } else if let Some(rest) = trimmed.strip_prefix("signal:") {
            stanza.signal_dbm = rest.split_whitespace().next().and_then(|n| n.parse().ok());
        }
    }

    if let Some(record) = current.take().and_then(BssStanza::flush) {
        records.push(record);
    }

    records
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_owned())
}
