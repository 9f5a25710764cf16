use std::{
    fs,
    path::{Path, PathBuf},
};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{AuthorizationResponse, Authorizer, Capability};

const CAP_NET_ADMIN: u32 = 12;

/// Authorizes scans when the process holds `CAP_NET_ADMIN`
pub struct CapabilityAuthorizer {
    status_path: PathBuf,
    responses: mpsc::UnboundedSender<AuthorizationResponse>,
}

impl CapabilityAuthorizer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuthorizationResponse>) {
        Self::with_status_path("/proc/self/status")
    }

    pub fn with_status_path(
        path: impl Into<PathBuf>,
    ) -> (Self, mpsc::UnboundedReceiver<AuthorizationResponse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let authorizer = Self {
            status_path: path.into(),
            responses: tx,
        };
        (authorizer, rx)
    }
}

impl Authorizer for CapabilityAuthorizer {
    fn is_granted(&self) -> bool {
        match effective_capabilities(&self.status_path) {
            Some(caps) => caps & (1 << CAP_NET_ADMIN) != 0,
            None => {
                warn!(path = %self.status_path.display(), "could not read effective capabilities");
                false
            }
        }
    }

    // capabilities can't be raised from inside the process, so this only
    // re-checks and reports
    fn request(&self, request_id: u32) {
        let granted = self.is_granted();
        if !granted {
            warn!(
                "scanning needs {}; run as root or grant it with `setcap cap_net_admin+ep`",
                Capability::NetAdmin
            );
        }

        let response = AuthorizationResponse {
            request_id,
            outcomes: vec![(Capability::NetAdmin, granted)],
        };
        if self.responses.send(response).is_err() {
            debug!(request_id, "authorization response dropped, nobody is listening");
        }
    }
}

fn effective_capabilities(path: &Path) -> Option<u64> {
    let status = fs::read_to_string(path).ok()?;
    parse_cap_eff(&status)
}

fn parse_cap_eff(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("CapEff:"))?;
    let hex = line["CapEff:".len()..].trim();
    u64::from_str_radix(hex, 16).ok()
}
