//! Boundary between the scan session and the host system.

use tokio::sync::broadcast;

use crate::{error::RadioError, model::NetworkRecord};

mod capability;
mod iw;

#[cfg(test)]
pub mod fake;

pub use capability::CapabilityAuthorizer;
pub use iw::IwRadio;

/// Signal published when the kernel finishes a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSignal {
    /// `updated` is false when the scan was aborted and results may be stale
    ResultsAvailable { updated: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Capability {
    #[strum(serialize = "CAP_NET_ADMIN")]
    NetAdmin,
}

/// Outcome of an authorization request, delivered after the request returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub request_id: u32,
    pub outcomes: Vec<(Capability, bool)>,
}

impl AuthorizationResponse {
    pub fn granted(&self) -> bool {
        matches!(self.outcomes.first(), Some((_, true)))
    }
}

pub trait Authorizer {
    fn is_granted(&self) -> bool;

    /// Ask for authorization. The outcome arrives later on the authorizer's
    /// response channel, tagged with `request_id`.
    fn request(&self, request_id: u32);
}

#[allow(async_fn_in_trait)]
pub trait Radio {
    fn is_enabled(&self) -> bool;

    /// Fire-and-forget; failures are not reported.
    fn set_enabled(&self, enabled: bool);

    /// Register a listener for scan completion. Dropping the receiver
    /// unregisters it. The channel closes if completion can no longer be
    /// observed.
    fn subscribe(&self) -> broadcast::Receiver<ScanSignal>;

    /// Start a scan without waiting for it to finish.
    async fn start_scan(&self) -> Result<(), RadioError>;

    /// Results of the most recent scan, possibly empty.
    async fn scan_results(&self) -> Result<Vec<NetworkRecord>, RadioError>;
}
