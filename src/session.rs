//! One scan-and-log cycle at a time.
//!
//! A cycle moves through
//! `Idle -> AuthorizationCheck -> {AuthorizationPending | Scanning} -> AwaitingResults -> Persisting -> Idle`
//! and every failure path also ends in `Idle`. The completion listener is a
//! broadcast receiver owned by the session. It is dropped (unregistered) when
//! results arrive, when the wait times out, and when the session is dropped.

use std::{io, path::PathBuf, time::Duration};

use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    time::{self, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    error::{RadioError, ScanError},
    logfile::{PersistReport, ScanLogFile},
    model::NetworkRecord,
    notice::{Notice, Notifier},
    platform::{AuthorizationResponse, Authorizer, Radio, ScanSignal},
};

/// Tag for authorization requests issued by a session
pub const AUTHORIZATION_REQUEST_ID: u32 = 1;

pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ScanState {
    Idle,
    AuthorizationCheck,
    AuthorizationPending,
    Scanning,
    AwaitingResults,
    Persisting,
}

/// What happened when a scan was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRequest {
    /// The listener is registered and the radio is scanning.
    Started,
    /// Authorization was requested; the answer arrives on the response channel.
    AuthorizationPending,
    AuthorizationDenied,
    /// Authorization was lost between the check and the trigger.
    PermissionDenied,
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Saved { count: usize, path: PathBuf },
    Empty,
    SaveFailed { count: usize },
    TimedOut,
    AuthorizationDenied,
    PermissionDenied,
}

pub struct ScanSession<R, A, N> {
    radio: R,
    authorizer: A,
    notifier: N,
    log: ScanLogFile,
    timeout: Duration,
    state: ScanState,
    listener: Option<broadcast::Receiver<ScanSignal>>,
}

impl<R: Radio, A: Authorizer, N: Notifier> ScanSession<R, A, N> {
    pub fn new(radio: R, authorizer: A, notifier: N, log: ScanLogFile) -> Self {
        Self {
            radio,
            authorizer,
            notifier,
            log,
            timeout: DEFAULT_SCAN_TIMEOUT,
            state: ScanState::Idle,
            listener: None,
        }
    }

    /// Bound on waiting for scan results or an authorization answer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn log_file(&self) -> &ScanLogFile {
        &self.log
    }

    pub fn is_authorized(&self) -> bool {
        self.authorizer.is_granted()
    }

    /// Ask the radio to turn on if it is off. Does not wait for it.
    pub fn ensure_radio_enabled(&self) {
        if !self.radio.is_enabled() {
            info!("radio is disabled, requesting enable");
            self.notifier.notify(Notice::EnablingRadio);
            self.radio.set_enabled(true);
        }
    }

    pub async fn request_scan(
        &mut self,
        has_authorization: bool,
    ) -> Result<ScanRequest, ScanError> {
        self.reject_if_busy()?;

        if !has_authorization {
            self.state = ScanState::AuthorizationPending;
            self.notifier.notify(Notice::AuthorizationRequired);
            self.authorizer.request(AUTHORIZATION_REQUEST_ID);
            return Ok(ScanRequest::AuthorizationPending);
        }

        self.state = ScanState::Scanning;
        let listener = self.radio.subscribe();
        match self.radio.start_scan().await {
            Ok(()) => {
                self.listener = Some(listener);
                self.state = ScanState::AwaitingResults;
                info!("scan started");
                self.notifier.notify(Notice::ScanningStarted);
                Ok(ScanRequest::Started)
            }
            Err(RadioError::PermissionDenied(reason)) => {
                drop(listener);
                self.state = ScanState::Idle;
                error!("permission denied: {reason}");
                self.notifier.notify(Notice::PermissionDenied);
                Ok(ScanRequest::PermissionDenied)
            }
            Err(e) => {
                drop(listener);
                self.state = ScanState::Idle;
                error!("failed to trigger scan: {e}");
                self.notifier.notify(Notice::ScanFailed);
                Err(e.into())
            }
        }
    }

    /// Wait for the pending scan to finish and handle its results.
    pub async fn await_completion(&mut self) -> Result<ScanOutcome, ScanError> {
        let Some(mut listener) = self.listener.take() else {
            return Err(ScanError::NotScanning);
        };

        let signal = time::timeout(self.timeout, async {
            loop {
                match listener.recv().await {
                    Ok(signal) => return Ok(signal),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "scan listener lagged");
                    }
                    Err(RecvError::Closed) => return Err(ScanError::SignalLost),
                }
            }
        })
        .await;
        drop(listener);

        match signal {
            Err(_) => {
                warn!(timeout = ?self.timeout, "no scan results before timeout");
                self.state = ScanState::Idle;
                self.notifier.notify(Notice::ScanTimedOut);
                Ok(ScanOutcome::TimedOut)
            }
            Ok(Err(e)) => {
                error!("scan completion can no longer be observed");
                self.state = ScanState::Idle;
                self.notifier.notify(Notice::ScanFailed);
                Err(e)
            }
            Ok(Ok(ScanSignal::ResultsAvailable { updated })) => {
                if !updated {
                    debug!("scan was aborted, reading cached results");
                }
                let results = match self.radio.scan_results().await {
                    Ok(results) => Some(results),
                    Err(e) => {
                        warn!("failed to read scan results: {e}");
                        None
                    }
                };
                Ok(self.on_scan_complete(results))
            }
        }
    }

    pub fn on_scan_complete(&mut self, results: Option<Vec<NetworkRecord>>) -> ScanOutcome {
        let results = match results {
            Some(results) if !results.is_empty() => results,
            _ => {
                info!("no networks found");
                self.state = ScanState::Idle;
                self.notifier.notify(Notice::NoNetworksFound);
                return ScanOutcome::Empty;
            }
        };

        let count = results.len();
        info!(count, "networks found");
        self.notifier.notify(Notice::NetworksFound(count));

        let outcome = match self.persist(&results) {
            Ok(_) => ScanOutcome::Saved {
                count,
                path: self.log.path().to_path_buf(),
            },
            Err(e) => {
                error!(path = %self.log.path().display(), "failed to save scan results: {e}");
                self.notifier.notify(Notice::SaveFailed);
                ScanOutcome::SaveFailed { count }
            }
        };
        self.state = ScanState::Idle;
        outcome
    }

    fn persist(&mut self, records: &[NetworkRecord]) -> io::Result<PersistReport> {
        self.state = ScanState::Persisting;
        let report = self.log.persist(records)?;

        let path = self.log.path().to_path_buf();
        if report.created {
            info!(path = %path.display(), "created scan log");
            self.notifier.notify(Notice::FileCreated(path.clone()));
        }
        info!(path = %path.display(), lines = report.lines, "scan results saved");
        self.notifier.notify(Notice::Saved(path));
        Ok(report)
    }

    /// Handle an answer to an authorization request.
    ///
    /// Returns `None` for answers to requests this session did not make. A
    /// grant immediately starts the scan.
    pub async fn on_authorization_result(
        &mut self,
        response: &AuthorizationResponse,
    ) -> Result<Option<ScanRequest>, ScanError> {
        if response.request_id != AUTHORIZATION_REQUEST_ID {
            debug!(request_id = response.request_id, "ignoring foreign authorization response");
            return Ok(None);
        }

        if response.granted() {
            self.notifier.notify(Notice::AuthorizationGranted);
            self.request_scan(true).await.map(Some)
        } else {
            self.state = ScanState::Idle;
            self.notifier.notify(Notice::AuthorizationDenied);
            Ok(Some(ScanRequest::AuthorizationDenied))
        }
    }

    /// Run one full cycle, from the authorization check to the log write.
    pub async fn cycle(
        &mut self,
        responses: &mut mpsc::UnboundedReceiver<AuthorizationResponse>,
    ) -> Result<ScanOutcome, ScanError> {
        self.reject_if_busy()?;

        self.state = ScanState::AuthorizationCheck;
        let authorized = self.is_authorized();
        let mut request = self.request_scan(authorized).await?;
        if request == ScanRequest::AuthorizationPending {
            request = self.await_authorization(responses).await?;
        }

        match request {
            ScanRequest::Started => self.await_completion().await,
            ScanRequest::PermissionDenied => Ok(ScanOutcome::PermissionDenied),
            ScanRequest::AuthorizationDenied | ScanRequest::AuthorizationPending => {
                Ok(ScanOutcome::AuthorizationDenied)
            }
        }
    }

    async fn await_authorization(
        &mut self,
        responses: &mut mpsc::UnboundedReceiver<AuthorizationResponse>,
    ) -> Result<ScanRequest, ScanError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match time::timeout_at(deadline, responses.recv()).await {
                Ok(Some(response)) => {
                    if let Some(request) = self.on_authorization_result(&response).await? {
                        return Ok(request);
                    }
                }
                Ok(None) | Err(_) => {
                    warn!("no answer to authorization request");
                    self.state = ScanState::Idle;
                    self.notifier.notify(Notice::AuthorizationDenied);
                    return Ok(ScanRequest::AuthorizationDenied);
                }
            }
        }
    }

    fn reject_if_busy(&self) -> Result<(), ScanError> {
        if self.listener.is_some() {
            warn!(state = %self.state, "scan requested while another is pending");
            self.notifier.notify(Notice::ScanInProgress);
            return Err(ScanError::Busy);
        }
        Ok(())
    }
}

impl<R, A, N> Drop for ScanSession<R, A, N> {
    fn drop(&mut self) {
        if self.listener.take().is_some() {
            debug!(state = %self.state, "unregistered pending scan listener");
        }
    }
}
