//! In-memory test doubles for the platform boundary.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use tokio::sync::{broadcast, mpsc};

use super::{AuthorizationResponse, Authorizer, Capability, Radio, ScanSignal};
use crate::{
    error::RadioError,
    model::NetworkRecord,
    notice::{Notice, Notifier},
};

#[derive(Clone)]
pub struct FakeRadio {
    inner: Arc<FakeRadioState>,
}

struct FakeRadioState {
    enabled: AtomicBool,
    enable_requests: AtomicUsize,
    triggers: AtomicUsize,
    // signal sent right after a successful trigger
    auto_complete: AtomicBool,
    deny_trigger: AtomicBool,
    fail_trigger: AtomicBool,
    results: Mutex<Result<Vec<NetworkRecord>, String>>,
    // None once closed, like a radio whose event source went away
    events: Mutex<Option<broadcast::Sender<ScanSignal>>>,
}

impl FakeRadio {
    pub fn new(results: Vec<NetworkRecord>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(FakeRadioState {
                enabled: AtomicBool::new(true),
                enable_requests: AtomicUsize::new(0),
                triggers: AtomicUsize::new(0),
                auto_complete: AtomicBool::new(true),
                deny_trigger: AtomicBool::new(false),
                fail_trigger: AtomicBool::new(false),
                results: Mutex::new(Ok(results)),
                events: Mutex::new(Some(events)),
            }),
        }
    }

    pub fn disabled(self) -> Self {
        self.inner.enabled.store(false, Ordering::SeqCst);
        self
    }

    /// Never deliver the completion signal on its own.
    pub fn silent(self) -> Self {
        self.inner.auto_complete.store(false, Ordering::SeqCst);
        self
    }

    pub fn deny_trigger(&self) {
        self.inner.deny_trigger.store(true, Ordering::SeqCst);
    }

    pub fn fail_trigger(&self) {
        self.inner.fail_trigger.store(true, Ordering::SeqCst);
    }

    pub fn fail_results(&self) {
        *self.inner.results.lock().unwrap() = Err("dump failed".to_owned());
    }

    pub fn complete(&self, updated: bool) {
        if let Some(events) = self.inner.events.lock().unwrap().as_ref() {
            let _ = events.send(ScanSignal::ResultsAvailable { updated });
        }
    }

    /// Drop the sender, so listeners see the channel close.
    pub fn close(&self) {
        self.inner.events.lock().unwrap().take();
    }

    pub fn listeners(&self) -> usize {
        self.inner
            .events
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    pub fn triggers(&self) -> usize {
        self.inner.triggers.load(Ordering::SeqCst)
    }

    pub fn enable_requests(&self) -> usize {
        self.inner.enable_requests.load(Ordering::SeqCst)
    }
}

impl Radio for FakeRadio {
    fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    // the fake radio stays disabled, like a request the platform ignored
    fn set_enabled(&self, _enabled: bool) {
        self.inner.enable_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn subscribe(&self) -> broadcast::Receiver<ScanSignal> {
        match self.inner.events.lock().unwrap().as_ref() {
            Some(events) => events.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    async fn start_scan(&self) -> Result<(), RadioError> {
        if self.inner.deny_trigger.load(Ordering::SeqCst) {
            return Err(RadioError::PermissionDenied("revoked".to_owned()));
        }
        if self.inner.fail_trigger.load(Ordering::SeqCst) {
            return Err(RadioError::CommandFailed {
                command: "scan trigger".to_owned(),
                reason: "Device or resource busy (-16)".to_owned(),
            });
        }
        self.inner.triggers.fetch_add(1, Ordering::SeqCst);
        if self.inner.auto_complete.load(Ordering::SeqCst) {
            self.complete(true);
        }
        Ok(())
    }

    async fn scan_results(&self) -> Result<Vec<NetworkRecord>, RadioError> {
        self.inner
            .results
            .lock()
            .unwrap()
            .clone()
            .map_err(|reason| RadioError::CommandFailed {
                command: "scan dump".to_owned(),
                reason,
            })
    }
}

#[derive(Clone)]
pub struct FakeAuthorizer {
    granted: Arc<AtomicBool>,
    // outcome reported for the next request
    grant_on_request: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<u32>>>,
    responses: mpsc::UnboundedSender<AuthorizationResponse>,
}

impl FakeAuthorizer {
    pub fn new(granted: bool) -> (Self, mpsc::UnboundedReceiver<AuthorizationResponse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let authorizer = Self {
            granted: Arc::new(AtomicBool::new(granted)),
            grant_on_request: Arc::new(AtomicBool::new(false)),
            requests: Arc::default(),
            responses: tx,
        };
        (authorizer, rx)
    }

    pub fn grant_on_request(&self) {
        self.grant_on_request.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<u32> {
        self.requests.lock().unwrap().clone()
    }
}

impl Authorizer for FakeAuthorizer {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request(&self, request_id: u32) {
        self.requests.lock().unwrap().push(request_id);
        let granted = self.grant_on_request.load(Ordering::SeqCst);
        self.granted.store(granted, Ordering::SeqCst);
        let _ = self.responses.send(AuthorizationResponse {
            request_id,
            outcomes: vec![(Capability::NetAdmin, granted)],
        });
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
