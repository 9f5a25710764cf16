//! Transient messages shown to the person running a scan.

use std::{fmt, path::PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    EnablingRadio,
    AuthorizationRequired,
    ScanningStarted,
    ScanInProgress,
    ScanFailed,
    PermissionDenied,
    NoNetworksFound,
    NetworksFound(usize),
    SaveFailed,
    FileCreated(PathBuf),
    Saved(PathBuf),
    AuthorizationGranted,
    AuthorizationDenied,
    ScanTimedOut,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::EnablingRadio => f.write_str("Enabling WiFi..."),
            Notice::AuthorizationRequired => {
                f.write_str("Scan permission required to scan WiFi networks.")
            }
            Notice::ScanningStarted => f.write_str("Scanning for WiFi networks..."),
            Notice::ScanInProgress => f.write_str("A scan is already in progress."),
            Notice::ScanFailed => f.write_str("Could not start WiFi scan."),
            Notice::PermissionDenied => f.write_str("Permission denied. Cannot scan WiFi networks."),
            Notice::NoNetworksFound => f.write_str("No WiFi networks found."),
            Notice::NetworksFound(n) => write!(f, "Found {n} networks."),
            Notice::SaveFailed => f.write_str("Failed to save scan results"),
            Notice::FileCreated(path) => write!(f, "File created: {}", path.display()),
            Notice::Saved(path) => write!(f, "Scan results saved to: {}", path.display()),
            Notice::AuthorizationGranted => f.write_str("Scan permission granted"),
            Notice::AuthorizationDenied => f.write_str("Scan permission denied"),
            Notice::ScanTimedOut => f.write_str("Timed out waiting for scan results."),
        }
    }
}

/// Receives notices. Delivery is fire-and-forget.
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

/// Prints notices to stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        println!("{notice}");
    }
}
