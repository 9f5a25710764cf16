use std::fmt;

use chrono::NaiveDateTime;
use mac_address::MacAddress;

/// Timestamp layout shared by every line of the scan log
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One network seen by the radio during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    // empty for hidden networks
    pub ssid: String,
    pub bssid: MacAddress,
    /// dBm
    pub signal_level: i32,
}

impl NetworkRecord {
    pub fn new(ssid: impl Into<String>, bssid: MacAddress, signal_level: i32) -> Self {
        Self {
            ssid: ssid.into(),
            bssid,
            signal_level,
        }
    }
}

/// Persisted form of a record, rendered without the trailing newline
pub struct ScanLogEntry<'a> {
    timestamp: &'a str,
    record: &'a NetworkRecord,
}

impl<'a> ScanLogEntry<'a> {
    pub fn new(timestamp: &'a str, record: &'a NetworkRecord) -> Self {
        Self { timestamp, record }
    }
}

impl fmt::Display for ScanLogEntry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, SSID: {}, BSSID: {}, Signal Level: {}",
            self.timestamp, self.record.ssid, self.record.bssid, self.record.signal_level
        )
    }
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}
