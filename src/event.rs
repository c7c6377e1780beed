//! Security events
//!
//! Synthetic, timestamped log entries describing simulated detections and
//! protective actions. Events are immutable once created.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::stealth::{with_rng, Fingerprint, Probe};

/// Length of a generated event id
pub const EVENT_ID_LEN: usize = 9;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Kind of security event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    #[default]
    FingerprintAttempt,
    TrackerDetected,
    LeakPrevented,
    StealthEngaged,
    ProbeIntercepted,
    HeaderStripped,
}

impl EventKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::FingerprintAttempt => "FINGERPRINT_ATTEMPT",
            EventKind::TrackerDetected => "TRACKER_DETECTED",
            EventKind::LeakPrevented => "LEAK_PREVENTED",
            EventKind::StealthEngaged => "STEALTH_ENGAGED",
            EventKind::ProbeIntercepted => "PROBE_INTERCEPTED",
            EventKind::HeaderStripped => "HEADER_STRIPPED",
        }
    }

    /// Severity assigned to an externally reported event of this kind
    pub fn reported_severity(&self) -> Severity {
        match self {
            EventKind::HeaderStripped => Severity::Low,
            _ => Severity::High,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single security log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Human-readable description
    pub source: String,
    pub severity: Severity,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl SecurityEvent {
    /// Create an event stamped with a fresh id and the current time
    pub fn new(kind: EventKind, source: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: event_id(),
            kind,
            source: source.into(),
            severity,
            timestamp: now_millis(),
        }
    }

    /// An externally reported threat; severity is derived from the kind
    pub fn reported(description: impl Into<String>, kind: Option<EventKind>) -> Self {
        let kind = kind.unwrap_or_default();
        Self::new(kind, description, kind.reported_severity())
    }

    /// Identity installed on activation
    pub fn stealth_engaged(identity: &Fingerprint) -> Self {
        Self::new(
            EventKind::StealthEngaged,
            format!(
                "Identity rotation complete. Active node: {}",
                identity.gpu_token()
            ),
            Severity::Low,
        )
    }

    /// Simulated probe interception
    pub fn probe_intercepted(probe: Probe) -> Self {
        Self::new(EventKind::ProbeIntercepted, probe.source(), Severity::Medium)
    }

    /// The single entry left behind by a burn
    pub fn burn() -> Self {
        Self::new(
            EventKind::LeakPrevented,
            "Full System Burn: Identity purged.",
            Severity::Critical,
        )
    }
}

/// Generate a random base-36 event id
pub fn event_id() -> String {
    with_rng(|rng| {
        (0..EVENT_ID_LEN)
            .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
            .collect()
    })
}

/// Milliseconds since the Unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
