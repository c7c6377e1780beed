//! # Ghostline
//!
//! Stealth browsing session engine.
//!
//! Ghostline drives the lifecycle of a "ghost" browsing session: it installs a
//! synthetic device identity on activation, keeps a continuously recomputed
//! risk score while the session is live, records human-paced actions, and
//! purges everything on burn.
//!
//! ## Features
//!
//! - **Session State Machine** - Idle / Active / Burned with epoch-guarded async activation
//! - **Risk Telemetry** - periodic risk recompute and simulated probe interception
//! - **Human Pacing** - randomized reaction delays plus optional input jitter
//! - **Bounded Logs** - newest-first event and action logs, capped at 50 entries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ghostline::{ActionIntent, Session, SyntheticIdentity};
//!
//! #[tokio::main]
//! async fn main() -> ghostline::Result<()> {
//!     let session = Session::new(SyntheticIdentity::new());
//!
//!     // Fetch an identity and start the risk engine
//!     session.activate(false).await?;
//!
//!     // Human-paced interaction
//!     session.perform_action(ActionIntent::click(420.0, 310.0)).await;
//!
//!     println!("risk: {}", session.risk_score());
//!
//!     // Purge identity, history and risk state
//!     session.burn();
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use ghostline::{Session, SessionConfig, StealthConfig, SyntheticIdentity};
//!
//! let stealth = StealthConfig {
//!     webrtc_masking: false,
//!     input_jitter: false,
//!     ..Default::default()
//! };
//!
//! let config = SessionConfig::default().with_stealth(stealth);
//! let session = Session::with_config(SyntheticIdentity::new(), config);
//! ```

use serde::{Deserialize, Serialize};

pub mod action;
pub mod error;
pub mod event;
pub mod identity;
pub mod log;
pub mod session;
pub mod stealth;
pub mod telemetry;

// Re-exports
pub use action::{ActionIntent, ActionKind, Coordinates, GhostAction};
pub use error::{Error, Result};
pub use event::{EventKind, SecurityEvent, Severity};
pub use identity::{IdentityCache, IdentityGenerator, SyntheticIdentity};
pub use log::{BoundedLog, LOG_CAPACITY};
pub use session::{Activation, Phase, Session, SessionConfig, SessionSnapshot};
pub use stealth::{Fingerprint, HumanSpeed};
pub use telemetry::Telemetry;

/// Anti-fingerprinting toggles for a session
///
/// Each toggle is read independently: the risk engine scores the disabled
/// mitigations, and the identity generator may shape the fingerprint from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StealthConfig {
    /// Poison canvas readback
    pub canvas_poisoning: bool,
    /// Add random jitter on top of the human reaction delay
    pub input_jitter: bool,
    /// Obfuscate network traffic patterns
    pub network_obfuscation: bool,
    /// Rotate identity automatically
    pub auto_rotate: bool,
    /// Mask WebRTC local addresses
    pub webrtc_masking: bool,
    /// Poison AudioContext sampling
    pub audio_poisoning: bool,
    /// Mask installed font enumeration
    pub font_masking: bool,
    /// Mirror the host display geometry
    pub auto_mirror: bool,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            canvas_poisoning: true,
            input_jitter: true,
            network_obfuscation: true,
            auto_rotate: false,
            webrtc_masking: true,
            audio_poisoning: true,
            font_masking: true,
            auto_mirror: true,
        }
    }
}

impl StealthConfig {
    /// Create a minimal config (every mitigation off)
    pub fn minimal() -> Self {
        Self {
            canvas_poisoning: false,
            input_jitter: false,
            network_obfuscation: false,
            auto_rotate: false,
            webrtc_masking: false,
            audio_poisoning: false,
            font_masking: false,
            auto_mirror: false,
        }
    }

    /// Create a config with every toggle on
    pub fn maximum() -> Self {
        Self {
            auto_rotate: true,
            ..Default::default()
        }
    }
}
