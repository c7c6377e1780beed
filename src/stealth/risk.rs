//! Risk scoring and probe simulation
//!
//! A tick recomputes the score from scratch: a base derived from whichever
//! mitigations are switched off, plus a small integer noise term, clamped to
//! `[1, 99]`. Independently, a tick may simulate an intercepted fingerprinting
//! probe. Probes are cosmetic and are drawn regardless of which mitigations
//! are enabled.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::StealthConfig;

/// Lowest score an active session can report
pub const RISK_FLOOR: i32 = 1;

/// Highest score an active session can report
pub const RISK_CEILING: i32 = 99;

/// Risk of a session with every scored mitigation on
pub const BASE_RISK: i32 = 10;

/// Noise window, `[min, max)`
const FLUCTUATION: (i32, i32) = (-4, 4);

/// Risk before noise for a given config
pub fn base_risk(config: &StealthConfig) -> i32 {
    let mut risk = BASE_RISK;
    if !config.canvas_poisoning {
        risk += 20;
    }
    if !config.webrtc_masking {
        risk += 30;
    }
    if !config.font_masking {
        risk += 15;
    }
    if !config.audio_poisoning {
        risk += 10;
    }
    risk
}

/// Draw the noise term, uniform over `[-4, 3]`
pub fn fluctuation<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    rng.gen_range(FLUCTUATION.0..FLUCTUATION.1)
}

/// Compute a fresh risk score
pub fn score<R: Rng + ?Sized>(config: &StealthConfig, rng: &mut R) -> u8 {
    (base_risk(config) + fluctuation(rng)).clamp(RISK_FLOOR, RISK_CEILING) as u8
}

/// Fingerprinting probes the engine pretends to intercept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Probe {
    Canvas,
    WebRtc,
    Audio,
    Font,
}

impl Probe {
    pub const ALL: [Probe; 4] = [Probe::Canvas, Probe::WebRtc, Probe::Audio, Probe::Font];

    /// Human-readable probe name
    pub fn label(&self) -> &'static str {
        match self {
            Probe::Canvas => "Canvas Fingerprinting",
            Probe::WebRtc => "WebRTC IP Leak",
            Probe::Audio => "AudioContext Sampling",
            Probe::Font => "Font Enumeration",
        }
    }

    /// Event source text for an interception of this probe
    pub fn source(&self) -> String {
        format!("Shielded access to: {}", self.label())
    }

    /// Pick a probe uniformly at random
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Result of one risk engine tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub score: u8,
    pub probe: Option<Probe>,
}

/// Run the two independent halves of a tick
pub fn tick<R: Rng + ?Sized>(config: &StealthConfig, probe_probability: f64, rng: &mut R) -> Tick {
    let score = score(config, rng);
    let probe = if rng.gen_bool(probe_probability.clamp(0.0, 1.0)) {
        Some(Probe::random(rng))
    } else {
        None
    };
    Tick { score, probe }
}
