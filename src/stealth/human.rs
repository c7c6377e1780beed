//! Human-like action pacing
//!
//! Every dispatched action waits for a randomized human reaction delay before
//! it is committed. With input jitter enabled, an extra 0-99 ms is added on top
//! so action timing never settles into a recognizable rhythm.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::with_rng;
use crate::StealthConfig;

/// Exclusive upper bound of the input jitter term, in milliseconds
pub const JITTER_MAX_MS: u64 = 100;

/// Speed mode for human simulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumanSpeed {
    /// Fast mode - short reaction times
    Fast,
    /// Normal mode - balanced
    #[default]
    Normal,
    /// Slow mode - maximum realism
    Slow,
}

impl HumanSpeed {
    /// Base reaction window in milliseconds, `[min, max)`
    pub fn reaction_ms(&self) -> (u64, u64) {
        match self {
            HumanSpeed::Fast => (80, 200),
            HumanSpeed::Normal => (150, 600),
            HumanSpeed::Slow => (300, 900),
        }
    }
}

/// Draw a base human reaction delay in milliseconds
pub fn human_delay<R: Rng + ?Sized>(speed: HumanSpeed, rng: &mut R) -> u64 {
    let (min, max) = speed.reaction_ms();
    rng.gen_range(min..max)
}

/// Delay to apply before committing one action, in milliseconds
///
/// Stateless; the only inputs are the config, the speed and the RNG.
pub fn action_delay_ms<R: Rng + ?Sized>(
    config: &StealthConfig,
    speed: HumanSpeed,
    rng: &mut R,
) -> u64 {
    let delay = human_delay(speed, rng);
    if config.input_jitter {
        delay + rng.gen_range(0..JITTER_MAX_MS)
    } else {
        delay
    }
}

/// [`action_delay_ms`] using the thread-local RNG
pub fn action_delay(config: &StealthConfig, speed: HumanSpeed) -> Duration {
    Duration::from_millis(with_rng(|rng| action_delay_ms(config, speed, rng)))
}
