//! Stealth Layer
//!
//! The simulation components that sit under a session:
//! - Synthetic fingerprint generation
//! - Human-like action pacing
//! - Risk scoring and probe simulation

use std::cell::RefCell;

pub mod fingerprint;
pub mod human;
pub mod risk;

pub use fingerprint::{random_user_agent, DevicePreset, Fingerprint, Platform};
pub use human::{action_delay, HumanSpeed};
pub use risk::{base_risk, Probe};

// Thread-local RNG
thread_local! {
    static RNG: RefCell<rand::rngs::ThreadRng> = RefCell::new(rand::thread_rng());
}

/// Run `f` with this thread's RNG
pub(crate) fn with_rng<T>(f: impl FnOnce(&mut rand::rngs::ThreadRng) -> T) -> T {
    RNG.with(|rng| f(&mut *rng.borrow_mut()))
}
