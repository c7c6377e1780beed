//! Identity generation
//!
//! A session asks an [`IdentityGenerator`] for a fresh fingerprint on every
//! activation. The generator may be remote and slow, and it may fail; the
//! session never retries on its own.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::stealth::{with_rng, Fingerprint};
use crate::StealthConfig;

/// Source of synthetic device identities
#[async_trait]
pub trait IdentityGenerator: Send + Sync {
    /// Produce a fingerprint for the given stealth config
    async fn generate(&self, config: &StealthConfig) -> Result<Fingerprint>;
}

#[async_trait]
impl<G: IdentityGenerator + ?Sized> IdentityGenerator for Arc<G> {
    async fn generate(&self, config: &StealthConfig) -> Result<Fingerprint> {
        (**self).generate(config).await
    }
}

#[async_trait]
impl<G: IdentityGenerator + ?Sized> IdentityGenerator for Box<G> {
    async fn generate(&self, config: &StealthConfig) -> Result<Fingerprint> {
        (**self).generate(config).await
    }
}

/// Local generator drawing from built-in device presets
#[derive(Debug, Clone, Default)]
pub struct SyntheticIdentity {
    latency: Option<Duration>,
}

impl SyntheticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait this long before answering, like a remote service would
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl IdentityGenerator for SyntheticIdentity {
    async fn generate(&self, config: &StealthConfig) -> Result<Fingerprint> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(with_rng(|rng| Fingerprint::synthesize(config, rng)))
    }
}

/// Holds the most recently installed identity
///
/// Activations always generate a new identity; the cache only tracks what is
/// currently installed so a burn can guarantee nothing survives the purge.
#[derive(Debug, Clone, Default)]
pub struct IdentityCache {
    current: Option<Fingerprint>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a freshly installed identity, replacing any previous one
    pub fn store(&mut self, identity: Fingerprint) {
        self.current = Some(identity);
    }

    pub fn get(&self) -> Option<&Fingerprint> {
        self.current.as_ref()
    }

    /// Drop the cached identity unconditionally
    pub fn invalidate(&mut self) {
        if self.current.take().is_some() {
            tracing::debug!("Identity cache invalidated");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }
}
