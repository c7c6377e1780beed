//! Session State Machine
//!
//! A session moves between three phases:
//!
//! ```text
//!   Idle ──activate──▶ Active ──burn──▶ Burned ──(cooldown)──▶ Idle
//!                        ▲                 │
//!                        └────activate─────┘
//! ```
//!
//! All state lives behind one mutex, the single point through which every
//! mutation is serialized. Two timers hang off the phase: the risk engine
//! ticks while `Active`, and the cooldown fires once after a burn. Each is
//! owned by the state as an abort-on-drop handle and tagged with the epoch it
//! was started under, so a timer that loses the race with a transition finds
//! a stale epoch and leaves the state alone.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::action::{ActionIntent, GhostAction};
use crate::error::Result;
use crate::event::{EventKind, SecurityEvent};
use crate::identity::{IdentityCache, IdentityGenerator};
use crate::log::BoundedLog;
use crate::stealth::{action_delay, risk, with_rng, Fingerprint, HumanSpeed};
use crate::telemetry::{Telemetry, TelemetryFeed};
use crate::StealthConfig;

/// Risk engine period
pub const TICK_PERIOD: Duration = Duration::from_millis(4000);

/// Time a burned session stays burned before returning to idle
pub const BURN_COOLDOWN: Duration = Duration::from_millis(2000);

/// Chance that a tick simulates an intercepted probe
pub const PROBE_PROBABILITY: f64 = 0.2;

/// Session phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Active,
    Burned,
}

/// Outcome of an activation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// A new identity was installed and the session is active
    Engaged,
    /// The session was already active; nothing changed
    AlreadyActive,
    /// Another activation is still waiting on the generator; nothing changed
    InFlight,
    /// The session was burned while generating; the identity was discarded
    Superseded,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Initial stealth toggles
    pub stealth: StealthConfig,
    /// Risk engine period
    pub tick_period: Duration,
    /// Burned to idle delay
    pub burn_cooldown: Duration,
    /// Per-tick probe interception probability
    pub probe_probability: f64,
    /// Human reaction window used for action pacing
    pub speed: HumanSpeed,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stealth: StealthConfig::default(),
            tick_period: TICK_PERIOD,
            burn_cooldown: BURN_COOLDOWN,
            probe_probability: PROBE_PROBABILITY,
            speed: HumanSpeed::Normal,
        }
    }
}

impl SessionConfig {
    pub fn with_stealth(mut self, stealth: StealthConfig) -> Self {
        self.stealth = stealth;
        self
    }

    /// At least 1 ms
    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period.max(Duration::from_millis(1));
        self
    }

    pub fn with_burn_cooldown(mut self, cooldown: Duration) -> Self {
        self.burn_cooldown = cooldown;
        self
    }

    /// Clamped to `[0, 1]`
    pub fn with_probe_probability(mut self, probability: f64) -> Self {
        self.probe_probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_speed(mut self, speed: HumanSpeed) -> Self {
        self.speed = speed;
        self
    }
}

/// Point-in-time copy of the session for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub initializing: bool,
    pub identity: Option<Fingerprint>,
    pub risk_score: u8,
    pub stealth_config: StealthConfig,
    /// Newest first
    pub events: Vec<SecurityEvent>,
    /// Newest first
    pub actions: Vec<GhostAction>,
}

impl SessionSnapshot {
    /// Whether the purge screen should be shown
    pub fn is_burned(&self) -> bool {
        self.phase == Phase::Burned
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Aborts the wrapped task when dropped
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct SessionState {
    phase: Phase,
    /// Bumped on every installed identity and every burn
    epoch: u64,
    /// Last activation ticket handed out
    tickets: u64,
    /// Ticket of the activation waiting on the generator
    pending: Option<u64>,
    initializing: bool,
    /// Bumped on every burn
    purges: u64,
    identity: Option<Fingerprint>,
    cache: IdentityCache,
    risk_score: u8,
    stealth: StealthConfig,
    events: BoundedLog<SecurityEvent>,
    actions: BoundedLog<GhostAction>,
    risk_task: Option<TaskGuard>,
    cooldown_task: Option<TaskGuard>,
    /// Runtime the timers are spawned on, captured when activation starts
    runtime: Option<Handle>,
}

impl SessionState {
    fn new(stealth: StealthConfig) -> Self {
        Self {
            phase: Phase::Idle,
            epoch: 0,
            tickets: 0,
            pending: None,
            initializing: false,
            purges: 0,
            identity: None,
            cache: IdentityCache::new(),
            risk_score: 0,
            stealth,
            events: BoundedLog::new(),
            actions: BoundedLog::new(),
            risk_task: None,
            cooldown_task: None,
            runtime: None,
        }
    }
}

struct Inner {
    state: Mutex<SessionState>,
    generator: Box<dyn IdentityGenerator>,
    feed: TelemetryFeed,
    tick_period: Duration,
    burn_cooldown: Duration,
    probe_probability: f64,
    speed: HumanSpeed,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // Every critical section leaves the state consistent, so a panic
        // elsewhere doesn't invalidate it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_event(&self, state: &mut SessionState, event: SecurityEvent) {
        state.events.push(event.clone());
        self.feed.publish(Telemetry::Event(event));
    }

    /// One risk engine tick. Returns false once the engine should stop.
    fn tick(&self, epoch: u64) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch || state.phase != Phase::Active {
            return false;
        }
        debug_assert!(state.identity.is_some(), "active session without identity");

        let outcome = with_rng(|rng| risk::tick(&state.stealth, self.probe_probability, rng));
        state.risk_score = outcome.score;
        self.feed.publish(Telemetry::Risk(outcome.score));
        tracing::debug!("Risk recomputed: {}", outcome.score);

        if let Some(probe) = outcome.probe {
            tracing::debug!("Simulated probe intercepted: {}", probe.label());
            self.record_event(&mut state, SecurityEvent::probe_intercepted(probe));
        }
        true
    }

    /// Cooldown expiry: Burned -> Idle, touching nothing else
    fn end_cooldown(&self, epoch: u64) {
        let mut state = self.lock();
        if state.epoch != epoch || state.phase != Phase::Burned {
            return;
        }
        state.phase = Phase::Idle;
        self.feed.publish(Telemetry::Phase(Phase::Idle));
        tracing::debug!("Burn cooldown elapsed; session idle");
    }
}

fn spawn_risk_engine(runtime: &Handle, inner: &Arc<Inner>, epoch: u64) -> TaskGuard {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let period = inner.tick_period;

    TaskGuard(runtime.spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else { break };
            if !inner.tick(epoch) {
                break;
            }
        }
        tracing::trace!("Risk engine stopped (epoch {})", epoch);
    }))
}

fn spawn_cooldown(runtime: &Handle, inner: &Arc<Inner>, epoch: u64) -> TaskGuard {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let cooldown = inner.burn_cooldown;

    TaskGuard(runtime.spawn(async move {
        tokio::time::sleep(cooldown).await;
        if let Some(inner) = weak.upgrade() {
            inner.end_cooldown(epoch);
        }
    }))
}

/// Clears the pending marker if an activation future is dropped mid-flight
struct PendingActivation<'a> {
    inner: &'a Inner,
    ticket: u64,
    armed: bool,
}

impl Drop for PendingActivation<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.inner.lock();
        if state.pending == Some(self.ticket) {
            state.pending = None;
            state.initializing = false;
            tracing::debug!("Activation cancelled (ticket {})", self.ticket);
        }
    }
}

/// A stealth browsing session
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Create an idle session with the default config
    pub fn new(generator: impl IdentityGenerator + 'static) -> Self {
        Self::with_config(generator, SessionConfig::default())
    }

    /// Create an idle session with a custom config
    pub fn with_config(generator: impl IdentityGenerator + 'static, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::new(config.stealth)),
                generator: Box::new(generator),
                feed: TelemetryFeed::new(),
                tick_period: config.tick_period,
                burn_cooldown: config.burn_cooldown,
                probe_probability: config.probe_probability,
                speed: config.speed,
            }),
        }
    }

    /// Fetch a fresh identity and go active
    ///
    /// Only one activation can be outstanding at a time. With `silent` set, no
    /// initializing indicator is raised. Must be called inside a Tokio runtime;
    /// the risk engine and burn cooldown are spawned on it.
    pub async fn activate(&self, silent: bool) -> Result<Activation> {
        let runtime = Handle::current();
        let (ticket, config) = {
            let mut state = self.inner.lock();
            if state.phase == Phase::Active {
                return Ok(Activation::AlreadyActive);
            }
            if state.pending.is_some() {
                return Ok(Activation::InFlight);
            }
            state.tickets += 1;
            state.pending = Some(state.tickets);
            state.initializing = !silent;
            state.runtime = Some(runtime);
            (state.tickets, state.stealth)
        };
        tracing::debug!("Requesting identity (ticket {}, silent={})", ticket, silent);

        let mut pending = PendingActivation {
            inner: &self.inner,
            ticket,
            armed: true,
        };
        let result = self.inner.generator.generate(&config).await;
        pending.armed = false;

        self.install(ticket, result)
    }

    fn install(&self, ticket: u64, result: Result<Fingerprint>) -> Result<Activation> {
        let mut state = self.inner.lock();
        if state.pending != Some(ticket) {
            tracing::warn!(
                "Discarding identity from superseded activation (ticket {})",
                ticket
            );
            return Ok(Activation::Superseded);
        }
        state.pending = None;
        state.initializing = false;

        let identity = match result {
            Ok(identity) => identity,
            Err(e) => {
                tracing::error!("Session activation failed: {}", e);
                return Err(e);
            }
        };

        let runtime = state.runtime.clone().unwrap_or_else(Handle::current);
        state.epoch += 1;
        let epoch = state.epoch;
        state.cooldown_task = None;
        state.cache.store(identity.clone());
        state.identity = Some(identity.clone());
        state.phase = Phase::Active;

        // Score once up front so an active session never reports a stale value
        let stealth = state.stealth;
        state.risk_score = with_rng(|rng| risk::score(&stealth, rng));

        self.inner.feed.publish(Telemetry::Phase(Phase::Active));
        self.inner.feed.publish(Telemetry::Risk(state.risk_score));
        self.inner
            .record_event(&mut state, SecurityEvent::stealth_engaged(&identity));

        state.risk_task = Some(spawn_risk_engine(&runtime, &self.inner, epoch));

        tracing::info!(
            "Session active as {} ({}, {})",
            identity.gpu,
            identity.platform.as_str(),
            identity.resolution
        );
        Ok(Activation::Engaged)
    }

    /// Purge the session
    ///
    /// Valid while active or while an activation is in flight; otherwise a
    /// no-op. Returns whether a burn happened.
    pub fn burn(&self) -> bool {
        let mut state = self.inner.lock();
        if state.phase != Phase::Active && state.pending.is_none() {
            tracing::debug!("Burn ignored while {:?}", state.phase);
            return false;
        }

        state.cache.invalidate();
        state.identity = None;
        state.actions.clear();
        state.risk_score = 0;
        let event = SecurityEvent::burn();
        state.events.reset(event.clone());
        state.risk_task = None;

        state.epoch += 1;
        state.purges += 1;
        state.pending = None;
        state.initializing = false;
        state.phase = Phase::Burned;

        let epoch = state.epoch;
        let runtime = state.runtime.clone().or_else(|| Handle::try_current().ok());
        state.cooldown_task = runtime.map(|runtime| spawn_cooldown(&runtime, &self.inner, epoch));
        if state.cooldown_task.is_none() {
            tracing::warn!("No runtime available; burn cooldown will not fire");
        }

        self.inner.feed.publish(Telemetry::Risk(0));
        self.inner.feed.publish(Telemetry::Event(event));
        self.inner.feed.publish(Telemetry::Phase(Phase::Burned));
        tracing::info!("Session burned; identity purged");
        true
    }

    /// Replace the stealth toggles; the next tick scores against them
    pub fn set_stealth_config(&self, config: StealthConfig) {
        self.inner.lock().stealth = config;
        tracing::debug!("Stealth config updated: {:?}", config);
    }

    /// Pace and record a user action
    ///
    /// Waits for a human-like delay before recording. Returns `None` if the
    /// session was burned while the action was waiting.
    pub async fn perform_action(&self, intent: ActionIntent) -> Option<GhostAction> {
        let (config, purges) = {
            let state = self.inner.lock();
            (state.stealth, state.purges)
        };

        let delay = action_delay(&config, self.inner.speed);
        tokio::time::sleep(delay).await;

        let action = intent.commit(delay.as_millis() as u64);
        let mut state = self.inner.lock();
        if state.purges != purges {
            tracing::debug!("Dropping {:?} action dispatched before burn", action.kind);
            return None;
        }
        state.actions.push(action.clone());
        self.inner.feed.publish(Telemetry::Action(action.clone()));
        tracing::trace!(
            "Recorded {:?} action after {}ms",
            action.kind,
            action.delay_applied
        );
        Some(action)
    }

    /// Log an externally detected threat
    ///
    /// The kind defaults to `FINGERPRINT_ATTEMPT`; severity always follows
    /// from the kind.
    pub fn report_threat(
        &self,
        description: impl Into<String>,
        kind: Option<EventKind>,
    ) -> SecurityEvent {
        let event = SecurityEvent::reported(description, kind);
        let mut state = self.inner.lock();
        self.inner.record_event(&mut state, event.clone());
        event
    }

    /// Subscribe to live telemetry
    pub fn subscribe(&self) -> broadcast::Receiver<Telemetry> {
        self.inner.feed.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.phase() == Phase::Active
    }

    /// Whether the post-burn cooldown is running
    pub fn is_burned(&self) -> bool {
        self.phase() == Phase::Burned
    }

    /// Whether a non-silent activation is waiting on the generator
    pub fn is_initializing(&self) -> bool {
        self.inner.lock().initializing
    }

    pub fn identity(&self) -> Option<Fingerprint> {
        self.inner.lock().identity.clone()
    }

    /// Identity held by the cache; cleared by every burn
    pub fn cached_identity(&self) -> Option<Fingerprint> {
        self.inner.lock().cache.get().cloned()
    }

    pub fn risk_score(&self) -> u8 {
        self.inner.lock().risk_score
    }

    pub fn stealth_config(&self) -> StealthConfig {
        self.inner.lock().stealth
    }

    /// Security events, newest first
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.inner.lock().events.to_vec()
    }

    /// Recorded actions, newest first
    pub fn actions(&self) -> Vec<GhostAction> {
        self.inner.lock().actions.to_vec()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock();
        SessionSnapshot {
            phase: state.phase,
            initializing: state.initializing,
            identity: state.identity.clone(),
            risk_score: state.risk_score,
            stealth_config: state.stealth,
            events: state.events.to_vec(),
            actions: state.actions.to_vec(),
        }
    }
}
