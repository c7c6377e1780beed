//! Integration tests for ghostline
//!
//! Timers run on Tokio's paused clock, so ticks, pacing delays and the burn
//! cooldown elapse instantly and deterministically.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ghostline::session::{BURN_COOLDOWN, TICK_PERIOD};
use ghostline::{
    Activation, ActionIntent, Error, EventKind, Fingerprint, IdentityGenerator, Phase, Session,
    SessionConfig, Severity, StealthConfig, Telemetry, LOG_CAPACITY,
};
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Generator double with a fixed latency and a failure switch
struct Scripted {
    delay: Duration,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        let generator = Self::new(0);
        generator.set_failing(true);
        generator
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityGenerator for Scripted {
    async fn generate(&self, _config: &StealthConfig) -> ghostline::Result<Fingerprint> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::identity("generator offline"));
        }
        let mut identity = Fingerprint::random();
        identity.gpu = "NVIDIA GeForce RTX 3060".to_string();
        Ok(identity)
    }
}

fn count(session: &Session, kind: EventKind) -> usize {
    session.events().iter().filter(|e| e.kind == kind).count()
}

#[tokio::test(start_paused = true)]
async fn test_activate_installs_identity() {
    init_tracing();
    let generator = Scripted::new(0);
    let session = Session::new(generator.clone());

    let outcome = assert_ok!(session.activate(false).await);
    assert_eq!(outcome, Activation::Engaged);
    assert_eq!(session.phase(), Phase::Active);
    assert!(session.identity().is_some());
    assert_eq!(session.cached_identity(), session.identity());
    assert!(!session.is_initializing());

    let events = session.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::StealthEngaged);
    assert_eq!(events[0].severity, Severity::Low);
    assert!(events[0].source.ends_with("Active node: NVIDIA"));

    // Default config masks everything that is scored
    assert!((6..=13).contains(&session.risk_score()));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_activate_while_active_is_noop() {
    let generator = Scripted::new(0);
    let session = Session::new(generator.clone());

    assert_ok!(session.activate(false).await);
    let identity = session.identity();

    assert_eq!(
        assert_ok!(session.activate(true).await),
        Activation::AlreadyActive
    );
    assert_eq!(session.identity(), identity);
    assert_eq!(count(&session, EventKind::StealthEngaged), 1);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_activations_engage_once() {
    let generator = Scripted::new(500);
    let session = Session::new(generator.clone());

    let (first, second) = tokio::join!(session.activate(false), session.activate(true));
    let mut outcomes = vec![assert_ok!(first), assert_ok!(second)];
    outcomes.sort_by_key(|o| *o == Activation::Engaged);

    assert_eq!(outcomes, vec![Activation::InFlight, Activation::Engaged]);
    assert_eq!(generator.calls(), 1);
    assert_eq!(count(&session, EventKind::StealthEngaged), 1);
    assert_eq!(session.phase(), Phase::Active);
}

#[tokio::test(start_paused = true)]
async fn test_initializing_flag() {
    let session = Session::new(Scripted::new(300));

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.activate(false).await }
    });
    sleep(Duration::from_millis(10)).await;
    assert!(session.is_initializing());
    assert_eq!(session.phase(), Phase::Idle);

    assert_eq!(assert_ok!(task.await.unwrap()), Activation::Engaged);
    assert!(!session.is_initializing());
}

#[tokio::test(start_paused = true)]
async fn test_silent_activation_hides_initializing() {
    let session = Session::new(Scripted::new(300));

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.activate(true).await }
    });
    sleep(Duration::from_millis(10)).await;
    assert!(!session.is_initializing());

    assert_eq!(assert_ok!(task.await.unwrap()), Activation::Engaged);
    assert!(session.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_failed_activation_changes_nothing() {
    init_tracing();
    let session = Session::new(Scripted::failing());

    let err = assert_err!(session.activate(false).await);
    assert!(err.is_identity_failure());
    assert_eq!(session.phase(), Phase::Idle);
    assert!(session.identity().is_none());
    assert!(session.events().is_empty());
    assert!(!session.is_initializing());

    // Failure releases the activation slot
    assert_err!(session.activate(false).await);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_activation_releases_slot() {
    let generator = Scripted::new(1_000);
    let session = Session::new(generator.clone());

    let timed_out = tokio::time::timeout(Duration::from_millis(10), session.activate(false)).await;
    assert!(timed_out.is_err());
    assert!(!session.is_initializing());

    assert_eq!(
        assert_ok!(session.activate(false).await),
        Activation::Engaged
    );
    assert_eq!(generator.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_risk_stays_in_bounds_across_ticks() {
    let config = SessionConfig::default().with_stealth(StealthConfig::minimal());
    let session = Session::with_config(Scripted::new(0), config);
    assert_ok!(session.activate(false).await);

    for _ in 0..50 {
        sleep(TICK_PERIOD).await;
        let score = session.risk_score();
        assert!((81..=88).contains(&score), "score {score}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_config_change_applies_on_next_tick() {
    let session = Session::new(Scripted::new(0));
    assert_ok!(session.activate(false).await);
    assert!((6..=13).contains(&session.risk_score()));

    session.set_stealth_config(StealthConfig::minimal());
    sleep(TICK_PERIOD + Duration::from_millis(1)).await;
    assert!((81..=88).contains(&session.risk_score()));
}

#[tokio::test(start_paused = true)]
async fn test_ticks_simulate_probes() {
    let config = SessionConfig::default().with_probe_probability(1.0);
    let session = Session::with_config(Scripted::new(0), config);
    assert_ok!(session.activate(false).await);

    // No tick before a full period has passed
    sleep(TICK_PERIOD - Duration::from_millis(1)).await;
    assert_eq!(count(&session, EventKind::ProbeIntercepted), 0);

    sleep(Duration::from_millis(2)).await;
    let events = session.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::ProbeIntercepted);
    assert_eq!(events[0].severity, Severity::Medium);
    assert!(events[0].source.starts_with("Shielded access to: "));

    sleep(TICK_PERIOD * 3).await;
    assert_eq!(count(&session, EventKind::ProbeIntercepted), 4);
}

#[tokio::test(start_paused = true)]
async fn test_burn_purges_session() {
    init_tracing();
    let session = Session::new(Scripted::new(0));
    assert_ok!(session.activate(false).await);
    session.perform_action(ActionIntent::click(10.0, 20.0)).await;
    session.report_threat("Canvas readback", None);
    assert_eq!(session.actions().len(), 1);

    assert!(session.burn());

    assert_eq!(session.phase(), Phase::Burned);
    assert!(session.is_burned());
    assert_eq!(session.risk_score(), 0);
    assert!(session.identity().is_none());
    assert!(session.cached_identity().is_none());
    assert!(session.actions().is_empty());

    let events = session.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::LeakPrevented);
    assert_eq!(events[0].severity, Severity::Critical);
}

#[tokio::test(start_paused = true)]
async fn test_burn_cooldown_returns_to_idle() {
    let session = Session::new(Scripted::new(0));
    assert_ok!(session.activate(false).await);
    assert!(session.burn());

    sleep(BURN_COOLDOWN - Duration::from_millis(1)).await;
    assert!(session.is_burned());

    sleep(Duration::from_millis(2)).await;
    assert_eq!(session.phase(), Phase::Idle);

    // The cooldown only clears the burned flag
    let events = session.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::LeakPrevented);
    assert_eq!(session.risk_score(), 0);
    assert!(session.identity().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_no_ticks_after_burn() {
    let config = SessionConfig::default().with_probe_probability(1.0);
    let session = Session::with_config(Scripted::new(0), config);
    assert_ok!(session.activate(false).await);
    sleep(TICK_PERIOD + Duration::from_millis(1)).await;
    assert_eq!(count(&session, EventKind::ProbeIntercepted), 1);

    assert!(session.burn());
    sleep(TICK_PERIOD * 10).await;

    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.events().len(), 1);
    assert_eq!(session.risk_score(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_burn_is_noop() {
    let session = Session::new(Scripted::new(0));
    assert_ok!(session.activate(false).await);
    assert!(session.burn());
    let events = session.events();

    assert!(!session.burn());
    assert_eq!(session.events(), events);
    assert!(session.is_burned());
}

#[tokio::test(start_paused = true)]
async fn test_burn_preempts_inflight_activation() {
    let session = Session::new(Scripted::new(500));

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.activate(false).await }
    });
    sleep(Duration::from_millis(10)).await;

    assert!(session.burn());
    assert_eq!(session.phase(), Phase::Burned);
    assert!(!session.is_initializing());

    assert_eq!(assert_ok!(task.await.unwrap()), Activation::Superseded);
    assert!(session.identity().is_none());
    assert_eq!(count(&session, EventKind::StealthEngaged), 0);
    assert_eq!(session.events().len(), 1);

    sleep(BURN_COOLDOWN).await;
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(
        assert_ok!(session.activate(false).await),
        Activation::Engaged
    );
}

#[tokio::test(start_paused = true)]
async fn test_reactivation_during_cooldown() {
    let session = Session::new(Scripted::new(0));
    assert_ok!(session.activate(false).await);
    assert!(session.burn());

    sleep(Duration::from_millis(500)).await;
    assert_eq!(
        assert_ok!(session.activate(true).await),
        Activation::Engaged
    );

    // The stale cooldown must not knock the new session back to idle
    sleep(BURN_COOLDOWN * 2).await;
    assert_eq!(session.phase(), Phase::Active);

    let events = session.events();
    assert_eq!(events.last().map(|e| e.kind), Some(EventKind::LeakPrevented));
    assert_eq!(count(&session, EventKind::StealthEngaged), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_activation_during_cooldown_keeps_cooldown() {
    let generator = Scripted::new(0);
    let session = Session::new(generator.clone());
    assert_ok!(session.activate(false).await);
    assert!(session.burn());

    generator.set_failing(true);
    assert_err!(session.activate(false).await);
    assert!(session.is_burned());

    sleep(BURN_COOLDOWN + Duration::from_millis(1)).await;
    assert_eq!(session.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_action_delay_without_jitter() {
    let config = SessionConfig::default().with_stealth(StealthConfig {
        input_jitter: false,
        ..Default::default()
    });
    let session = Session::with_config(Scripted::new(0), config);

    for _ in 0..100 {
        let start = tokio::time::Instant::now();
        let action = session
            .perform_action(ActionIntent::new(ghostline::ActionKind::Click))
            .await
            .expect("recorded");
        assert!((150..600).contains(&action.delay_applied));
        assert!(start.elapsed() >= Duration::from_millis(action.delay_applied));
    }
}

#[tokio::test(start_paused = true)]
async fn test_action_delay_with_jitter() {
    let session = Session::new(Scripted::new(0));
    assert!(session.stealth_config().input_jitter);

    for _ in 0..100 {
        let action = session
            .perform_action(ActionIntent::scroll())
            .await
            .expect("recorded");
        assert!((150..699).contains(&action.delay_applied));
    }
}

#[tokio::test(start_paused = true)]
async fn test_action_log_is_bounded() {
    let session = Session::new(Scripted::new(0));

    for i in 0..60 {
        session
            .perform_action(ActionIntent::type_into(format!("#field-{i}")))
            .await;
    }

    let actions = session.actions();
    assert_eq!(actions.len(), LOG_CAPACITY);
    assert_eq!(actions[0].target.as_deref(), Some("#field-59"));
    assert_eq!(actions[LOG_CAPACITY - 1].target.as_deref(), Some("#field-10"));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_actions_record_in_resume_order() {
    let session = Session::new(Scripted::new(0));

    let (a, b) = tokio::join!(
        session.perform_action(ActionIntent::hover("#a")),
        session.perform_action(ActionIntent::hover("#b"))
    );
    assert!(a.is_some() && b.is_some());

    let actions = session.actions();
    assert_eq!(actions.len(), 2);
    assert!(actions[0].delay_applied >= actions[1].delay_applied);
}

#[tokio::test(start_paused = true)]
async fn test_action_spanning_burn_is_dropped() {
    let session = Session::new(Scripted::new(0));
    assert_ok!(session.activate(false).await);

    let task = tokio::spawn({
        let session = session.clone();
        async move { session.perform_action(ActionIntent::click(1.0, 1.0)).await }
    });
    sleep(Duration::from_millis(10)).await;
    assert!(session.burn());

    assert!(task.await.unwrap().is_none());
    assert!(session.actions().is_empty());
}

#[tokio::test]
async fn test_reported_threat_severity() {
    let session = Session::new(Scripted::new(0));

    let stripped = session.report_threat("x", Some(EventKind::HeaderStripped));
    assert_eq!(stripped.severity, Severity::Low);

    let attempt = session.report_threat("x", None);
    assert_eq!(attempt.kind, EventKind::FingerprintAttempt);
    assert_eq!(attempt.severity, Severity::High);

    let events = session.events();
    assert_eq!(events[0].id, attempt.id);
    assert_eq!(events[1].id, stripped.id);
}

#[tokio::test]
async fn test_event_log_is_bounded() {
    let session = Session::new(Scripted::new(0));

    let first = session.report_threat("threat 0", None);
    for i in 1..80 {
        session.report_threat(format!("threat {i}"), Some(EventKind::TrackerDetected));
    }

    let events = session.events();
    assert_eq!(events.len(), LOG_CAPACITY);
    assert_eq!(events[0].source, "threat 79");
    assert_eq!(events[LOG_CAPACITY - 1].source, "threat 30");
    assert!(events.iter().all(|e| e.id != first.id));
}

#[tokio::test(start_paused = true)]
async fn test_telemetry_feed() {
    let session = Session::new(Scripted::new(0));
    let mut feed = session.subscribe();

    assert_ok!(session.activate(false).await);
    assert_eq!(feed.recv().await.unwrap(), Telemetry::Phase(Phase::Active));
    assert!(matches!(feed.recv().await.unwrap(), Telemetry::Risk(6..=13)));
    match feed.recv().await.unwrap() {
        Telemetry::Event(event) => assert_eq!(event.kind, EventKind::StealthEngaged),
        other => panic!("unexpected telemetry: {other:?}"),
    }

    session.burn();
    assert_eq!(feed.recv().await.unwrap(), Telemetry::Risk(0));
    match feed.recv().await.unwrap() {
        Telemetry::Event(event) => assert_eq!(event.kind, EventKind::LeakPrevented),
        other => panic!("unexpected telemetry: {other:?}"),
    }
    assert_eq!(feed.recv().await.unwrap(), Telemetry::Phase(Phase::Burned));
    assert_eq!(feed.recv().await.unwrap(), Telemetry::Phase(Phase::Idle));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot() {
    let session = Session::new(Scripted::new(0));
    assert_ok!(session.activate(false).await);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.phase, Phase::Active);
    assert_eq!(snapshot.identity, session.identity());
    assert_eq!(snapshot.events.len(), 1);
    assert!(!snapshot.is_burned());

    let json = assert_ok!(snapshot.to_json());
    assert!(json.contains("STEALTH_ENGAGED"));
    assert!(json.contains("\"stealthConfig\""));

    session.burn();
    assert!(session.snapshot().is_burned());
}
