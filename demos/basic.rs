//! Basic usage example for ghostline
//!
//! Run with: cargo run --example basic

use std::time::Duration;

use ghostline::{
    ActionIntent, EventKind, Result, Session, SessionConfig, StealthConfig, SyntheticIdentity,
    Telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Faster ticks so the demo has something to show
    let config = SessionConfig::default()
        .with_tick_period(Duration::from_millis(500))
        .with_probe_probability(0.5);
    let generator = SyntheticIdentity::new().with_latency(Duration::from_millis(300));
    let session = Session::with_config(generator, config);

    // Print the live feed
    let mut feed = session.subscribe();
    tokio::spawn(async move {
        while let Ok(item) = feed.recv().await {
            match item {
                Telemetry::Phase(phase) => println!("[phase] {:?}", phase),
                Telemetry::Risk(score) => println!("[risk]  {}", score),
                Telemetry::Event(event) => {
                    println!("[event] {} ({:?}): {}", event.kind, event.severity, event.source)
                }
                Telemetry::Action(action) => {
                    println!("[act]   {:?} after {}ms", action.kind, action.delay_applied)
                }
            }
        }
    });

    println!("Activating session...");
    session.activate(false).await?;
    if let Some(identity) = session.identity() {
        println!("Identity: {} / {} / {}", identity.gpu, identity.resolution, identity.user_agent);
    }

    // Human-paced interactions
    session.perform_action(ActionIntent::click(420.0, 310.0)).await;
    session
        .perform_action(ActionIntent::type_into("#search"))
        .await;
    session.report_threat("Outbound Referer header removed", Some(EventKind::HeaderStripped));

    tokio::time::sleep(Duration::from_secs(2)).await;

    // Drop every mitigation and watch the risk climb
    println!("Disabling mitigations...");
    session.set_stealth_config(StealthConfig::minimal());
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("Burning session...");
    session.burn();
    tokio::time::sleep(Duration::from_millis(2500)).await;

    println!("{}", session.snapshot().to_json()?);
    Ok(())
}
