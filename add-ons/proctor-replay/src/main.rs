//! Proctor Replay
//!
//! Drives a live proctoring session on the tokio runtime from a scenario file, printing
//! every violation and escalation event as a JSON line, then persists the session record.
//!
//! Usage: `proctor-replay [scenario.toml]` (or `PROCTOR_SCENARIO`).

mod scenario;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use proctor_core::{
    AssessmentUrl, MonotonicClock, ProctorConfig, ProctorSession, SessionParts, SimulatedHost,
    SledSessionStore, TokioScheduler,
};
use scenario::{apply_state, implied_signal, input_event, Scenario, StepOp};
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SCENARIO: &str = "add-ons/proctor-replay/scenarios/three_strikes.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[proctor-replay] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let scenario_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PROCTOR_SCENARIO").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCENARIO));

    let config = ProctorConfig::load()?;
    let scenario = Scenario::load(&scenario_path)?;

    let host = Arc::new(SimulatedHost::new());
    let scheduler = Arc::new(TokioScheduler::new(tokio::runtime::Handle::current()));
    let session = ProctorSession::create(
        &config,
        AssessmentUrl::parse(&scenario.assessment_url)?,
        SessionParts::simulated(host.clone(), Arc::new(MonotonicClock::new()), scheduler),
    );

    session.on_violation(|violation| {
        if let Ok(line) = serde_json::to_string(violation) {
            println!("{}", line);
        }
    });
    session.on_escalation(|event| {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{}", line);
        }
    });
    let submitted = Arc::new(Notify::new());
    let notify = Arc::clone(&submitted);
    session.on_forced_submit(move |_| notify.notify_one());

    let outcome = session.begin();
    tracing::info!(
        session = %session.id(),
        scenario = %scenario_path.display(),
        steps = scenario.steps.len(),
        ready = outcome.is_ready(),
        "Replay started"
    );

    let replay = async {
        for step in &scenario.steps {
            tokio::time::sleep(Duration::from_millis(step.after_ms)).await;
            apply_state(&host, &step.op);
            if let Some(signal) = implied_signal(&step.op) {
                host.fire(signal, session.monitor());
            }
            if let Some(event) = input_event(&step.op) {
                let disposition = host.dispatch_input(&event, session.lockdown());
                tracing::debug!(?event, ?disposition, "Input replayed");
            }
            if matches!(step.op, StepOp::Acknowledge) {
                let ack = session.acknowledge();
                tracing::info!(?ack, "Warning acknowledged");
            }
        }
    };

    tokio::select! {
        _ = replay => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("CTRL-C received; ending replay");
        }
    }

    let escalation = &config.escalation;
    let linger = scenario.linger_ms.unwrap_or(
        (escalation.countdown_seconds as u64 + 1) * escalation.tick_millis,
    );
    if session.escalation().countdown_remaining().is_some() {
        tokio::select! {
            _ = submitted.notified() => {}
            _ = tokio::time::sleep(Duration::from_millis(linger)) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }

    session.end();
    println!("{}", serde_json::to_string(&session.state())?);

    let store = SledSessionStore::open(&config.storage_path)?;
    session.persist(&store)?;
    tracing::info!(
        session = %session.id(),
        violations = session.monitor().count(None),
        submitted = session.escalation().is_submitted(),
        storage_path = %config.storage_path,
        "Session record saved"
    );
    Ok(())
}
