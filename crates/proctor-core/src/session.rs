//! Proctoring session context.
//!
//! Owns one monitor, one lockdown controller and one escalation policy, wired so every
//! recorded violation feeds the policy. Nothing here is global: two sessions built in
//! the same process share no state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::assessment::{AssessmentUrl, SessionId};
use crate::clock::Clock;
use crate::config::ProctorConfig;
use crate::error::ProctorResult;
use crate::escalation::{
    Acknowledgement, EscalationEvent, EscalationPolicy, EscalationSnapshot, ForcedSubmission,
    WarningView,
};
use crate::fullscreen::FullscreenCapability;
use crate::host::{BrowserHost, InputSurface};
use crate::lockdown::{LockdownController, LockdownState};
use crate::monitor::{MonitorState, SessionMonitor};
use crate::scheduler::Scheduler;
use crate::simulated::SimulatedHost;
use crate::store::{SessionRecord, SessionStore};
use crate::subscribers::Subscription;
use crate::violation::Violation;

/// Host-side collaborators a session is built from.
pub struct SessionParts {
    pub host: Arc<dyn BrowserHost>,
    pub input: Arc<dyn InputSurface>,
    pub fullscreen: Arc<dyn FullscreenCapability>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn Scheduler>,
}

impl SessionParts {
    pub fn simulated(host: Arc<SimulatedHost>, clock: Arc<dyn Clock>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            fullscreen: host.fullscreen_handle(),
            input: host.clone(),
            host,
            clock,
            scheduler,
        }
    }
}

/// Outcome of [`ProctorSession::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BeginOutcome {
    pub lockdown: bool,
    pub monitoring: bool,
    pub fullscreen: bool,
}

impl BeginOutcome {
    /// Lockdown and monitoring both running. Fullscreen is best-effort and not required.
    pub fn is_ready(&self) -> bool {
        self.lockdown && self.monitoring
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub session_id: SessionId,
    pub monitor: MonitorState,
    pub lockdown: LockdownState,
    pub escalation: EscalationSnapshot,
}

pub struct ProctorSession {
    id: SessionId,
    assessment_url: AssessmentUrl,
    created_at: DateTime<Utc>,
    ended_at: Mutex<Option<DateTime<Utc>>>,
    monitor: Arc<SessionMonitor>,
    lockdown: LockdownController,
    escalation: Arc<EscalationPolicy>,
    wiring: Mutex<Vec<Subscription>>,
    disposed: AtomicBool,
}

impl ProctorSession {
    /// Build a fresh, inactive session with a generated id.
    pub fn create(config: &ProctorConfig, assessment_url: AssessmentUrl, parts: SessionParts) -> Self {
        Self::create_with_id(SessionId::generate(), config, assessment_url, parts)
    }

    pub fn create_with_id(
        id: SessionId,
        config: &ProctorConfig,
        assessment_url: AssessmentUrl,
        parts: SessionParts,
    ) -> Self {
        let monitor = Arc::new(SessionMonitor::new(
            parts.host,
            Arc::clone(&parts.clock),
            config.monitor.clone(),
        ));
        let lockdown = LockdownController::new(
            parts.input,
            parts.fullscreen,
            parts.clock,
            config.lockdown.clone(),
        );
        let escalation = Arc::new(EscalationPolicy::new(config.escalation.clone(), parts.scheduler));

        let policy = Arc::clone(&escalation);
        let recorded = monitor.on_violation(move |violation| {
            policy.record_violation(violation);
        });
        let policy = Arc::clone(&escalation);
        let cleared = monitor.on_clear(move |_| {
            policy.sync_count(0);
        });

        info!(session = %id, url = %assessment_url, "[SESSION] Session created");
        Self {
            id,
            assessment_url,
            created_at: Utc::now(),
            ended_at: Mutex::new(None),
            monitor,
            lockdown,
            escalation,
            wiring: Mutex::new(vec![recorded, cleared]),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn assessment_url(&self) -> &AssessmentUrl {
        &self.assessment_url
    }

    pub fn monitor(&self) -> &SessionMonitor {
        &self.monitor
    }

    pub fn lockdown(&self) -> &LockdownController {
        &self.lockdown
    }

    pub fn escalation(&self) -> &EscalationPolicy {
        &self.escalation
    }

    /// Engage lockdown (with fullscreen) and start monitoring.
    pub fn begin(&self) -> BeginOutcome {
        let lockdown = self.lockdown.enable();
        let monitoring = self.monitor.start();
        let outcome = BeginOutcome {
            lockdown,
            monitoring,
            fullscreen: self.lockdown.is_fullscreen(),
        };
        info!(
            session = %self.id,
            lockdown,
            monitoring,
            fullscreen = outcome.fullscreen,
            "[SESSION] Session begun"
        );
        outcome
    }

    /// Stop observing signals only. A running countdown keeps going.
    pub fn pause_monitoring(&self) -> bool {
        self.monitor.stop()
    }

    pub fn resume_monitoring(&self) -> bool {
        self.monitor.start()
    }

    /// Finish the attempt: stop monitoring, release lockdown, cancel any countdown.
    pub fn end(&self) {
        self.monitor.stop();
        self.lockdown.disable();
        if self.escalation.cancel_countdown() {
            debug!(session = %self.id, "[SESSION] Countdown cancelled at session end");
        }
        let mut ended = self.ended_at.lock().unwrap_or_else(|p| p.into_inner());
        if ended.is_none() {
            *ended = Some(Utc::now());
            info!(session = %self.id, violations = self.monitor.count(None), "[SESSION] Session ended");
        }
    }

    /// Tear down the session and detach the monitor from the policy. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.end();
        let wiring = std::mem::take(&mut *self.wiring.lock().unwrap_or_else(|p| p.into_inner()));
        for mut subscription in wiring {
            subscription.unsubscribe();
        }
        debug!(session = %self.id, "[SESSION] Session disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Empty the violation history. Severity follows through the clear wiring, so clearing
    /// via [`SessionMonitor::clear`] directly has the same effect.
    pub fn clear_violations(&self) {
        self.monitor.clear();
    }

    pub fn acknowledge(&self) -> Acknowledgement {
        self.escalation.acknowledge()
    }

    pub fn on_violation<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Violation) + Send + Sync + 'static,
    {
        self.monitor.on_violation(callback)
    }

    pub fn on_escalation<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EscalationEvent) + Send + Sync + 'static,
    {
        self.escalation.on_event(callback)
    }

    pub fn on_forced_submit<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ForcedSubmission) + Send + Sync + 'static,
    {
        self.escalation.on_forced_submit(callback)
    }

    pub fn warning_view(&self) -> WarningView {
        WarningView::render(&self.escalation.snapshot())
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            session_id: self.id.clone(),
            monitor: self.monitor.get_state(),
            lockdown: self.lockdown.get_state(),
            escalation: self.escalation.snapshot(),
        }
    }

    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            session_id: self.id.clone(),
            assessment_url: self.assessment_url.clone(),
            created_at: self.created_at,
            violations: self.monitor.violations(),
            lockdown_log: self.lockdown.log(),
            submitted: self.escalation.is_submitted(),
            ended_at: *self.ended_at.lock().unwrap_or_else(|p| p.into_inner()),
        }
    }

    pub fn persist(&self, store: &dyn SessionStore) -> ProctorResult<()> {
        store.save(&self.id, &self.record())
    }
}

impl Drop for ProctorSession {
    fn drop(&mut self) {
        self.dispose();
    }
}
