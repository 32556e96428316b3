//! Escalation policy: warning severity and the forced-submission countdown.
//!
//! Severity is a pure function of `(violation_count, max_violations)`:
//!
//! | Count | Severity |
//! |-------|----------|
//! | 0 | `calm` |
//! | 1 ..= max-2 | `warning` |
//! | max-1 | `danger` |
//! | >= max | `critical` |
//!
//! A new violation that lands in `critical` while no countdown is running starts one.
//! The countdown decrements once per tick and fires the forced-submission handlers
//! exactly once when it reaches zero. [`EscalationPolicy::acknowledge`] cancels it for
//! the current episode; the violation count is never decremented. After a forced
//! submission no further countdowns start.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EscalationConfig;
use crate::scheduler::{Scheduler, TaskHandle, TickControl};
use crate::subscribers::{SubscriberRegistry, Subscription};
use crate::violation::Violation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Calm,
    Warning,
    Danger,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Calm => "calm",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity after `count` violations with a limit of `max_violations`.
pub fn severity_for(count: usize, max_violations: u32) -> Severity {
    let max = max_violations.max(1) as usize;
    if count == 0 {
        Severity::Calm
    } else if count >= max {
        Severity::Critical
    } else if count == max - 1 {
        Severity::Danger
    } else {
        Severity::Warning
    }
}

/// Change notifications for the warning UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EscalationEvent {
    SeverityChanged { from: Severity, to: Severity, count: usize },
    CountdownStarted { episode: u64, seconds: u32 },
    CountdownTick { episode: u64, remaining: u32 },
    CountdownCancelled { episode: u64, remaining: u32 },
    WarningDismissed,
    ForcedSubmission { episode: u64, count: usize },
}

/// Payload handed to forced-submission handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedSubmission {
    pub episode: u64,
    pub violation_count: usize,
}

/// Result of [`EscalationPolicy::acknowledge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgement {
    /// A running countdown was stopped; forced submission will not happen for this episode.
    CountdownCancelled { remaining: u32 },
    /// The warning dialog was closed.
    WarningDismissed,
    /// Nothing was showing.
    NoOp,
}

/// Read-only view of the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EscalationSnapshot {
    pub severity: Severity,
    pub violation_count: usize,
    pub max_violations: u32,
    pub countdown_remaining: Option<u32>,
    pub warning_visible: bool,
    pub submitted: bool,
    pub last_violation: Option<Violation>,
}

impl EscalationSnapshot {
    pub fn is_escalating(&self) -> bool {
        self.countdown_remaining.is_some()
    }
}

#[derive(Debug)]
struct Countdown {
    episode: u64,
    remaining: u32,
    handle: Option<TaskHandle>,
}

#[derive(Debug)]
struct State {
    count: usize,
    severity: Severity,
    warning_visible: bool,
    countdown: Option<Countdown>,
    episodes: u64,
    submitted: bool,
    last_violation: Option<Violation>,
}

struct Shared {
    config: EscalationConfig,
    state: Mutex<State>,
    events: SubscriberRegistry<EscalationEvent>,
    submit_handlers: SubscriberRegistry<ForcedSubmission>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn emit(&self, events: Vec<EscalationEvent>) {
        for event in &events {
            self.events.notify(event);
        }
    }

    fn tick(&self, episode: u64) -> TickControl {
        let mut state = self.state();
        let Some(countdown) = state.countdown.as_mut() else {
            return TickControl::Stop;
        };
        if countdown.episode != episode {
            return TickControl::Stop;
        }
        countdown.remaining = countdown.remaining.saturating_sub(1);
        let remaining = countdown.remaining;

        if remaining > 0 {
            drop(state);
            debug!(episode, remaining, "[ESCALATION] Countdown tick");
            self.emit(vec![EscalationEvent::CountdownTick { episode, remaining }]);
            return TickControl::Continue;
        }

        // Cleared and latched under one lock: no episode may start in between.
        state.countdown = None;
        let first = !std::mem::replace(&mut state.submitted, true);
        let count = state.count;
        drop(state);
        self.emit(vec![EscalationEvent::CountdownTick { episode, remaining: 0 }]);
        if first {
            self.announce_submission(episode, count);
        }
        TickControl::Stop
    }

    /// Deliver a submission already latched in `State::submitted`.
    fn announce_submission(&self, episode: u64, count: usize) {
        warn!(episode, violations = count, "[ESCALATION] Countdown expired; forcing submission");
        self.submit_handlers.notify(&ForcedSubmission {
            episode,
            violation_count: count,
        });
        self.emit(vec![EscalationEvent::ForcedSubmission { episode, count }]);
    }
}

/// Maps violation counts to severity and runs the forced-submission countdown.
pub struct EscalationPolicy {
    scheduler: Arc<dyn Scheduler>,
    shared: Arc<Shared>,
}

impl EscalationPolicy {
    pub fn new(config: EscalationConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            shared: Arc::new(Shared {
                config: config.normalized(),
                state: Mutex::new(State {
                    count: 0,
                    severity: Severity::Calm,
                    warning_visible: false,
                    countdown: None,
                    episodes: 0,
                    submitted: false,
                    last_violation: None,
                }),
                events: SubscriberRegistry::new("escalation"),
                submit_handlers: SubscriberRegistry::new("forced_submit"),
            }),
        }
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.shared.config
    }

    /// Subscribe to severity/countdown changes.
    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&EscalationEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(callback)
    }

    /// Register a forced-submission handler.
    pub fn on_forced_submit<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ForcedSubmission) + Send + Sync + 'static,
    {
        self.shared.submit_handlers.subscribe(callback)
    }

    /// Account for one new violation and return the resulting severity.
    pub fn record_violation(&self, violation: &Violation) -> Severity {
        let mut state = self.shared.state();
        state.count += 1;
        state.last_violation = Some(violation.clone());
        state.warning_visible = true;
        let mut events = self.recompute(&mut state);

        if state.severity == Severity::Critical && state.countdown.is_none() && !state.submitted {
            events.extend(self.start_countdown(&mut state));
        }
        let severity = state.severity;
        let immediate = self.take_expired(&mut state);
        drop(state);

        self.shared.emit(events);
        if let Some((episode, count)) = immediate {
            self.shared.announce_submission(episode, count);
        }
        severity
    }

    /// Replace the count (e.g. after the violation history was cleared).
    ///
    /// Dropping below `critical` cancels a running countdown. Never starts one.
    pub fn sync_count(&self, count: usize) -> Severity {
        let mut state = self.shared.state();
        state.count = count;
        if count == 0 {
            state.last_violation = None;
            state.warning_visible = false;
        }
        let mut events = self.recompute(&mut state);
        if state.severity != Severity::Critical {
            if let Some(cancelled) = Self::cancel_locked(&mut state) {
                events.push(cancelled);
            }
        }
        let severity = state.severity;
        drop(state);
        self.shared.emit(events);
        severity
    }

    fn recompute(&self, state: &mut State) -> Vec<EscalationEvent> {
        let next = severity_for(state.count, self.shared.config.max_violations);
        if next == state.severity {
            return Vec::new();
        }
        let from = std::mem::replace(&mut state.severity, next);
        if next == Severity::Critical {
            warn!(count = state.count, "[ESCALATION] Maximum violations reached");
        } else {
            info!(%from, to = %next, count = state.count, "[ESCALATION] Severity changed");
        }
        vec![EscalationEvent::SeverityChanged {
            from,
            to: next,
            count: state.count,
        }]
    }

    fn start_countdown(&self, state: &mut State) -> Vec<EscalationEvent> {
        let mut events = Vec::new();
        if let Some(cancelled) = Self::cancel_locked(state) {
            events.push(cancelled);
        }

        state.episodes += 1;
        let episode = state.episodes;
        let seconds = self.shared.config.countdown_seconds;

        let handle = if seconds > 0 {
            let weak: Weak<Shared> = Arc::downgrade(&self.shared);
            Some(self.scheduler.every(
                self.shared.config.tick_period(),
                Box::new(move || match weak.upgrade() {
                    Some(shared) => shared.tick(episode),
                    None => TickControl::Stop,
                }),
            ))
        } else {
            None
        };

        state.countdown = Some(Countdown {
            episode,
            remaining: seconds,
            handle,
        });
        info!(episode, seconds, "[ESCALATION] Forced-submission countdown started");
        events.push(EscalationEvent::CountdownStarted { episode, seconds });
        events
    }

    /// A zero-length countdown expires as soon as it starts. Latches the submission.
    fn take_expired(&self, state: &mut State) -> Option<(u64, usize)> {
        match &state.countdown {
            Some(c) if c.remaining == 0 => {
                let episode = c.episode;
                state.countdown = None;
                if std::mem::replace(&mut state.submitted, true) {
                    return None;
                }
                Some((episode, state.count))
            }
            _ => None,
        }
    }

    fn cancel_locked(state: &mut State) -> Option<EscalationEvent> {
        let countdown = state.countdown.take()?;
        if let Some(handle) = &countdown.handle {
            handle.cancel();
        }
        Some(EscalationEvent::CountdownCancelled {
            episode: countdown.episode,
            remaining: countdown.remaining,
        })
    }

    /// External acknowledgment from the warning UI.
    ///
    /// In `critical` with a running countdown this cancels it and suppresses forced
    /// submission for the episode. Otherwise it only dismisses the warning.
    pub fn acknowledge(&self) -> Acknowledgement {
        let mut state = self.shared.state();
        let mut events = Vec::new();

        let outcome = if let Some(cancelled) = Self::cancel_locked(&mut state) {
            let remaining = match cancelled {
                EscalationEvent::CountdownCancelled { remaining, .. } => remaining,
                _ => 0,
            };
            info!(remaining, "[ESCALATION] Countdown acknowledged and cancelled");
            events.push(cancelled);
            state.warning_visible = false;
            events.push(EscalationEvent::WarningDismissed);
            Acknowledgement::CountdownCancelled { remaining }
        } else if state.warning_visible {
            state.warning_visible = false;
            debug!(severity = %state.severity, "[ESCALATION] Warning dismissed");
            events.push(EscalationEvent::WarningDismissed);
            Acknowledgement::WarningDismissed
        } else {
            Acknowledgement::NoOp
        };

        drop(state);
        self.shared.emit(events);
        outcome
    }

    /// Stop a running countdown without submitting. Returns whether one was running.
    pub fn cancel_countdown(&self) -> bool {
        let cancelled = Self::cancel_locked(&mut self.shared.state());
        match cancelled {
            Some(event) => {
                self.shared.emit(vec![event]);
                true
            }
            None => false,
        }
    }

    pub fn severity(&self) -> Severity {
        self.shared.state().severity
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        self.shared.state().countdown.as_ref().map(|c| c.remaining)
    }

    pub fn is_submitted(&self) -> bool {
        self.shared.state().submitted
    }

    pub fn snapshot(&self) -> EscalationSnapshot {
        let state = self.shared.state();
        EscalationSnapshot {
            severity: state.severity,
            violation_count: state.count,
            max_violations: self.shared.config.max_violations,
            countdown_remaining: state.countdown.as_ref().map(|c| c.remaining),
            warning_visible: state.warning_visible,
            submitted: state.submitted,
            last_violation: state.last_violation.clone(),
        }
    }
}

/// Text a passive warning view renders for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningView {
    pub severity: Severity,
    /// Status badge, always shown (e.g. "2/3 violations").
    pub badge: String,
    pub dialog_open: bool,
    pub title: String,
    pub message: String,
    pub countdown_remaining: Option<u32>,
}

impl WarningView {
    pub fn render(snapshot: &EscalationSnapshot) -> Self {
        let count = snapshot.violation_count;
        let max = snapshot.max_violations;
        let last = snapshot
            .last_violation
            .as_ref()
            .map(|v| format!(" ({})", v.kind.label()))
            .unwrap_or_default();

        let (title, message) = match snapshot.severity {
            Severity::Calm => (String::new(), String::new()),
            Severity::Warning => (
                "Warning".to_string(),
                format!(
                    "Leaving the assessment was detected{}. Violation {} of {}.",
                    last, count, max
                ),
            ),
            Severity::Danger => (
                "Final warning".to_string(),
                format!(
                    "Violation {} of {}{}. One more will submit your assessment automatically.",
                    count, max, last
                ),
            ),
            Severity::Critical => {
                let message = if snapshot.submitted {
                    "Your assessment has been submitted automatically.".to_string()
                } else if let Some(remaining) = snapshot.countdown_remaining {
                    format!("Your assessment will be submitted in {} seconds.", remaining)
                } else {
                    "Further violations will submit your assessment automatically.".to_string()
                };
                ("Maximum violations reached".to_string(), message)
            }
        };

        Self {
            severity: snapshot.severity,
            badge: format!("{}/{} violations", count, max),
            dialog_open: snapshot.warning_visible && snapshot.severity != Severity::Calm,
            title,
            message,
            countdown_remaining: snapshot.countdown_remaining,
        }
    }
}
