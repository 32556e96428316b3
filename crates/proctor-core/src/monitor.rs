//! Session Monitor: observes ambient browser signals and keeps the violation history.
//!
//! ## Detection policy
//!
//! | Signal | Kind | Condition |
//! |--------|------|-----------|
//! | blur | `focus_lost` | always, while active |
//! | visibilitychange | `tab_switch` | `document.hidden` goes false -> true |
//! | fullscreenchange | `fullscreen_exit` | fullscreen goes true -> false (any vendor) |
//! | resize | `window_resize` | viewport wider or taller than the screen |
//!
//! Regaining focus or visibility is logged at debug level and never recorded.
//!
//! ## Delivery
//!
//! A violation is appended to the log before any subscriber sees it, and subscribers see
//! violations and clears in exactly the order they hit the log. Each change is queued in
//! an outbox while the monitor lock is held; one caller at a time drains the outbox, with
//! no monitor lock held, so callbacks can query the monitor.
//!
//! A callback that records a violation or clears the history (directly or through the
//! host) does not recurse: its event is queued and delivered once the current event has
//! reached every subscriber. A thread that finds another thread draining hands its
//! event over and returns without waiting.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, Timestamp};
use crate::config::MonitorConfig;
use crate::error::ProctorError;
use crate::host::{BrowserHost, BrowserSignal, ObserverKind};
use crate::subscribers::{SubscriberRegistry, Subscription};
use crate::violation::{Violation, ViolationKind, ViolationLog};

/// Snapshot handed to the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorState {
    pub active: bool,
    pub violations: Vec<Violation>,
    pub started_at: Option<Timestamp>,
}

#[derive(Debug, Default)]
struct Inner {
    active: bool,
    log: ViolationLog,
    started_at: Option<Timestamp>,
    was_hidden: bool,
    was_fullscreen: bool,
}

/// History change waiting for delivery.
#[derive(Debug)]
enum Change {
    Recorded(Violation),
    Cleared { removed: usize },
}

#[derive(Debug, Default)]
struct Outbox {
    queue: VecDeque<Change>,
    draining: bool,
}

pub struct SessionMonitor {
    host: Arc<dyn BrowserHost>,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
    inner: Mutex<Inner>,
    outbox: Mutex<Outbox>,
    subscribers: SubscriberRegistry<Violation>,
    clear_subscribers: SubscriberRegistry<usize>,
}

impl SessionMonitor {
    pub fn new(host: Arc<dyn BrowserHost>, clock: Arc<dyn Clock>, config: MonitorConfig) -> Self {
        Self {
            host,
            clock,
            config,
            inner: Mutex::new(Inner::default()),
            outbox: Mutex::new(Outbox::default()),
            subscribers: SubscriberRegistry::new("monitor"),
            clear_subscribers: SubscriberRegistry::new("monitor_clear"),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Queue a change. Must be called with the monitor lock held so queue order is log order.
    fn enqueue(&self, change: Change) {
        self.outbox().queue.push_back(change);
    }

    /// Deliver queued changes in order unless another caller is already doing so.
    fn deliver_pending(&self) {
        {
            let mut outbox = self.outbox();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        loop {
            let next = {
                let mut outbox = self.outbox();
                match outbox.queue.pop_front() {
                    Some(change) => change,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            match next {
                Change::Recorded(violation) => {
                    self.subscribers.notify(&violation);
                }
                Change::Cleared { removed } => {
                    self.clear_subscribers.notify(&removed);
                }
            }
        }
    }

    /// Attach all observers and begin recording. Idempotent.
    ///
    /// Returns `false` and stays inactive if the host cannot attach every observer.
    pub fn start(&self) -> bool {
        let mut inner = self.inner();
        if inner.active {
            return true;
        }

        let mut attached = Vec::with_capacity(ObserverKind::ALL.len());
        for kind in ObserverKind::ALL {
            if self.host.attach_observer(kind) {
                attached.push(kind);
            } else {
                for k in attached {
                    self.host.detach_observer(k);
                }
                warn!(
                    "[MONITOR] {}",
                    ProctorError::CapabilityUnavailable(format!("{:?} observer", kind))
                );
                return false;
            }
        }

        inner.active = true;
        inner.started_at = Some(self.clock.now());
        inner.was_hidden = self.host.document_hidden();
        inner.was_fullscreen = self.host.fullscreen().is_fullscreen();
        info!(
            recorded = inner.log.len(),
            fullscreen = inner.was_fullscreen,
            "[MONITOR] Monitoring started"
        );
        true
    }

    /// Detach all observers. Idempotent; the violation history is kept.
    pub fn stop(&self) -> bool {
        let mut inner = self.inner();
        if !inner.active {
            return true;
        }
        for kind in ObserverKind::ALL {
            self.host.detach_observer(kind);
        }
        inner.active = false;
        info!(recorded = inner.log.len(), "[MONITOR] Monitoring stopped");
        true
    }

    pub fn is_active(&self) -> bool {
        self.inner().active
    }

    /// Entry point for host observers. Returns the violation recorded, if any.
    ///
    /// Ignored entirely while the monitor is inactive.
    pub fn handle_signal(&self, signal: BrowserSignal) -> Option<Violation> {
        let violation = {
            let mut inner = self.inner();
            if !inner.active {
                return None;
            }
            let (kind, details) = self.classify(&mut inner, signal)?;
            let violation = Violation::new(kind, self.clock.now(), details);
            inner.log.push(violation.clone());
            warn!(
                kind = %violation.kind,
                total = inner.log.len(),
                "[MONITOR] Violation detected: {}",
                violation.details
            );
            self.enqueue(Change::Recorded(violation.clone()));
            violation
        };

        self.deliver_pending();
        Some(violation)
    }

    fn classify(&self, inner: &mut Inner, signal: BrowserSignal) -> Option<(ViolationKind, String)> {
        match signal {
            BrowserSignal::Blur => Some((
                ViolationKind::FocusLost,
                "Window lost focus".to_string(),
            )),
            BrowserSignal::Focus => {
                debug!("[MONITOR] Window regained focus");
                None
            }
            BrowserSignal::VisibilityChange => {
                let hidden = self.host.document_hidden();
                let was_hidden = std::mem::replace(&mut inner.was_hidden, hidden);
                if hidden && !was_hidden {
                    Some((
                        ViolationKind::TabSwitch,
                        "Page hidden: tab switched or window minimized".to_string(),
                    ))
                } else {
                    if !hidden {
                        debug!("[MONITOR] Page visible again");
                    }
                    None
                }
            }
            BrowserSignal::FullscreenChange => {
                let fullscreen = self.host.fullscreen().is_fullscreen();
                let was_fullscreen = std::mem::replace(&mut inner.was_fullscreen, fullscreen);
                if was_fullscreen && !fullscreen {
                    Some((
                        ViolationKind::FullscreenExit,
                        "Exited fullscreen mode".to_string(),
                    ))
                } else {
                    debug!(fullscreen, "[MONITOR] Fullscreen state changed");
                    None
                }
            }
            BrowserSignal::Resize => {
                if !self.config.detect_resize {
                    return None;
                }
                let viewport = self.host.viewport();
                let screen = self.host.screen();
                if viewport.exceeds(&screen) {
                    Some((
                        ViolationKind::WindowResize,
                        format!(
                            "Viewport {}x{} exceeds screen {}x{}",
                            viewport.width, viewport.height, screen.width, screen.height
                        ),
                    ))
                } else {
                    None
                }
            }
        }
    }

    /// Register a violation callback. Alias of [`SessionMonitor::on_violation`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Violation) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    pub fn on_violation<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Violation) + Send + Sync + 'static,
    {
        self.subscribe(callback)
    }

    /// Register a callback run after every [`SessionMonitor::clear`] with the number of
    /// violations removed. Anything that mirrors the history (such as a violation count)
    /// resets from here.
    pub fn on_clear<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&usize) + Send + Sync + 'static,
    {
        self.clear_subscribers.subscribe(callback)
    }

    pub fn subscribers(&self) -> &SubscriberRegistry<Violation> {
        &self.subscribers
    }

    /// Empty the history. Active state and subscribers are untouched.
    pub fn clear(&self) {
        {
            let mut inner = self.inner();
            let removed = inner.log.len();
            inner.log.clear();
            self.enqueue(Change::Cleared { removed });
            info!(removed, "[MONITOR] Violation history cleared");
        }
        self.deliver_pending();
    }

    pub fn count(&self, kind: Option<ViolationKind>) -> usize {
        self.inner().log.count(kind)
    }

    pub fn last_violation(&self) -> Option<Violation> {
        self.inner().log.last().cloned()
    }

    pub fn violations_between(&self, start: Timestamp, end: Timestamp) -> Vec<Violation> {
        self.inner().log.between(start, end)
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.inner().log.to_vec()
    }

    pub fn get_state(&self) -> MonitorState {
        let inner = self.inner();
        MonitorState {
            active: inner.active,
            violations: inner.log.to_vec(),
            started_at: inner.started_at,
        }
    }
}
