//! Lockdown Controller: suppresses context menu, text selection, drag/drop and the
//! keyboard denylist, and asks for fullscreen on enable.
//!
//! Every suppressed input is written to the controller's own diagnostic log. That log is
//! separate from the monitor's violation history and never feeds escalation.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, Timestamp};
use crate::config::LockdownConfig;
use crate::error::ProctorError;
use crate::fullscreen::FullscreenCapability;
use crate::host::{InputSurface, SuppressorKind};
use crate::keyboard::{self, KeyStroke};

/// Raw input delivered by the host while a suppressor is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    ContextMenu,
    SelectStart,
    DragStart,
    Drop,
    KeyDown(KeyStroke),
}

impl InputEvent {
    pub fn suppressor(&self) -> SuppressorKind {
        match self {
            InputEvent::ContextMenu => SuppressorKind::ContextMenu,
            InputEvent::SelectStart => SuppressorKind::SelectStart,
            InputEvent::DragStart => SuppressorKind::DragStart,
            InputEvent::Drop => SuppressorKind::Drop,
            InputEvent::KeyDown(_) => SuppressorKind::KeyDown,
        }
    }
}

/// What the host must do with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDisposition {
    /// Cancel the default action and stop propagation.
    Suppressed,
    PassThrough,
}

/// One line of the lockdown diagnostic trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockdownLogEntry {
    pub at: Timestamp,
    pub action: String,
}

impl fmt::Display for LockdownLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at, self.action)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LockdownState {
    pub active: bool,
    pub started_at: Option<Timestamp>,
    pub log: Vec<LockdownLogEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    active: bool,
    started_at: Option<Timestamp>,
    log: Vec<LockdownLogEntry>,
}

pub struct LockdownController {
    surface: Arc<dyn InputSurface>,
    fullscreen: Arc<dyn FullscreenCapability>,
    clock: Arc<dyn Clock>,
    config: LockdownConfig,
    inner: Mutex<Inner>,
}

impl LockdownController {
    pub fn new(
        surface: Arc<dyn InputSurface>,
        fullscreen: Arc<dyn FullscreenCapability>,
        clock: Arc<dyn Clock>,
        config: LockdownConfig,
    ) -> Self {
        Self {
            surface,
            fullscreen,
            clock,
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Attach every suppressor and disable selection. Idempotent.
    ///
    /// Fullscreen is requested best-effort; being refused does not fail the call.
    pub fn enable(&self) -> bool {
        let mut inner = self.inner();
        if inner.active {
            return true;
        }

        let mut attached = Vec::with_capacity(SuppressorKind::ALL.len());
        for kind in SuppressorKind::ALL {
            if self.surface.attach_suppressor(kind) {
                attached.push(kind);
            } else {
                for k in attached {
                    self.surface.detach_suppressor(k);
                }
                warn!(
                    "[LOCKDOWN] {}",
                    ProctorError::CapabilityUnavailable(format!("{:?} suppressor", kind))
                );
                return false;
            }
        }
        self.surface.set_selection_enabled(false);

        inner.active = true;
        inner.started_at = Some(self.clock.now());
        drop(inner);

        if self.config.request_fullscreen_on_enable && !self.fullscreen.request() {
            warn!("[LOCKDOWN] Fullscreen not granted; continuing without it");
        }
        info!("[LOCKDOWN] Lockdown enabled");
        true
    }

    /// Detach every suppressor and restore selection/drag. Idempotent.
    pub fn disable(&self) -> bool {
        let mut inner = self.inner();
        if !inner.active {
            return true;
        }
        for kind in SuppressorKind::ALL {
            self.surface.detach_suppressor(kind);
        }
        self.surface.set_selection_enabled(true);
        inner.active = false;
        info!(suppressed = inner.log.len(), "[LOCKDOWN] Lockdown disabled");
        true
    }

    pub fn is_active(&self) -> bool {
        self.inner().active
    }

    pub fn request_fullscreen(&self) -> bool {
        self.fullscreen.request()
    }

    pub fn exit_fullscreen(&self) -> bool {
        self.fullscreen.exit()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.is_fullscreen()
    }

    /// Decide the fate of one input event. Everything passes while inactive.
    pub fn handle_input(&self, event: &InputEvent) -> InputDisposition {
        let mut inner = self.inner();
        if !inner.active {
            return InputDisposition::PassThrough;
        }

        let action = match event {
            InputEvent::ContextMenu => "Right-click blocked".to_string(),
            InputEvent::SelectStart => "Text selection blocked".to_string(),
            InputEvent::DragStart => "Drag blocked".to_string(),
            InputEvent::Drop => "Drop blocked".to_string(),
            InputEvent::KeyDown(stroke) => match keyboard::blocked_combo(stroke) {
                Some(_) => format!("Blocked key: {}", stroke),
                None => return InputDisposition::PassThrough,
            },
        };

        debug!("[LOCKDOWN] {}", action);
        let at = self.clock.now();
        inner.log.push(LockdownLogEntry { at, action });
        InputDisposition::Suppressed
    }

    /// Convenience for hosts that only forward key presses.
    pub fn handle_key(&self, stroke: KeyStroke) -> InputDisposition {
        self.handle_input(&InputEvent::KeyDown(stroke))
    }

    pub fn log(&self) -> Vec<LockdownLogEntry> {
        self.inner().log.clone()
    }

    pub fn log_messages(&self) -> Vec<String> {
        self.inner().log.iter().map(|e| e.action.clone()).collect()
    }

    pub fn clear_log(&self) {
        self.inner().log.clear();
    }

    pub fn get_state(&self) -> LockdownState {
        let inner = self.inner();
        LockdownState {
            active: inner.active,
            started_at: inner.started_at,
            log: inner.log.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::simulated::SimulatedHost;

    fn setup() -> (Arc<SimulatedHost>, LockdownController) {
        let host = Arc::new(SimulatedHost::new());
        let lockdown = LockdownController::new(
            host.clone(),
            host.fullscreen_handle(),
            Arc::new(ManualClock::new()),
            LockdownConfig::default(),
        );
        (host, lockdown)
    }

    #[test]
    fn test_enable_disable_idempotent() {
        let (host, lockdown) = setup();
        assert!(lockdown.enable());
        assert!(lockdown.enable());
        assert!(lockdown.is_active());
        assert_eq!(host.attached_suppressors(), 5);
        assert!(!host.selection_enabled());
        assert!(lockdown.is_fullscreen());

        assert!(lockdown.disable());
        assert!(lockdown.disable());
        assert!(!lockdown.is_active());
        assert_eq!(host.attached_suppressors(), 0);
        assert!(host.selection_enabled());
    }

    #[test]
    fn test_enable_succeeds_without_fullscreen() {
        let (host, lockdown) = setup();
        host.set_fullscreen_vendor(None);
        assert!(lockdown.enable());
        assert!(!lockdown.is_fullscreen());
        assert!(!lockdown.request_fullscreen());
        assert!(!lockdown.exit_fullscreen());
    }

    #[test]
    fn test_enable_succeeds_when_fullscreen_refused() {
        let (host, lockdown) = setup();
        host.set_grant_fullscreen(false);
        assert!(lockdown.enable());
        assert!(!lockdown.is_fullscreen());
    }

    #[test]
    fn test_suppresses_and_logs_gestures() {
        let (host, lockdown) = setup();
        lockdown.enable();
        for event in [
            InputEvent::ContextMenu,
            InputEvent::SelectStart,
            InputEvent::DragStart,
            InputEvent::Drop,
        ] {
            assert_eq!(host.dispatch_input(&event, &lockdown), InputDisposition::Suppressed);
        }
        assert_eq!(
            lockdown.log_messages(),
            vec![
                "Right-click blocked",
                "Text selection blocked",
                "Drag blocked",
                "Drop blocked"
            ]
        );
    }

    #[test]
    fn test_keyboard_denylist() {
        let (_host, lockdown) = setup();
        lockdown.enable();
        assert_eq!(lockdown.handle_key(KeyStroke::ctrl("c")), InputDisposition::Suppressed);
        assert_eq!(lockdown.handle_key(KeyStroke::ctrl_shift("C")), InputDisposition::Suppressed);
        assert_eq!(lockdown.handle_key(KeyStroke::plain("c")), InputDisposition::PassThrough);
        assert_eq!(lockdown.handle_key(KeyStroke::alt("Tab")), InputDisposition::Suppressed);
        assert_eq!(lockdown.handle_key(KeyStroke::plain("Tab")), InputDisposition::PassThrough);
        assert_eq!(
            lockdown.log_messages(),
            vec!["Blocked key: Ctrl+C", "Blocked key: Ctrl+Shift+C", "Blocked key: Alt+Tab"]
        );
    }

    #[test]
    fn test_inactive_passes_everything() {
        let (host, lockdown) = setup();
        assert_eq!(lockdown.handle_key(KeyStroke::plain("F12")), InputDisposition::PassThrough);
        lockdown.enable();
        lockdown.disable();
        assert_eq!(
            host.dispatch_input(&InputEvent::ContextMenu, &lockdown),
            InputDisposition::PassThrough
        );
        assert!(lockdown.log().is_empty());
    }

    #[test]
    fn test_log_survives_disable() {
        let (_host, lockdown) = setup();
        lockdown.enable();
        lockdown.handle_key(KeyStroke::plain("F5"));
        lockdown.disable();
        let state = lockdown.get_state();
        assert!(!state.active);
        assert_eq!(state.log.len(), 1);
        assert_eq!(state.log[0].to_string(), "[0ms] Blocked key: F5");

        lockdown.clear_log();
        assert!(lockdown.log().is_empty());
    }
}
