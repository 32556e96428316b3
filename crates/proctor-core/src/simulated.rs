//! Headless host used by tests and the replay tool.
//!
//! Holds the browser state a real host would read from the DOM (visibility, viewport,
//! screen, fullscreen element) and tracks which observers and suppressors are attached.
//! Events are only delivered while the matching observer is attached, like a browser
//! with removed listeners.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::fullscreen::{DocumentBindings, FullscreenCapability, FullscreenVendor, VendorFullscreen};
use crate::host::{BrowserHost, BrowserSignal, Dimensions, InputSurface, ObserverKind, SuppressorKind};
use crate::lockdown::{InputDisposition, InputEvent, LockdownController};
use crate::monitor::SessionMonitor;

#[derive(Debug)]
struct SimState {
    hidden: bool,
    viewport: Dimensions,
    screen: Dimensions,
    fullscreen_element: bool,
    grant_fullscreen: bool,
    observers: HashSet<ObserverKind>,
    unsupported_observers: HashSet<ObserverKind>,
    suppressors: HashSet<SuppressorKind>,
    selection_enabled: bool,
    fullscreen_vendor: Option<FullscreenVendor>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            hidden: false,
            viewport: Dimensions::new(1280, 720),
            screen: Dimensions::new(1920, 1080),
            fullscreen_element: false,
            grant_fullscreen: true,
            observers: HashSet::new(),
            unsupported_observers: HashSet::new(),
            suppressors: HashSet::new(),
            selection_enabled: true,
            fullscreen_vendor: Some(FullscreenVendor::Standard),
        }
    }
}

/// Document bindings backed by the simulated state.
#[derive(Debug, Clone)]
pub struct SimulatedDocument {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedDocument {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl DocumentBindings for SimulatedDocument {
    fn has_method(&self, name: &str) -> bool {
        match self.state().fullscreen_vendor {
            Some(v) => v.request_method() == name || v.exit_method() == name,
            None => false,
        }
    }

    fn invoke(&self, name: &str) -> bool {
        let mut state = self.state();
        let Some(vendor) = state.fullscreen_vendor else {
            return false;
        };
        if name == vendor.request_method() {
            if state.grant_fullscreen {
                state.fullscreen_element = true;
            }
            state.grant_fullscreen
        } else if name == vendor.exit_method() {
            state.fullscreen_element = false;
            true
        } else {
            false
        }
    }

    fn element_present(&self, property: &str) -> bool {
        let state = self.state();
        match state.fullscreen_vendor {
            Some(v) => v.element_property() == property && state.fullscreen_element,
            None => false,
        }
    }
}

/// In-memory browser host.
pub struct SimulatedHost {
    state: Arc<Mutex<SimState>>,
    fullscreen: Arc<VendorFullscreen<SimulatedDocument>>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        let state = Arc::new(Mutex::new(SimState::default()));
        let fullscreen = Arc::new(VendorFullscreen::new(SimulatedDocument {
            state: Arc::clone(&state),
        }));
        Self { state, fullscreen }
    }

    /// Host without the observation APIs the monitor needs.
    pub fn without_observers() -> Self {
        let host = Self::new();
        host.state().unsupported_observers = ObserverKind::ALL.into_iter().collect();
        host
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn fullscreen_handle(&self) -> Arc<dyn FullscreenCapability> {
        self.fullscreen.clone()
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.state().hidden = hidden;
    }

    pub fn set_viewport(&self, viewport: Dimensions) {
        self.state().viewport = viewport;
    }

    pub fn set_screen(&self, screen: Dimensions) {
        self.state().screen = screen;
    }

    /// Set the fullscreen element directly, as the user pressing Esc would.
    pub fn set_fullscreen_element(&self, present: bool) {
        self.state().fullscreen_element = present;
    }

    /// Whether requests for fullscreen are granted.
    pub fn set_grant_fullscreen(&self, grant: bool) {
        self.state().grant_fullscreen = grant;
    }

    /// `None` removes every fullscreen API.
    pub fn set_fullscreen_vendor(&self, vendor: Option<FullscreenVendor>) {
        self.state().fullscreen_vendor = vendor;
    }

    pub fn set_observer_supported(&self, kind: ObserverKind, supported: bool) {
        let mut state = self.state();
        if supported {
            state.unsupported_observers.remove(&kind);
        } else {
            state.unsupported_observers.insert(kind);
        }
    }

    pub fn is_observing(&self, kind: ObserverKind) -> bool {
        self.state().observers.contains(&kind)
    }

    pub fn attached_observers(&self) -> usize {
        self.state().observers.len()
    }

    pub fn is_suppressing(&self, kind: SuppressorKind) -> bool {
        self.state().suppressors.contains(&kind)
    }

    pub fn attached_suppressors(&self) -> usize {
        self.state().suppressors.len()
    }

    pub fn selection_enabled(&self) -> bool {
        self.state().selection_enabled
    }

    /// Deliver `signal` to `monitor` if its observer is attached. Returns whether it was delivered.
    pub fn fire(&self, signal: BrowserSignal, monitor: &SessionMonitor) -> bool {
        if !self.is_observing(signal.observer()) {
            return false;
        }
        monitor.handle_signal(signal);
        true
    }

    /// Deliver `event` to `lockdown` if its suppressor is attached; otherwise it passes through.
    pub fn dispatch_input(&self, event: &InputEvent, lockdown: &LockdownController) -> InputDisposition {
        if !self.is_suppressing(event.suppressor()) {
            return InputDisposition::PassThrough;
        }
        lockdown.handle_input(event)
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserHost for SimulatedHost {
    fn attach_observer(&self, kind: ObserverKind) -> bool {
        let mut state = self.state();
        if state.unsupported_observers.contains(&kind) {
            return false;
        }
        state.observers.insert(kind);
        true
    }

    fn detach_observer(&self, kind: ObserverKind) {
        self.state().observers.remove(&kind);
    }

    fn document_hidden(&self) -> bool {
        self.state().hidden
    }

    fn viewport(&self) -> Dimensions {
        self.state().viewport
    }

    fn screen(&self) -> Dimensions {
        self.state().screen
    }

    fn fullscreen(&self) -> &dyn FullscreenCapability {
        self.fullscreen.as_ref()
    }
}

impl InputSurface for SimulatedHost {
    fn attach_suppressor(&self, kind: SuppressorKind) -> bool {
        self.state().suppressors.insert(kind);
        true
    }

    fn detach_suppressor(&self, kind: SuppressorKind) {
        self.state().suppressors.remove(&kind);
    }

    fn set_selection_enabled(&self, enabled: bool) {
        self.state().selection_enabled = enabled;
    }
}
