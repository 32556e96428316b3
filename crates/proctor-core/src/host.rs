//! Host environment seam.
//!
//! The core never touches a DOM directly. A host (a wasm binding layer, an embedded
//! webview bridge, or [`crate::simulated::SimulatedHost`]) implements these traits and
//! forwards raw events into [`crate::monitor::SessionMonitor::handle_signal`] and
//! [`crate::lockdown::LockdownController::handle_input`].

use serde::{Deserialize, Serialize};

use crate::fullscreen::FullscreenCapability;

/// The five ambient observers the session monitor registers together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverKind {
    Blur,
    Focus,
    VisibilityChange,
    FullscreenChange,
    Resize,
}

impl ObserverKind {
    pub const ALL: [ObserverKind; 5] = [
        ObserverKind::Blur,
        ObserverKind::Focus,
        ObserverKind::VisibilityChange,
        ObserverKind::FullscreenChange,
        ObserverKind::Resize,
    ];
}

/// Raw signal delivered by the host when an observer fires.
///
/// Signals carry no payload; the monitor reads current state back from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserSignal {
    Blur,
    Focus,
    VisibilityChange,
    FullscreenChange,
    Resize,
}

impl BrowserSignal {
    pub fn observer(&self) -> ObserverKind {
        match self {
            BrowserSignal::Blur => ObserverKind::Blur,
            BrowserSignal::Focus => ObserverKind::Focus,
            BrowserSignal::VisibilityChange => ObserverKind::VisibilityChange,
            BrowserSignal::FullscreenChange => ObserverKind::FullscreenChange,
            BrowserSignal::Resize => ObserverKind::Resize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either axis is larger than `bounds`.
    pub fn exceeds(&self, bounds: &Dimensions) -> bool {
        self.width > bounds.width || self.height > bounds.height
    }
}

/// Observation surface used by the session monitor.
pub trait BrowserHost: Send + Sync {
    /// Register one observer. `false` means the host lacks the API.
    fn attach_observer(&self, kind: ObserverKind) -> bool;
    fn detach_observer(&self, kind: ObserverKind);
    /// `document.hidden`.
    fn document_hidden(&self) -> bool;
    /// Inner window size.
    fn viewport(&self) -> Dimensions;
    /// Physical screen size.
    fn screen(&self) -> Dimensions;
    fn fullscreen(&self) -> &dyn FullscreenCapability;
}

/// Input gestures the lockdown controller suppresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressorKind {
    ContextMenu,
    KeyDown,
    SelectStart,
    DragStart,
    Drop,
}

impl SuppressorKind {
    pub const ALL: [SuppressorKind; 5] = [
        SuppressorKind::ContextMenu,
        SuppressorKind::KeyDown,
        SuppressorKind::SelectStart,
        SuppressorKind::DragStart,
        SuppressorKind::Drop,
    ];
}

/// Input surface used by the lockdown controller.
pub trait InputSurface: Send + Sync {
    fn attach_suppressor(&self, kind: SuppressorKind) -> bool;
    fn detach_suppressor(&self, kind: SuppressorKind);
    /// Toggle `user-select` / native drag on the document body.
    fn set_selection_enabled(&self, enabled: bool);
}
