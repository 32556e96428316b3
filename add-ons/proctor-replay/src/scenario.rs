//! Scenario files: a timed list of browser state changes and signals.
//!
//! ```toml
//! assessment_url = "forms.example.com/exam"
//!
//! [[step]]
//! after_ms = 500
//! action = "signal"
//! signal = "blur"
//!
//! [[step]]
//! after_ms = 200
//! action = "key"
//! key = "c"
//! ctrl = true
//! ```

use std::path::Path;

use anyhow::Context;
use proctor_core::{BrowserSignal, Dimensions, InputEvent, KeyStroke, SimulatedHost};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub assessment_url: String,
    /// How long to wait after the last step for a pending countdown. Defaults to the
    /// configured countdown length plus one tick.
    #[serde(default)]
    pub linger_ms: Option<u64>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
pub struct Step {
    /// Delay since the previous step.
    #[serde(default)]
    pub after_ms: u64,
    #[serde(flatten)]
    pub op: StepOp,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepOp {
    Signal { signal: BrowserSignal },
    Hidden { value: bool },
    Fullscreen { value: bool },
    Viewport { width: u32, height: u32 },
    Key(KeyStroke),
    Input { event: Gesture },
    Acknowledge,
}

/// Pointer and selection gestures the lockdown controller intercepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    ContextMenu,
    SelectStart,
    DragStart,
    Drop,
}

impl Gesture {
    pub fn event(self) -> InputEvent {
        match self {
            Gesture::ContextMenu => InputEvent::ContextMenu,
            Gesture::SelectStart => InputEvent::SelectStart,
            Gesture::DragStart => InputEvent::DragStart,
            Gesture::Drop => InputEvent::Drop,
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }
}

/// Host-state change a step applies before any signal is delivered.
pub fn apply_state(host: &SimulatedHost, op: &StepOp) {
    match op {
        StepOp::Hidden { value } => host.set_hidden(*value),
        StepOp::Fullscreen { value } => host.set_fullscreen_element(*value),
        StepOp::Viewport { width, height } => host.set_viewport(Dimensions::new(*width, *height)),
        _ => {}
    }
}

/// Signal a state change implies, as a browser would raise it.
pub fn implied_signal(op: &StepOp) -> Option<BrowserSignal> {
    match op {
        StepOp::Signal { signal } => Some(*signal),
        StepOp::Hidden { .. } => Some(BrowserSignal::VisibilityChange),
        StepOp::Fullscreen { .. } => Some(BrowserSignal::FullscreenChange),
        StepOp::Viewport { .. } => Some(BrowserSignal::Resize),
        _ => None,
    }
}

pub fn input_event(op: &StepOp) -> Option<InputEvent> {
    match op {
        StepOp::Key(stroke) => Some(InputEvent::KeyDown(stroke.clone())),
        StepOp::Input { event } => Some(event.event()),
        _ => None,
    }
}
