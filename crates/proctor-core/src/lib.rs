//! proctor-core: violation detection and enforcement for lockdown assessment sessions.
//!
//! - **SessionMonitor** classifies ambient browser signals (focus loss, hidden page,
//!   fullscreen exit, oversized viewport) into violations and fans them out to subscribers.
//! - **LockdownController** suppresses context menu, selection, drag/drop and a keyboard
//!   denylist, and requests fullscreen.
//! - **EscalationPolicy** maps the violation count to a warning severity and runs the
//!   forced-submission countdown.
//!
//! The browser is reached only through the traits in [`host`] and [`fullscreen`];
//! time only through [`clock`] and [`scheduler`].

pub mod assessment;
pub mod clock;
pub mod config;
pub mod error;
pub mod escalation;
pub mod fullscreen;
pub mod host;
pub mod keyboard;
pub mod lockdown;
pub mod monitor;
pub mod scheduler;
pub mod session;
pub mod simulated;
pub mod store;
pub mod subscribers;
pub mod violation;

pub use assessment::{AssessmentUrl, SessionId};
pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use config::{EscalationConfig, LockdownConfig, MonitorConfig, ProctorConfig};
pub use error::{ProctorError, ProctorResult};
pub use escalation::{
    severity_for, Acknowledgement, EscalationEvent, EscalationPolicy, EscalationSnapshot,
    ForcedSubmission, Severity, WarningView,
};
pub use fullscreen::{DocumentBindings, FullscreenCapability, FullscreenVendor, VendorFullscreen};
pub use host::{BrowserHost, BrowserSignal, Dimensions, InputSurface, ObserverKind, SuppressorKind};
pub use keyboard::{is_blocked, KeyCombo, KeyStroke, DENYLIST};
pub use lockdown::{InputDisposition, InputEvent, LockdownController, LockdownLogEntry, LockdownState};
pub use monitor::{MonitorState, SessionMonitor};
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, TickControl, TokioScheduler};
pub use session::{BeginOutcome, ProctorSession, SessionParts, SessionState};
pub use simulated::SimulatedHost;
pub use store::{MemorySessionStore, SessionRecord, SessionStore, SledSessionStore};
pub use subscribers::{SubscriberId, SubscriberRegistry, Subscription};
pub use violation::{Violation, ViolationKind, ViolationLog};
