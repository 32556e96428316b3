//! Violation taxonomy and the append-only violation log.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Kind of rule-breaking signal. Serialized names are API-stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    FocusLost,
    TabSwitch,
    /// Reserved. Visibility transitions are classified as `TabSwitch`.
    VisibilityChange,
    FullscreenExit,
    WindowResize,
}

impl ViolationKind {
    pub const ALL: [ViolationKind; 5] = [
        ViolationKind::FocusLost,
        ViolationKind::TabSwitch,
        ViolationKind::VisibilityChange,
        ViolationKind::FullscreenExit,
        ViolationKind::WindowResize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::FocusLost => "focus_lost",
            ViolationKind::TabSwitch => "tab_switch",
            ViolationKind::VisibilityChange => "visibility_change",
            ViolationKind::FullscreenExit => "fullscreen_exit",
            ViolationKind::WindowResize => "window_resize",
        }
    }

    /// Short label for warning dialogs and status badges.
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::FocusLost => "Window lost focus",
            ViolationKind::TabSwitch => "Switched tab",
            ViolationKind::VisibilityChange => "Page hidden",
            ViolationKind::FullscreenExit => "Exited fullscreen",
            ViolationKind::WindowResize => "Window resized beyond screen",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded instance of a detected signal. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub occurred_at: Timestamp,
    pub details: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, occurred_at: Timestamp, details: impl Into<String>) -> Self {
        Self {
            kind,
            occurred_at,
            details: details.into(),
        }
    }
}

/// Ordered violation history for one assessment session.
///
/// Append-only; the only way entries leave is [`ViolationLog::clear`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationLog {
    entries: Vec<Violation>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.entries.push(violation);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, kind: Option<ViolationKind>) -> usize {
        match kind {
            Some(k) => self.entries.iter().filter(|v| v.kind == k).count(),
            None => self.entries.len(),
        }
    }

    pub fn last(&self) -> Option<&Violation> {
        self.entries.last()
    }

    /// Violations with `start <= occurred_at <= end`, in detection order.
    pub fn between(&self, start: Timestamp, end: Timestamp) -> Vec<Violation> {
        self.entries
            .iter()
            .filter(|v| v.occurred_at >= start && v.occurred_at <= end)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<Violation> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> ViolationLog {
        let mut log = ViolationLog::new();
        log.push(Violation::new(ViolationKind::FocusLost, Timestamp(10), "blur"));
        log.push(Violation::new(ViolationKind::TabSwitch, Timestamp(20), "hidden"));
        log.push(Violation::new(ViolationKind::FocusLost, Timestamp(30), "blur"));
        log
    }

    #[test]
    fn test_count_by_kind() {
        let log = sample_log();
        assert_eq!(log.count(None), 3);
        assert_eq!(log.count(Some(ViolationKind::FocusLost)), 2);
        assert_eq!(log.count(Some(ViolationKind::WindowResize)), 0);
    }

    #[test]
    fn test_between_is_inclusive() {
        let log = sample_log();
        let hits = log.between(Timestamp(10), Timestamp(20));
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].kind, ViolationKind::FocusLost);
        assert_eq!(hits[1].kind, ViolationKind::TabSwitch);
        assert!(log.between(Timestamp(31), Timestamp(100)).is_empty());
    }

    #[test]
    fn test_kind_wire_names() {
        for kind in ViolationKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_clear_empties_log() {
        let mut log = sample_log();
        log.clear();
        assert!(log.is_empty());
        assert!(log.last().is_none());
    }
}
