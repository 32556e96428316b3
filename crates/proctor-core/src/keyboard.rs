//! Keyboard denylist.
//!
//! A key stroke is blocked only when its modifier set equals a combo's modifier set
//! exactly: `Ctrl+C` and `Ctrl+Shift+C` are separate rules, and `Ctrl+Alt+C` matches
//! neither. Letter keys compare case-insensitively.

use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A keydown as reported by the host (`KeyboardEvent.key` plus modifier flags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStroke {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyStroke {
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(key)
        }
    }

    pub fn ctrl_shift(key: impl Into<String>) -> Self {
        Self {
            ctrl: true,
            shift: true,
            ..Self::plain(key)
        }
    }

    pub fn alt(key: impl Into<String>) -> Self {
        Self {
            alt: true,
            ..Self::plain(key)
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.meta {
            f.write_str("Meta+")?;
        }
        if self.alt {
            f.write_str("Alt+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        if self.key.chars().count() == 1 {
            write!(f, "{}", self.key.to_uppercase())
        } else {
            f.write_str(&self.key)
        }
    }
}

/// One denylist rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub key: &'static str,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyCombo {
    const fn key(key: &'static str) -> Self {
        Self {
            key,
            ctrl: false,
            shift: false,
            alt: false,
        }
    }

    pub fn matches(&self, stroke: &KeyStroke) -> bool {
        self.ctrl == stroke.ctrl
            && self.shift == stroke.shift
            && self.alt == stroke.alt
            && !stroke.meta
            && self.key.eq_ignore_ascii_case(&stroke.key)
    }
}

const FUNCTION_KEYS: [&str; 4] = ["F1", "F5", "F11", "F12"];

/// Letters blocked with Ctrl and with Ctrl+Shift.
const CTRL_LETTERS: [&str; 16] = [
    "U", "S", "A", "C", "V", "X", "Z", "Y", "F", "H", "R", "T", "N", "W", "J", "I",
];

/// Every blocked combination.
pub static DENYLIST: Lazy<Vec<KeyCombo>> = Lazy::new(|| {
    let mut combos: Vec<KeyCombo> = FUNCTION_KEYS.into_iter().map(KeyCombo::key).collect();
    for letter in CTRL_LETTERS {
        combos.push(KeyCombo {
            ctrl: true,
            ..KeyCombo::key(letter)
        });
        combos.push(KeyCombo {
            ctrl: true,
            shift: true,
            ..KeyCombo::key(letter)
        });
    }
    combos.push(KeyCombo {
        alt: true,
        ..KeyCombo::key("Tab")
    });
    combos.push(KeyCombo {
        alt: true,
        ..KeyCombo::key("F4")
    });
    combos
});

/// The rule `stroke` hits, if any.
pub fn blocked_combo(stroke: &KeyStroke) -> Option<&'static KeyCombo> {
    DENYLIST.iter().find(|combo| combo.matches(stroke))
}

pub fn is_blocked(stroke: &KeyStroke) -> bool {
    blocked_combo(stroke).is_some()
}
