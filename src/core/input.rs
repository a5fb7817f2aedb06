//! Low-level input codes and the pending-input queue.
//!
//! Codes follow the window-event numbering used by common handheld
//! emulators: presses are `2..=9`, the matching releases are `10..=17`,
//! in the order UP, DOWN, RIGHT, LEFT, A, B, SELECT, START.

use std::collections::VecDeque;
use std::fmt;

/// Opaque press/release code understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputEvent(pub u8);

impl InputEvent {
    pub const PRESS_ARROW_UP: Self = Self(2);
    pub const PRESS_ARROW_DOWN: Self = Self(3);
    pub const PRESS_ARROW_RIGHT: Self = Self(4);
    pub const PRESS_ARROW_LEFT: Self = Self(5);
    pub const PRESS_BUTTON_A: Self = Self(6);
    pub const PRESS_BUTTON_B: Self = Self(7);
    pub const PRESS_BUTTON_SELECT: Self = Self(8);
    pub const PRESS_BUTTON_START: Self = Self(9);
    pub const RELEASE_ARROW_UP: Self = Self(10);
    pub const RELEASE_ARROW_DOWN: Self = Self(11);
    pub const RELEASE_ARROW_RIGHT: Self = Self(12);
    pub const RELEASE_ARROW_LEFT: Self = Self(13);
    pub const RELEASE_BUTTON_A: Self = Self(14);
    pub const RELEASE_BUTTON_B: Self = Self(15);
    pub const RELEASE_BUTTON_SELECT: Self = Self(16);
    pub const RELEASE_BUTTON_START: Self = Self(17);

    #[inline]
    pub fn code(self) -> u8 {
        self.0
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A press code and the release code that undoes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputPair {
    pub press: InputEvent,
    pub release: InputEvent,
}

impl InputPair {
    pub const fn new(press: InputEvent, release: InputEvent) -> Self {
        Self { press, release }
    }
}

/// Which end of the queue `drain_one` removes from.
///
/// `Fifo` delivers a queued pair press-then-release. `Lifo` pops the most
/// recently appended code first, so a pair queued together is delivered
/// release-then-press; it exists for compatibility with the legacy bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DrainPolicy {
    #[default]
    Fifo,
    Lifo,
}

impl DrainPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" | "head" => Some(Self::Fifo),
            "lifo" | "tail" => Some(Self::Lifo),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Lifo => "lifo",
        }
    }
}

/// Pending input events awaiting injection, one per tick.
#[derive(Debug, Clone, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
    policy: DrainPolicy,
}

impl InputQueue {
    pub fn new(policy: DrainPolicy) -> Self {
        Self {
            events: VecDeque::with_capacity(16),
            policy,
        }
    }

    pub fn policy(&self) -> DrainPolicy {
        self.policy
    }

    /// Append `press` then `release`.
    pub fn enqueue_press_release(&mut self, press: InputEvent, release: InputEvent) {
        self.events.push_back(press);
        self.events.push_back(release);
    }

    pub fn enqueue_pair(&mut self, pair: InputPair) {
        self.enqueue_press_release(pair.press, pair.release);
    }

    /// Remove at most one pending event according to the drain policy.
    pub fn drain_one(&mut self) -> Option<InputEvent> {
        match self.policy {
            DrainPolicy::Fifo => self.events.pop_front(),
            DrainPolicy::Lifo => self.events.pop_back(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
