//! Command classifier: chat text to symbolic action.

use crate::input::{InputEvent, InputPair};
use std::fmt;

/// Joypad controls a chat command can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Button {
    Left,
    Right,
    Up,
    Down,
    A,
    B,
    Start,
    Select,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::Left,
        Button::Right,
        Button::Up,
        Button::Down,
        Button::A,
        Button::B,
        Button::Start,
        Button::Select,
    ];

    /// The engine codes pressing and releasing this control.
    pub fn pair(self) -> InputPair {
        match self {
            Button::Left => {
                InputPair::new(InputEvent::PRESS_ARROW_LEFT, InputEvent::RELEASE_ARROW_LEFT)
            }
            Button::Right => {
                InputPair::new(InputEvent::PRESS_ARROW_RIGHT, InputEvent::RELEASE_ARROW_RIGHT)
            }
            Button::Up => InputPair::new(InputEvent::PRESS_ARROW_UP, InputEvent::RELEASE_ARROW_UP),
            Button::Down => {
                InputPair::new(InputEvent::PRESS_ARROW_DOWN, InputEvent::RELEASE_ARROW_DOWN)
            }
            Button::A => InputPair::new(InputEvent::PRESS_BUTTON_A, InputEvent::RELEASE_BUTTON_A),
            Button::B => InputPair::new(InputEvent::PRESS_BUTTON_B, InputEvent::RELEASE_BUTTON_B),
            Button::Start => {
                InputPair::new(InputEvent::PRESS_BUTTON_START, InputEvent::RELEASE_BUTTON_START)
            }
            Button::Select => InputPair::new(
                InputEvent::PRESS_BUTTON_SELECT,
                InputEvent::RELEASE_BUTTON_SELECT,
            ),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Left => "left",
            Button::Right => "right",
            Button::Up => "up",
            Button::Down => "down",
            Button::A => "a",
            Button::B => "b",
            Button::Start => "start",
            Button::Select => "select",
        }
    }
}

/// Lifecycle commands. These never carry input codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Control {
    Load,
    Quit,
    Exit,
    Kill,
}

impl Control {
    pub fn name(self) -> &'static str {
        match self {
            Control::Load => "load",
            Control::Quit => "quit",
            Control::Exit => "exit",
            Control::Kill => "kill",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SymbolicAction {
    Input(Button),
    Control(Control),
    Invalid,
}

impl SymbolicAction {
    /// Press/release codes for input actions; `None` for everything else.
    pub fn input_pair(self) -> Option<InputPair> {
        match self {
            SymbolicAction::Input(b) => Some(b.pair()),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SymbolicAction::Input(b) => b.name(),
            SymbolicAction::Control(c) => c.name(),
            SymbolicAction::Invalid => "invalid",
        }
    }
}

impl fmt::Display for SymbolicAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Lower-case and trim raw chat text into a classifier token.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Map a normalized token to its action. Exact match only; anything
/// unrecognized is `Invalid`.
pub fn classify(token: &str) -> SymbolicAction {
    use SymbolicAction::{Control as C, Input as I};
    match token {
        "left" | "<" => I(Button::Left),
        "right" | ">" => I(Button::Right),
        "down" | "v" => I(Button::Down),
        "up" | "^" => I(Button::Up),
        "start" => I(Button::Start),
        "select" => I(Button::Select),
        "a" => I(Button::A),
        "b" => I(Button::B),
        "load" => C(Control::Load),
        "quit" => C(Control::Quit),
        "exit" => C(Control::Exit),
        "kill" => C(Control::Kill),
        _ => SymbolicAction::Invalid,
    }
}
