use evdev::KeyCode;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The GUI (meta/command) key tapped when a GUI-role key is struck alone.
    pub fn gui(self) -> KeyCode {
        match self {
            Side::Left => KeyCode::KEY_LEFTMETA,
            Side::Right => KeyCode::KEY_RIGHTMETA,
        }
    }
}

/// Which real modifier a chord implies, independent of side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Alt,
    Ctrl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Modifier {
    pub family: Family,
    pub side: Side,
}

impl Modifier {
    pub fn new(family: Family, side: Side) -> Self {
        Self { family, side }
    }

    pub fn key(self) -> KeyCode {
        match (self.family, self.side) {
            (Family::Alt, Side::Left) => KeyCode::KEY_LEFTALT,
            (Family::Alt, Side::Right) => KeyCode::KEY_RIGHTALT,
            (Family::Ctrl, Side::Left) => KeyCode::KEY_LEFTCTRL,
            (Family::Ctrl, Side::Right) => KeyCode::KEY_RIGHTCTRL,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::Left => "L",
            Side::Right => "R",
        };
        let family = match self.family {
            Family::Alt => "ALT",
            Family::Ctrl => "CTRL",
        };
        write!(f, "{side}{family}")
    }
}
