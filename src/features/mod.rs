pub mod dual_gui;
pub mod layers;
pub mod tap_hold;

use crate::config::{Action, KeyboardConfig};
use crate::consts::PRESS;
use anyhow::Result;
use evdev::KeyCode;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    /// Physical key as read from the device
    pub key: KeyCode,
    /// What the key does once layers are applied
    pub action: Action,
    pub state: i32,
    pub time: Instant,
}

impl KeyEvent {
    pub fn new(key: KeyCode, state: i32, time: Instant) -> Self {
        Self {
            key,
            action: Action::Keys(vec![key]),
            state,
            time,
        }
    }

    pub fn pressed(&self) -> bool {
        self.state == PRESS
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputEvent {
    Press(KeyCode),
    Release(KeyCode),
    PressMany(Vec<KeyCode>),
    ReleaseMany(Vec<KeyCode>),
}

impl OutputEvent {
    /// What a key event writes when nothing else claims it.
    pub fn for_event(event: &KeyEvent) -> Option<Self> {
        match &event.action {
            Action::Keys(keys) if event.pressed() => Some(OutputEvent::PressMany(keys.clone())),
            Action::Keys(keys) => Some(OutputEvent::ReleaseMany(keys.clone())),
            Action::TapHold { tap, .. } if event.pressed() => Some(OutputEvent::Press(*tap)),
            Action::TapHold { tap, .. } => Some(OutputEvent::Release(*tap)),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerMsg {
    /// `since` tells a stale timer apart from one for a later press of the same key.
    HoldTimeout { key: KeyCode, since: Instant },
}

#[derive(Debug, PartialEq, Eq)]
pub enum FeatureResult {
    Continue(KeyEvent),
    /// Write the events, then keep processing the key event.
    EmitThen(Vec<OutputEvent>, KeyEvent),
    Emit(Vec<OutputEvent>),
    Consume,
}

pub struct Context<'a> {
    pub device_config: &'a KeyboardConfig,
    /// Oldest first; later layers take precedence.
    pub active_layers: &'a mut Vec<String>,
    /// Action each held key resolved to when it went down.
    pub held_actions: &'a mut HashMap<KeyCode, Action>,
    pub no_emit: bool,
}

pub trait Feature {
    fn name(&self) -> &'static str;

    fn on_event(&mut self, event: KeyEvent, ctx: &mut Context) -> Result<FeatureResult>;

    fn on_timer(
        &mut self,
        _msg: &TimerMsg,
        _ctx: &mut Context,
    ) -> Result<Option<Vec<OutputEvent>>> {
        Ok(None)
    }
}
