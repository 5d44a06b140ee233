use crate::dual_role::hold::{Hold, Released};
use crate::dual_role::modifier::{Family, Modifier, Side};
use crate::dual_role::os_style::{OsStyle, OsStyleController};
use crate::dual_role::Host;
use evdev::KeyCode;
use log::{debug, warn};
use std::collections::HashSet;
use std::time::Duration;

/// A key as seen after layer resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalKey {
    Gui(Side),
    OsToggle,
    Key(KeyCode),
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Releases shorter than this count as a tap of the GUI key.
    pub tapping_term: Duration,
    /// Keys that resolve a held GUI-role key to ALT. Everything else resolves to CTRL.
    pub alt_keys: HashSet<KeyCode>,
    /// Send the key-up for a resolved modifier when the last GUI-role key goes up.
    /// When false the modifier stays down in the OS until a toggle or a re-resolution.
    pub release_on_last_gui_up: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tapping_term: Duration::from_millis(200),
            alt_keys: HashSet::from([KeyCode::KEY_TAB, KeyCode::KEY_SPACE]),
            release_on_last_gui_up: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    OsToggle,
    Gui(Side),
    Chord(Family),
}

pub struct DualRole {
    settings: Settings,
    hold: Hold,
    resolved: Option<Modifier>,
    os_style: OsStyleController,
}

impl DualRole {
    pub fn new(settings: Settings, overlay_layer: impl Into<String>) -> Self {
        Self {
            settings,
            hold: Hold::Idle,
            resolved: None,
            os_style: OsStyleController::new(overlay_layer),
        }
    }

    pub fn hold(&self) -> Hold {
        self.hold
    }

    pub fn resolved(&self) -> Option<Modifier> {
        self.resolved
    }

    pub fn style(&self) -> OsStyle {
        self.os_style.style()
    }

    fn classify(&self, key: LogicalKey) -> Class {
        match key {
            LogicalKey::OsToggle => Class::OsToggle,
            LogicalKey::Gui(side) => Class::Gui(side),
            LogicalKey::Key(code) if self.settings.alt_keys.contains(&code) => {
                Class::Chord(Family::Alt)
            }
            LogicalKey::Key(_) => Class::Chord(Family::Ctrl),
        }
    }

    /// Feeds one key transition through the engine. Returns whether the host should still
    /// forward the original transition.
    pub fn handle_transition(
        &mut self,
        host: &mut impl Host,
        key: LogicalKey,
        pressed: bool,
    ) -> bool {
        match (self.classify(key), pressed) {
            (Class::OsToggle, true) => {
                self.release_resolved(host);
                self.os_style.toggle(host);
                false
            }
            (Class::OsToggle, false) => false,
            (Class::Gui(side), true) => {
                self.hold = self.hold.press(side, host.now());
                false
            }
            (Class::Gui(side), false) => {
                self.gui_released(host, side);
                false
            }
            (Class::Chord(family), true) => {
                if let Some(side) = self.hold.side() {
                    self.resolve(host, Modifier::new(family, side));
                }
                true
            }
            // The resolved modifier outlives the chord key; only the GUI-role key ends it.
            (Class::Chord(_), false) => true,
        }
    }

    fn gui_released(&mut self, host: &mut impl Host, side: Side) {
        let (hold, released) = self.hold.release(side, host.now());
        self.hold = hold;

        match released {
            Released::StillHeld => {}
            Released::Unmatched => {
                warn!("GUI-role release without a matching press ({side:?})");
            }
            Released::Last { side, held_for } => {
                if self.settings.release_on_last_gui_up {
                    self.release_resolved(host);
                } else if let Some(modifier) = self.resolved.take() {
                    debug!("Leaving {modifier} down after GUI-role release");
                }

                // Taps even when a chord resolved during a short hold, as the keymap always has.
                if held_for < self.settings.tapping_term {
                    debug!("GUI-role tap after {}ms", held_for.as_millis());
                    host.tap(side.gui());
                }
            }
        }
    }

    fn resolve(&mut self, host: &mut impl Host, wanted: Modifier) {
        // Same family already down: leave it so chords like alt-tab can repeat.
        if let Some(current) = self.resolved
            && current.family == wanted.family
        {
            return;
        }

        self.release_resolved(host);
        debug!("GUI-role resolved to {wanted}");
        host.key_down(wanted.key());
        self.resolved = Some(wanted);
    }

    fn release_resolved(&mut self, host: &mut impl Host) {
        if let Some(modifier) = self.resolved.take() {
            host.key_up(modifier.key());
        }
    }
}
