//! Dual-role GUI keys.
//!
//! Two GUI-role keys tap the GUI modifier when struck alone and turn into a held ALT or CTRL
//! once another key is pressed with them. Which of the two is decided by that other key:
//! the configured ALT keys (Tab and Space by default, for alt-tab and launcher chords) resolve
//! to ALT, anything else to CTRL.

pub mod engine;
pub mod hold;
pub mod modifier;
pub mod os_style;

pub use engine::{DualRole, LogicalKey, Settings};
pub use modifier::Side;
pub use os_style::OsStyle;

use evdev::KeyCode;
use std::time::Instant;

/// Primitives the engine drives. Every call is fire-and-forget.
pub trait Host {
    fn now(&self) -> Instant;

    fn key_down(&mut self, key: KeyCode);

    fn key_up(&mut self, key: KeyCode);

    fn tap(&mut self, key: KeyCode) {
        self.key_down(key);
        self.key_up(key);
    }

    fn layer_on(&mut self, layer: &str);

    fn layer_off(&mut self, layer: &str);

    /// Visual confirmation of a style switch.
    fn indicate(&mut self, _style: OsStyle) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{Host, OsStyle};
    use evdev::KeyCode;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Down(KeyCode),
        Up(KeyCode),
        LayerOn(String),
        LayerOff(String),
        Indicate(OsStyle),
    }

    /// Host with a hand-driven clock that records everything it is asked to do.
    pub struct RecordingHost {
        pub clock: Instant,
        pub calls: Vec<Call>,
        pub layers: Vec<String>,
        pub down: HashSet<KeyCode>,
    }

    impl RecordingHost {
        pub fn new() -> Self {
            Self {
                clock: Instant::now(),
                calls: Vec::new(),
                layers: Vec::new(),
                down: HashSet::new(),
            }
        }

        pub fn advance(&mut self, ms: u64) {
            self.clock += Duration::from_millis(ms);
        }

        pub fn take(&mut self) -> Vec<Call> {
            std::mem::take(&mut self.calls)
        }
    }

    impl Host for RecordingHost {
        fn now(&self) -> Instant {
            self.clock
        }

        fn key_down(&mut self, key: KeyCode) {
            self.down.insert(key);
            self.calls.push(Call::Down(key));
        }

        fn key_up(&mut self, key: KeyCode) {
            self.down.remove(&key);
            self.calls.push(Call::Up(key));
        }

        fn layer_on(&mut self, layer: &str) {
            if !self.layers.iter().any(|l| l == layer) {
                self.layers.push(layer.to_owned());
            }
            self.calls.push(Call::LayerOn(layer.to_owned()));
        }

        fn layer_off(&mut self, layer: &str) {
            self.layers.retain(|l| l != layer);
            self.calls.push(Call::LayerOff(layer.to_owned()));
        }

        fn indicate(&mut self, style: OsStyle) {
            self.calls.push(Call::Indicate(style));
        }
    }
}
