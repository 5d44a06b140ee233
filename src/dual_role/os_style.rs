use crate::dual_role::Host;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OsStyle {
    #[default]
    Mac,
    Windows,
}

impl fmt::Display for OsStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsStyle::Mac => write!(f, "macOS"),
            OsStyle::Windows => write!(f, "Windows"),
        }
    }
}

/// Owns the macOS/Windows flag and the overlay layer it gates.
#[derive(Debug, Clone)]
pub struct OsStyleController {
    style: OsStyle,
    overlay_layer: String,
}

impl OsStyleController {
    pub fn new(overlay_layer: impl Into<String>) -> Self {
        Self {
            style: OsStyle::Mac,
            overlay_layer: overlay_layer.into(),
        }
    }

    pub fn style(&self) -> OsStyle {
        self.style
    }

    /// Flips the style. The overlay is switched before the indicator so lookups made after
    /// this returns already see the new layer state.
    pub fn toggle(&mut self, host: &mut impl Host) -> OsStyle {
        self.style = match self.style {
            OsStyle::Mac => {
                host.layer_on(&self.overlay_layer);
                OsStyle::Windows
            }
            OsStyle::Windows => {
                host.layer_off(&self.overlay_layer);
                OsStyle::Mac
            }
        };
        host.indicate(self.style);
        self.style
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dual_role::testing::{Call, RecordingHost};

    #[test]
    fn test_starts_as_mac() {
        assert_eq!(OsStyleController::new("windows").style(), OsStyle::Mac);
    }

    #[test]
    fn test_toggle_switches_layer_then_indicates() {
        let mut host = RecordingHost::new();
        let mut controller = OsStyleController::new("windows");

        assert_eq!(controller.toggle(&mut host), OsStyle::Windows);
        assert_eq!(
            host.take(),
            vec![
                Call::LayerOn("windows".into()),
                Call::Indicate(OsStyle::Windows)
            ]
        );
        assert!(host.layers.contains(&"windows".to_owned()));

        assert_eq!(controller.toggle(&mut host), OsStyle::Mac);
        assert_eq!(
            host.take(),
            vec![
                Call::LayerOff("windows".into()),
                Call::Indicate(OsStyle::Mac)
            ]
        );
        assert!(host.layers.is_empty());
    }
}
