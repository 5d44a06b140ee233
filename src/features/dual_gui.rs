use crate::config::Action;
use crate::dual_role::{DualRole, Host, LogicalKey, OsStyle, Settings, Side};
use crate::features::layers::{activate_layer, deactivate_layer};
use crate::features::{Context, Feature, FeatureResult, KeyEvent, OutputEvent};
use anyhow::Result;
use colored::Colorize;
use evdev::KeyCode;
use log::info;
use std::time::Instant;

/// Runs resolved key events through the dual-role GUI engine.
pub struct DualGuiFeature {
    engine: DualRole,
}

impl DualGuiFeature {
    pub fn new(settings: Settings, overlay_layer: &str) -> Self {
        Self {
            engine: DualRole::new(settings, overlay_layer),
        }
    }
}

/// Collects what the engine asks for while it handles one event.
struct FeatureHost<'a, 'b> {
    ctx: &'a mut Context<'b>,
    now: Instant,
    out: Vec<OutputEvent>,
}

impl Host for FeatureHost<'_, '_> {
    fn now(&self) -> Instant {
        self.now
    }

    fn key_down(&mut self, key: KeyCode) {
        self.out.push(OutputEvent::Press(key));
    }

    fn key_up(&mut self, key: KeyCode) {
        self.out.push(OutputEvent::Release(key));
    }

    fn layer_on(&mut self, layer: &str) {
        activate_layer(self.ctx.active_layers, layer);
    }

    fn layer_off(&mut self, layer: &str) {
        deactivate_layer(self.ctx.active_layers, layer);
    }

    fn indicate(&mut self, style: OsStyle) {
        let label = match style {
            OsStyle::Mac => style.to_string().bright_white(),
            OsStyle::Windows => style.to_string().bright_cyan(),
        };
        info!("{} {}", "STYLE".purple(), label.bold());
    }
}

impl Feature for DualGuiFeature {
    fn name(&self) -> &'static str {
        "dual_role"
    }

    fn on_event(&mut self, event: KeyEvent, ctx: &mut Context) -> Result<FeatureResult> {
        let key = match &event.action {
            Action::GuiLeft => LogicalKey::Gui(Side::Left),
            Action::GuiRight => LogicalKey::Gui(Side::Right),
            Action::OsToggle => LogicalKey::OsToggle,
            // A chord is classified by its last key, the one the modifiers apply to.
            Action::Keys(keys) => match keys.last() {
                Some(key) => LogicalKey::Key(*key),
                None => return Ok(FeatureResult::Consume),
            },
            Action::TapHold { tap, .. } => LogicalKey::Key(*tap),
            Action::Momentary(_) | Action::Toggle(_) => {
                return Ok(FeatureResult::Continue(event));
            }
        };

        let mut host = FeatureHost {
            ctx,
            now: event.time,
            out: Vec::new(),
        };
        let forward = self
            .engine
            .handle_transition(&mut host, key, event.pressed());
        let out = host.out;

        Ok(match (forward, out.is_empty()) {
            (true, true) => FeatureResult::Continue(event),
            (true, false) => FeatureResult::EmitThen(out, event),
            (false, true) => FeatureResult::Consume,
            (false, false) => FeatureResult::Emit(out),
        })
    }
}
