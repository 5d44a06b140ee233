use crate::config::{Action, KeyboardConfig};
use crate::consts::*;
use crate::features::{Context, Feature, FeatureResult, KeyEvent};
use anyhow::Result;
use colored::Colorize;
use evdev::KeyCode;
use log::debug;

/// Resolves physical keys through the layer stack and handles the layer keys themselves.
///
/// Each press is remembered in `Context::held_actions` so the release matches even if the
/// stack changed in between.
pub struct LayersFeature;

impl LayersFeature {
    pub fn new() -> Self {
        Self
    }
}

impl Feature for LayersFeature {
    fn name(&self) -> &'static str {
        "layers"
    }

    fn on_event(&mut self, event: KeyEvent, ctx: &mut Context) -> Result<FeatureResult> {
        let action = match event.state {
            PRESS => {
                let action = resolve(event.key, ctx.active_layers, ctx.device_config);
                ctx.held_actions.insert(event.key, action.clone());
                action
            }
            RELEASE => ctx
                .held_actions
                .remove(&event.key)
                .unwrap_or_else(|| resolve(event.key, ctx.active_layers, ctx.device_config)),
            _ => return Ok(FeatureResult::Consume),
        };

        match action {
            Action::Momentary(layer) => {
                if event.pressed() {
                    activate_layer(ctx.active_layers, &layer);
                } else {
                    deactivate_layer(ctx.active_layers, &layer);
                }
                log_layer(&layer, event.state);
                Ok(FeatureResult::Consume)
            }
            Action::Toggle(layer) => {
                if event.pressed() {
                    let state = if ctx.active_layers.contains(&layer) {
                        deactivate_layer(ctx.active_layers, &layer);
                        RELEASE
                    } else {
                        activate_layer(ctx.active_layers, &layer);
                        PRESS
                    };
                    log_layer(&layer, state);
                }
                Ok(FeatureResult::Consume)
            }
            action => Ok(FeatureResult::Continue(KeyEvent { action, ..event })),
        }
    }
}

/// Puts `layer` on top of the stack.
pub fn activate_layer(active_layers: &mut Vec<String>, layer: &str) {
    active_layers.retain(|l| l != layer);
    active_layers.push(layer.to_owned());
}

pub fn deactivate_layer(active_layers: &mut Vec<String>, layer: &str) {
    active_layers.retain(|l| l != layer);
}

pub fn resolve(key: KeyCode, active_layers: &[String], config: &KeyboardConfig) -> Action {
    active_layers
        .iter()
        .rev()
        .filter_map(|layer| config.layers.get(layer))
        .find_map(|layer_map| layer_map.get(&key))
        .or_else(|| config.mappings.get(&key))
        .cloned()
        .unwrap_or_else(|| Action::Keys(vec![key]))
}

fn log_layer(layer: &str, state: i32) {
    debug!(
        "[{}] {} [{}]",
        if state == PRESS {
            "↓".green().bold()
        } else {
            "↑".red().bold()
        },
        layer.bright_blue(),
        "layers".purple(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::{TestContext, press, release};
    use std::collections::HashMap;

    fn continued(result: FeatureResult) -> KeyEvent {
        match result {
            FeatureResult::Continue(event) => event,
            other => panic!("Expected Continue, got {other:?}"),
        }
    }

    #[test]
    fn test_unmapped_key_passes_through() {
        let mut test_ctx = TestContext::new();
        let mut feature = LayersFeature::new();

        let event = continued(
            feature
                .on_event(press(KeyCode::KEY_Z), &mut test_ctx.as_context())
                .unwrap(),
        );
        assert_eq!(event.action, Action::Keys(vec![KeyCode::KEY_Z]));
    }

    #[test]
    fn test_momentary_layer_while_held() {
        let mut config = KeyboardConfig::default();
        config
            .mappings
            .insert(KeyCode::KEY_CAPSLOCK, Action::Momentary("dir".into()));
        let mut test_ctx = TestContext::with_config(config);
        let mut feature = LayersFeature::new();

        let result = feature
            .on_event(press(KeyCode::KEY_CAPSLOCK), &mut test_ctx.as_context())
            .unwrap();
        assert_eq!(result, FeatureResult::Consume);
        assert_eq!(test_ctx.active_layers, vec!["dir".to_owned()]);

        let event = continued(
            feature
                .on_event(press(KeyCode::KEY_H), &mut test_ctx.as_context())
                .unwrap(),
        );
        assert_eq!(event.key, KeyCode::KEY_H);
        assert_eq!(event.action, Action::Keys(vec![KeyCode::KEY_LEFT]));

        feature
            .on_event(release(KeyCode::KEY_CAPSLOCK), &mut test_ctx.as_context())
            .unwrap();
        assert!(test_ctx.active_layers.is_empty());

        // Released after the layer went away, still resolves to what it pressed.
        let event = continued(
            feature
                .on_event(release(KeyCode::KEY_H), &mut test_ctx.as_context())
                .unwrap(),
        );
        assert_eq!(event.action, Action::Keys(vec![KeyCode::KEY_LEFT]));
    }

    #[test]
    fn test_toggle_layer_flips_on_press() {
        let mut config = KeyboardConfig::default();
        config
            .mappings
            .insert(KeyCode::KEY_F13, Action::Toggle("dir".into()));
        let mut test_ctx = TestContext::with_config(config);
        let mut feature = LayersFeature::new();

        feature
            .on_event(press(KeyCode::KEY_F13), &mut test_ctx.as_context())
            .unwrap();
        feature
            .on_event(release(KeyCode::KEY_F13), &mut test_ctx.as_context())
            .unwrap();
        assert_eq!(test_ctx.active_layers, vec!["dir".to_owned()]);

        feature
            .on_event(press(KeyCode::KEY_F13), &mut test_ctx.as_context())
            .unwrap();
        assert!(test_ctx.active_layers.is_empty());
    }

    #[test]
    fn test_latest_layer_wins() {
        let mut config = KeyboardConfig::default();
        config.layers.insert(
            "games".into(),
            HashMap::from([(KeyCode::KEY_H, Action::Keys(vec![KeyCode::KEY_A]))]),
        );
        let mut test_ctx = TestContext::with_config(config);
        test_ctx.active_layers = vec!["games".into(), "dir".into()];
        let mut feature = LayersFeature::new();

        let event = continued(
            feature
                .on_event(press(KeyCode::KEY_H), &mut test_ctx.as_context())
                .unwrap(),
        );
        assert_eq!(event.action, Action::Keys(vec![KeyCode::KEY_LEFT]));

        activate_layer(&mut test_ctx.active_layers, "games");
        let event = continued(
            feature
                .on_event(press(KeyCode::KEY_H), &mut test_ctx.as_context())
                .unwrap(),
        );
        assert_eq!(event.action, Action::Keys(vec![KeyCode::KEY_A]));
    }

    #[test]
    fn test_overlay_resolves_gui_roles() {
        let mut test_ctx = TestContext::new();
        let mut feature = LayersFeature::new();

        let event = continued(
            feature
                .on_event(press(KeyCode::KEY_LEFTMETA), &mut test_ctx.as_context())
                .unwrap(),
        );
        assert_eq!(event.action, Action::Keys(vec![KeyCode::KEY_LEFTMETA]));

        activate_layer(&mut test_ctx.active_layers, "windows");
        let event = continued(
            feature
                .on_event(press(KeyCode::KEY_RIGHTMETA), &mut test_ctx.as_context())
                .unwrap(),
        );
        assert_eq!(event.action, Action::GuiRight);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut layers = vec!["a".to_owned(), "b".to_owned()];
        activate_layer(&mut layers, "a");
        assert_eq!(layers, vec!["b".to_owned(), "a".to_owned()]);
        deactivate_layer(&mut layers, "a");
        deactivate_layer(&mut layers, "a");
        assert_eq!(layers, vec!["b".to_owned()]);
    }
}
