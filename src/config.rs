use crate::dual_role::Settings;
use anyhow::{Result, bail};
use evdev::KeyCode;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

pub(crate) fn config() -> Result<Config> {
    let config_path = match env::args().nth(1) {
        Some(arg_path) => PathBuf::from(arg_path),
        None => dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("winmackeys")
            .join("config.yml"),
    };

    let config = if !config_path.exists() {
        let config = Config::default();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_yaml::to_string(&config)?;
        fs::write(&config_path, serialized)?;
        info!("Default config written to {}", config_path.display());
        config
    } else {
        let config_content = fs::read_to_string(&config_path)?;
        serde_yaml::from_str(&config_content)?
    };

    config.validate()?;

    debug!("Config: {:#?}", config);

    Ok(config)
}

pub(crate) type Keyboards = HashMap<String, KeyboardConfig>;
pub(crate) type Mappings = HashMap<KeyCode, Action>;
pub(crate) type Layers = HashMap<String, Mappings>;
pub(crate) type Features = HashMap<String, bool>;

/// What a physical key does once layers are taken into account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Action {
    /// One key, or a chord pressed in order and released in reverse.
    Keys(Vec<KeyCode>),
    GuiLeft,
    GuiRight,
    OsToggle,
    /// Layer active while the key is held.
    Momentary(String),
    /// Layer flipped on every press.
    Toggle(String),
    /// `tap` when struck alone, `hold` once held past the tapping term or chorded.
    TapHold { tap: KeyCode, hold: HoldAction },
}

/// The held half of a tap/hold key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum HoldAction {
    Key(KeyCode),
    Layer(String),
}

impl Action {
    fn layer(&self) -> Option<&str> {
        match self {
            Action::Momentary(layer)
            | Action::Toggle(layer)
            | Action::TapHold {
                hold: HoldAction::Layer(layer),
                ..
            } => Some(layer),
            _ => None,
        }
    }

    fn mod_tap(tap: KeyCode, hold: KeyCode) -> Self {
        Action::TapHold {
            tap,
            hold: HoldAction::Key(hold),
        }
    }

    fn layer_tap(tap: KeyCode, layer: &str) -> Self {
        Action::TapHold {
            tap,
            hold: HoldAction::Layer(layer.to_owned()),
        }
    }
}

fn default_no_emit() -> bool {
    false
}

fn default_tapping_term() -> u16 {
    200
}

fn default_release_on_last_gui_up() -> bool {
    true
}

fn default_overlay_layer() -> String {
    "windows".to_owned()
}

fn default_alt_keys() -> Vec<KeyCode> {
    vec![KeyCode::KEY_TAB, KeyCode::KEY_SPACE]
}

fn default_mappings() -> Mappings {
    HashMap::from([
        (KeyCode::KEY_COMPOSE, Action::Momentary("fn".into())),
        // Home-row mods
        (
            KeyCode::KEY_A,
            Action::mod_tap(KeyCode::KEY_A, KeyCode::KEY_LEFTSHIFT),
        ),
        (
            KeyCode::KEY_S,
            Action::mod_tap(KeyCode::KEY_S, KeyCode::KEY_LEFTALT),
        ),
        (KeyCode::KEY_D, Action::layer_tap(KeyCode::KEY_D, "dir")),
        (
            KeyCode::KEY_F,
            Action::mod_tap(KeyCode::KEY_F, KeyCode::KEY_LEFTCTRL),
        ),
        (
            KeyCode::KEY_J,
            Action::mod_tap(KeyCode::KEY_J, KeyCode::KEY_RIGHTCTRL),
        ),
        (KeyCode::KEY_K, Action::layer_tap(KeyCode::KEY_K, "dir")),
        (
            KeyCode::KEY_L,
            Action::mod_tap(KeyCode::KEY_L, KeyCode::KEY_RIGHTALT),
        ),
        (
            KeyCode::KEY_SEMICOLON,
            Action::mod_tap(KeyCode::KEY_SEMICOLON, KeyCode::KEY_RIGHTSHIFT),
        ),
    ])
}

fn default_layers() -> Layers {
    HashMap::from([
        (
            "windows".into(),
            HashMap::from([
                (KeyCode::KEY_LEFTMETA, Action::GuiLeft),
                (KeyCode::KEY_RIGHTMETA, Action::GuiRight),
                (
                    KeyCode::KEY_F,
                    Action::mod_tap(KeyCode::KEY_F, KeyCode::KEY_LEFTMETA),
                ),
                (
                    KeyCode::KEY_J,
                    Action::mod_tap(KeyCode::KEY_J, KeyCode::KEY_RIGHTMETA),
                ),
            ]),
        ),
        (
            "no_tap_hold".into(),
            [
                KeyCode::KEY_A,
                KeyCode::KEY_S,
                KeyCode::KEY_D,
                KeyCode::KEY_F,
                KeyCode::KEY_J,
                KeyCode::KEY_K,
                KeyCode::KEY_L,
                KeyCode::KEY_SEMICOLON,
            ]
            .into_iter()
            .map(|key| (key, Action::Keys(vec![key])))
            .collect::<Mappings>(),
        ),
        (
            "dir".into(),
            HashMap::from([
                (KeyCode::KEY_H, Action::Keys(vec![KeyCode::KEY_LEFT])),
                (KeyCode::KEY_J, Action::Keys(vec![KeyCode::KEY_DOWN])),
                (KeyCode::KEY_K, Action::Keys(vec![KeyCode::KEY_UP])),
                (KeyCode::KEY_L, Action::Keys(vec![KeyCode::KEY_RIGHT])),
                // Number row as F-keys
                (KeyCode::KEY_1, Action::Keys(vec![KeyCode::KEY_F1])),
                (KeyCode::KEY_2, Action::Keys(vec![KeyCode::KEY_F2])),
                (KeyCode::KEY_3, Action::Keys(vec![KeyCode::KEY_F3])),
                (KeyCode::KEY_4, Action::Keys(vec![KeyCode::KEY_F4])),
                (KeyCode::KEY_5, Action::Keys(vec![KeyCode::KEY_F5])),
                (KeyCode::KEY_6, Action::Keys(vec![KeyCode::KEY_F6])),
                (KeyCode::KEY_7, Action::Keys(vec![KeyCode::KEY_F7])),
                (KeyCode::KEY_8, Action::Keys(vec![KeyCode::KEY_F8])),
                (KeyCode::KEY_9, Action::Keys(vec![KeyCode::KEY_F9])),
                (KeyCode::KEY_0, Action::Keys(vec![KeyCode::KEY_F10])),
                (KeyCode::KEY_MINUS, Action::Keys(vec![KeyCode::KEY_F11])),
                (KeyCode::KEY_EQUAL, Action::Keys(vec![KeyCode::KEY_F12])),
            ]),
        ),
        (
            "fn".into(),
            HashMap::from([
                (KeyCode::KEY_S, Action::OsToggle),
                (KeyCode::KEY_H, Action::Toggle("no_tap_hold".into())),
                // Task view
                (
                    KeyCode::KEY_T,
                    Action::Keys(vec![KeyCode::KEY_LEFTMETA, KeyCode::KEY_TAB]),
                ),
                // File explorer
                (
                    KeyCode::KEY_E,
                    Action::Keys(vec![KeyCode::KEY_LEFTMETA, KeyCode::KEY_E]),
                ),
                // Mac screenshot
                (
                    KeyCode::KEY_3,
                    Action::Keys(vec![
                        KeyCode::KEY_LEFTSHIFT,
                        KeyCode::KEY_LEFTMETA,
                        KeyCode::KEY_3,
                    ]),
                ),
                (
                    KeyCode::KEY_F1,
                    Action::Keys(vec![KeyCode::KEY_BRIGHTNESSDOWN]),
                ),
                (KeyCode::KEY_F2, Action::Keys(vec![KeyCode::KEY_BRIGHTNESSUP])),
                (KeyCode::KEY_F7, Action::Keys(vec![KeyCode::KEY_PREVIOUSSONG])),
                (KeyCode::KEY_F8, Action::Keys(vec![KeyCode::KEY_PLAYPAUSE])),
                (KeyCode::KEY_F9, Action::Keys(vec![KeyCode::KEY_NEXTSONG])),
                (KeyCode::KEY_F10, Action::Keys(vec![KeyCode::KEY_MUTE])),
                (KeyCode::KEY_F11, Action::Keys(vec![KeyCode::KEY_VOLUMEDOWN])),
                (KeyCode::KEY_F12, Action::Keys(vec![KeyCode::KEY_VOLUMEUP])),
            ]),
        ),
    ])
}

fn default_keyboards() -> Keyboards {
    HashMap::from([(
        "AT Translated Set 2 keyboard".to_owned(),
        KeyboardConfig::default(),
    )])
}

fn default_features() -> Features {
    HashMap::from([
        ("layers".to_owned(), true),
        ("dual_role".to_owned(), true),
        ("tap_hold".to_owned(), true),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub globals: Globals,
    #[serde(default = "default_features")]
    pub features: Features,
    #[serde(default = "default_keyboards")]
    pub keyboards: Keyboards,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Globals {
    /// Log what would be written without touching the virtual keyboard.
    #[serde(default = "default_no_emit")]
    pub no_emit: bool,
    /// Milliseconds
    #[serde(default = "default_tapping_term")]
    pub tapping_term: u16,
    #[serde(default = "default_release_on_last_gui_up")]
    pub release_on_last_gui_up: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct KeyboardConfig {
    /// Layer switched on by the Windows style
    #[serde(default = "default_overlay_layer")]
    pub overlay_layer: String,
    /// Keys that turn a held GUI-role key into ALT instead of CTRL
    #[serde(default = "default_alt_keys")]
    pub alt_keys: Vec<KeyCode>,
    #[serde(default = "default_mappings")]
    pub mappings: Mappings,
    #[serde(default = "default_layers")]
    pub layers: Layers,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            globals: Globals::default(),
            features: default_features(),
            keyboards: default_keyboards(),
        }
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            no_emit: default_no_emit(),
            tapping_term: default_tapping_term(),
            release_on_last_gui_up: default_release_on_last_gui_up(),
        }
    }
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            overlay_layer: default_overlay_layer(),
            alt_keys: default_alt_keys(),
            mappings: default_mappings(),
            layers: default_layers(),
        }
    }
}

impl Config {
    pub fn feature_enabled(&self, name: &str) -> bool {
        *self.features.get(name).unwrap_or(&false)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, keyboard) in &self.keyboards {
            if !keyboard.layers.contains_key(&keyboard.overlay_layer) {
                bail!(
                    "Keyboard '{name}': overlay layer '{}' is not defined",
                    keyboard.overlay_layer
                );
            }

            let actions = keyboard
                .mappings
                .values()
                .chain(keyboard.layers.values().flat_map(|layer| layer.values()));
            for action in actions {
                if let Some(layer) = action.layer()
                    && !keyboard.layers.contains_key(layer)
                {
                    bail!("Keyboard '{name}': layer '{layer}' is not defined");
                }
                if let Action::Keys(keys) = action
                    && keys.is_empty()
                {
                    bail!("Keyboard '{name}': empty key list");
                }
            }

            // One physical key per side; the same key may appear in several layers.
            for (role, label) in [
                (Action::GuiLeft, "gui_left"),
                (Action::GuiRight, "gui_right"),
            ] {
                let keys = keyboard
                    .mappings
                    .iter()
                    .chain(keyboard.layers.values().flat_map(|layer| layer.iter()))
                    .filter(|(_, action)| **action == role)
                    .map(|(key, _)| *key)
                    .collect::<HashSet<KeyCode>>();
                if keys.len() > 1 {
                    bail!(
                        "Keyboard '{name}': {label} is bound to {} keys, only one allowed",
                        keys.len()
                    );
                }
            }
        }
        Ok(())
    }
}

impl KeyboardConfig {
    pub fn settings(&self, globals: &Globals) -> Settings {
        Settings {
            tapping_term: Duration::from_millis(globals.tapping_term as u64),
            alt_keys: self.alt_keys.iter().copied().collect::<HashSet<KeyCode>>(),
            release_on_last_gui_up: globals.release_on_last_gui_up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_default_config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.keyboards.len(), 1);
        assert_eq!(parsed.globals.tapping_term, 200);
        let keyboard = &parsed.keyboards["AT Translated Set 2 keyboard"];
        assert_eq!(
            keyboard.layers["windows"][&KeyCode::KEY_LEFTMETA],
            Action::GuiLeft
        );
        assert_eq!(keyboard.mappings, default_mappings());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let parsed: Config = serde_yaml::from_str("globals:\n  tapping_term: 150\n").unwrap();
        assert_eq!(parsed.globals.tapping_term, 150);
        assert!(parsed.globals.release_on_last_gui_up);
        assert!(!parsed.globals.no_emit);
        assert!(parsed.feature_enabled("dual_role"));
        assert!(parsed.feature_enabled("tap_hold"));
        assert!(!parsed.feature_enabled("unknown"));
    }

    #[test]
    fn test_unknown_layer_is_rejected() {
        let mut config = Config::default();
        let keyboard = config.keyboards.values_mut().next().unwrap();
        keyboard
            .mappings
            .insert(KeyCode::KEY_F13, Action::Toggle("steno".into()));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_second_gui_key_on_one_side_is_rejected() {
        let mut config = Config::default();
        let keyboard = config.keyboards.values_mut().next().unwrap();
        keyboard
            .mappings
            .insert(KeyCode::KEY_LEFTALT, Action::GuiLeft);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gui_key_repeated_across_layers_is_accepted() {
        let mut config = Config::default();
        let keyboard = config.keyboards.values_mut().next().unwrap();
        keyboard
            .layers
            .get_mut("fn")
            .unwrap()
            .insert(KeyCode::KEY_RIGHTMETA, Action::GuiRight);
        config.validate().unwrap();
    }

    #[test]
    fn test_layer_tap_to_unknown_layer_is_rejected() {
        let mut config = Config::default();
        let keyboard = config.keyboards.values_mut().next().unwrap();
        keyboard
            .mappings
            .insert(KeyCode::KEY_G, Action::layer_tap(KeyCode::KEY_G, "steno"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_home_row_mods() {
        let keyboard = KeyboardConfig::default();
        assert_eq!(
            keyboard.mappings[&KeyCode::KEY_A],
            Action::TapHold {
                tap: KeyCode::KEY_A,
                hold: HoldAction::Key(KeyCode::KEY_LEFTSHIFT)
            }
        );
        assert_eq!(
            keyboard.mappings[&KeyCode::KEY_K],
            Action::TapHold {
                tap: KeyCode::KEY_K,
                hold: HoldAction::Layer("dir".into())
            }
        );
        assert_eq!(
            keyboard.layers["no_tap_hold"][&KeyCode::KEY_A],
            Action::Keys(vec![KeyCode::KEY_A])
        );
    }

    #[test]
    fn test_missing_overlay_is_rejected() {
        let mut config = Config::default();
        let keyboard = config.keyboards.values_mut().next().unwrap();
        keyboard.overlay_layer = "linux".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_from_globals() {
        let globals = Globals {
            tapping_term: 120,
            release_on_last_gui_up: false,
            ..Default::default()
        };
        let settings = KeyboardConfig::default().settings(&globals);
        assert_eq!(settings.tapping_term, Duration::from_millis(120));
        assert!(!settings.release_on_last_gui_up);
        assert!(settings.alt_keys.contains(&KeyCode::KEY_SPACE));
        assert!(!settings.alt_keys.contains(&KeyCode::KEY_C));
    }
}
