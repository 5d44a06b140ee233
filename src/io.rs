use crate::consts::*;
use crate::features::OutputEvent;
use anyhow::{Result, anyhow};
use colored::Colorize;
use evdev::KeyCode;
use log::debug;
use uinput::device::Device as UInputDevice;

/// Where synthesized key events end up.
pub trait KeySink {
    fn write_key(&mut self, key: KeyCode, state: i32) -> Result<()>;

    fn synchronize(&mut self) -> Result<()>;
}

impl KeySink for UInputDevice {
    fn write_key(&mut self, key: KeyCode, state: i32) -> Result<()> {
        self.write(EV_KEY, key.0 as i32, state)?;
        Ok(())
    }

    fn synchronize(&mut self) -> Result<()> {
        UInputDevice::synchronize(self)?;
        Ok(())
    }
}

pub fn create_virtual_keyboard(name: &str) -> Result<UInputDevice> {
    let device = uinput::default()
        .map_err(|e| anyhow!("Failed to open /dev/uinput (sudo modprobe uinput): {e}"))?
        .name(format!("{} winmackeys", name))?
        .event(uinput::event::Keyboard::All)?
        .create()?;
    Ok(device)
}

pub fn emit(
    sink: &mut impl KeySink,
    events: &[OutputEvent],
    no_emit: bool,
    feature_name: &'static str,
) -> Result<()> {
    for event in events {
        match event {
            OutputEvent::Press(key) => write(sink, *key, PRESS, no_emit, feature_name)?,
            OutputEvent::Release(key) => write(sink, *key, RELEASE, no_emit, feature_name)?,
            OutputEvent::PressMany(keys) => {
                for key in keys {
                    write(sink, *key, PRESS, no_emit, feature_name)?;
                }
            }
            OutputEvent::ReleaseMany(keys) => {
                for key in keys.iter().rev() {
                    write(sink, *key, RELEASE, no_emit, feature_name)?;
                }
            }
        }
    }

    if !no_emit {
        sink.synchronize()?;
    }

    Ok(())
}

fn write(
    sink: &mut impl KeySink,
    key: KeyCode,
    state: i32,
    no_emit: bool,
    feature_name: &'static str,
) -> Result<()> {
    if !no_emit {
        sink.write_key(key, state)?;
    }

    debug!(
        "{}[{}] {:?} [{}]",
        if is_modifier(&key) { "    " } else { "" },
        if state == PRESS {
            "↓".green().bold()
        } else {
            "↑".red().bold()
        },
        key,
        feature_name.purple(),
    );

    Ok(())
}

fn is_modifier(key: &KeyCode) -> bool {
    matches!(
        *key,
        KeyCode::KEY_LEFTSHIFT
            | KeyCode::KEY_RIGHTSHIFT
            | KeyCode::KEY_LEFTCTRL
            | KeyCode::KEY_RIGHTCTRL
            | KeyCode::KEY_LEFTALT
            | KeyCode::KEY_RIGHTALT
            | KeyCode::KEY_LEFTMETA
            | KeyCode::KEY_RIGHTMETA
    )
}
