use crate::config::{Config, KeyboardConfig};
use crate::consts::*;
use crate::features::{Context, KeyEvent, TimerMsg};
use crate::io::create_virtual_keyboard;
use crate::pipeline::Pipeline;
use anyhow::{Result, bail};
use crossbeam_channel::{select, unbounded};
use evdev::Device as EvDevDevice;
use evdev::{EventType, InputEvent, KeyCode};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};
use udev::Enumerator;

pub(crate) struct Keyboard {
    pub name: String,
    pub device: EvDevDevice,
    pub config: KeyboardConfig,
}

pub(crate) fn open_keyboard_devices(config: &Config) -> Result<Vec<Keyboard>> {
    debug!("Detecting keyboards");

    let mut enumerator = Enumerator::new()?;
    enumerator.match_subsystem("input")?;
    enumerator.match_property("ID_INPUT_KEYBOARD", "1")?;

    let mut keyboards = Vec::new();

    for device in enumerator.scan_devices()? {
        if let Some(devnode) = device.devnode()
            && let Ok(mut keyboard) = EvDevDevice::open(devnode)
        {
            let Some((name, keyboard_config)) = keyboard.name().and_then(|name_value| {
                config
                    .keyboards
                    .get(name_value)
                    .map(|kb_config| (name_value.to_owned(), kb_config.clone()))
            }) else {
                debug!("Keyboard Ignored: {:?}", keyboard.name());
                continue;
            };

            // Grabbing with keys down leaves them stuck on the real device
            let mut first = true;
            loop {
                let key_states = keyboard.get_key_state()?;
                if key_states.iter().next().is_none() {
                    break;
                }
                if first {
                    first = false;
                    warn!("Waiting for keys to be released");
                }
                thread::sleep(Duration::from_millis(20));
            }

            keyboard.grab()?;
            info!("Keyboard monitored: {}", name);

            keyboards.push(Keyboard {
                name,
                device: keyboard,
                config: keyboard_config,
            });
        }
    }

    if keyboards.is_empty() {
        bail!("No keyboards found");
    } else {
        Ok(keyboards)
    }
}

pub(crate) fn process(keyboard: Keyboard, config: &Config) -> Result<()> {
    let mut virt = create_virtual_keyboard(&keyboard.name)?;
    let mut device = keyboard.device;
    let kb_config = keyboard.config;
    let mut active_layers: Vec<String> = Vec::new();
    let mut held_actions = HashMap::new();
    // The sender stays alive here so `timer_rx` never disconnects, even with tap/hold disabled.
    let (timer_tx, timer_rx) = unbounded::<TimerMsg>();
    let mut pipeline = Pipeline::from_config(config, &kb_config, timer_tx.clone());
    let (tx, rx) = unbounded::<InputEvent>();

    thread::spawn(move || {
        while let Ok(events) = device.fetch_events() {
            for event in events {
                if tx.send(event).is_err() {
                    return;
                }
            }
        }
    });

    loop {
        let mut ctx = Context {
            device_config: &kb_config,
            active_layers: &mut active_layers,
            held_actions: &mut held_actions,
            no_emit: config.globals.no_emit,
        };

        select! {
            recv(rx) -> ev => {
                let Ok(event) = ev else { break };
                if event.event_type() != EventType::KEY {
                    continue;
                }
                let state = event.value();
                // Autorepeat
                if state > PRESS {
                    continue;
                }

                let key_event = KeyEvent::new(KeyCode(event.code()), state, Instant::now());
                pipeline.process_event(&mut virt, &mut ctx, key_event)?;
            }
            recv(timer_rx) -> msg => {
                if let Ok(msg) = msg {
                    pipeline.process_timer(&mut virt, &mut ctx, msg)?;
                }
            }
        }
    }

    info!("Keyboard disconnected: {}", keyboard.name);

    Ok(())
}
