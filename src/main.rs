mod config;
mod consts;
mod dual_role;
mod features;
mod io;
mod keyboard;
mod pipeline;

use crate::{
    config::config,
    keyboard::{open_keyboard_devices, process},
};
use anyhow::Result;
use log::error;
use std::thread;

fn main() -> Result<()> {
    env_logger::init();
    let config = config()?;
    let keyboards = open_keyboard_devices(&config)?;

    let mut handles = Vec::new();
    for keyboard in keyboards {
        let config = config.clone();

        let handle = thread::spawn(move || {
            let name = keyboard.name.clone();
            if let Err(e) = process(keyboard, &config) {
                error!("{name}: {e:#}");
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        if handle.join().is_err() {
            error!("Keyboard thread panicked");
        }
    }

    Ok(())
}
