use crate::{
    config::{Config, KeyboardConfig},
    features::{
        Context, Feature, FeatureResult, KeyEvent, OutputEvent, TimerMsg,
        dual_gui::DualGuiFeature, layers::LayersFeature, tap_hold::TapHoldFeature,
    },
    io::{KeySink, emit},
};
use anyhow::Result;
use crossbeam_channel::Sender;
use log::debug;
use std::time::Duration;

pub struct Pipeline {
    features: Vec<Box<dyn Feature + Send>>,
}

impl Pipeline {
    pub fn new(features: Vec<Box<dyn Feature + Send>>) -> Self {
        Self { features }
    }

    /// Layers resolve first so the dual-role engine sees logical keys. Tap/hold keys come
    /// last so a GUI-role chord has already applied its modifier when the tap is written.
    pub fn from_config(
        config: &Config,
        kb_config: &KeyboardConfig,
        timer_tx: Sender<TimerMsg>,
    ) -> Self {
        let mut features: Vec<Box<dyn Feature + Send>> = Vec::new();
        if config.feature_enabled("layers") {
            features.push(Box::new(LayersFeature::new()));
        }
        if config.feature_enabled("dual_role") {
            features.push(Box::new(DualGuiFeature::new(
                kb_config.settings(&config.globals),
                &kb_config.overlay_layer,
            )));
        }
        if config.feature_enabled("tap_hold") {
            features.push(Box::new(TapHoldFeature::new(
                Duration::from_millis(config.globals.tapping_term as u64),
                timer_tx,
            )));
        }
        Self::new(features)
    }

    pub fn process_timer(
        &mut self,
        sink: &mut impl KeySink,
        ctx: &mut Context,
        msg: TimerMsg,
    ) -> Result<()> {
        for feature in self.features.iter_mut() {
            if let Some(out) = feature.on_timer(&msg, ctx)? {
                emit(sink, &out, ctx.no_emit, feature.name())?;
            }
        }
        Ok(())
    }

    pub fn process_event(
        &mut self,
        sink: &mut impl KeySink,
        ctx: &mut Context,
        event: KeyEvent,
    ) -> Result<()> {
        let mut feature_name = "raw";

        let mut action = FeatureResult::Continue(event);
        for feature in self.features.iter_mut() {
            let event = match action {
                FeatureResult::Continue(e) => e,
                _ => break,
            };
            feature_name = feature.name();

            action = match feature.on_event(event, ctx)? {
                FeatureResult::EmitThen(out, e) => {
                    emit(sink, &out, ctx.no_emit, feature_name)?;
                    FeatureResult::Continue(e)
                }
                result => result,
            };
        }

        match action {
            FeatureResult::Continue(e) => match OutputEvent::for_event(&e) {
                Some(out) => emit(sink, &[out], ctx.no_emit, "raw"),
                None => {
                    debug!("Dropping {:?} for {:?}, nothing handles it", e.action, e.key);
                    Ok(())
                }
            },
            FeatureResult::Emit(out) => emit(sink, &out, ctx.no_emit, feature_name),
            FeatureResult::EmitThen(..) | FeatureResult::Consume => Ok(()),
        }
    }
}
