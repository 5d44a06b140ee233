use crate::config::{Action, HoldAction};
use crate::features::layers::{activate_layer, deactivate_layer, resolve};
use crate::features::{Context, Feature, FeatureResult, KeyEvent, OutputEvent, TimerMsg};
use anyhow::Result;
use colored::Colorize;
use crossbeam_channel::Sender;
use evdev::KeyCode;
use log::debug;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Pending {
    key: KeyCode,
    tap: KeyCode,
    hold: HoldAction,
    since: Instant,
}

/// Keys that tap one thing and hold another: home-row mods and layer-taps.
///
/// One key is undecided at a time. It becomes a tap when released within the term and a hold
/// once the term runs out. Events arriving while it is undecided are buffered and replayed, in
/// order, after the decision.
pub struct TapHoldFeature {
    term: Duration,
    timer_tx: Sender<TimerMsg>,
    pending: Option<Pending>,
    buffer: Vec<KeyEvent>,
    /// Keys currently acting as their hold.
    holding: HashMap<KeyCode, HoldAction>,
}

fn schedule_hold_timer(
    key: KeyCode,
    since: Instant,
    duration: Duration,
    tx: Sender<TimerMsg>,
) {
    std::thread::spawn(move || {
        std::thread::sleep(duration);
        let _ = tx.send(TimerMsg::HoldTimeout { key, since });
    });
}

impl TapHoldFeature {
    pub fn new(term: Duration, timer_tx: Sender<TimerMsg>) -> Self {
        Self {
            term,
            timer_tx,
            pending: None,
            buffer: Vec::new(),
            holding: HashMap::new(),
        }
    }

    /// Returns the event when it should carry on down the pipeline untouched.
    fn step(
        &mut self,
        event: KeyEvent,
        ctx: &mut Context,
        out: &mut Vec<OutputEvent>,
    ) -> Option<KeyEvent> {
        if let Some(pending) = self.pending.take() {
            let elapsed = event.time.saturating_duration_since(pending.since);

            if event.key == pending.key && !event.pressed() {
                if elapsed < self.term {
                    log_decision(pending.key, "tap");
                    out.push(OutputEvent::Press(pending.tap));
                    out.push(OutputEvent::Release(pending.tap));
                    self.flush(ctx, false, out);
                } else {
                    let relayered = self.start_hold(pending, ctx, out);
                    self.flush(ctx, relayered, out);
                    self.end_hold(event.key, ctx, out);
                }
                return None;
            }

            if elapsed < self.term {
                self.pending = Some(pending);
                self.buffer.push(event);
                return None;
            }

            // The timer has not been delivered yet, but the term is over.
            self.buffer.push(event);
            let relayered = self.start_hold(pending, ctx, out);
            self.flush(ctx, relayered, out);
            return None;
        }

        if let Action::TapHold { tap, hold } = &event.action
            && event.pressed()
        {
            self.pending = Some(Pending {
                key: event.key,
                tap: *tap,
                hold: hold.clone(),
                since: event.time,
            });
            schedule_hold_timer(
                event.key,
                event.time,
                self.term.saturating_sub(event.time.elapsed()),
                self.timer_tx.clone(),
            );
            return None;
        }

        if !event.pressed() && self.holding.contains_key(&event.key) {
            self.end_hold(event.key, ctx, out);
            return None;
        }

        if matches!(event.action, Action::TapHold { .. }) {
            None
        } else {
            Some(event)
        }
    }

    /// Returns true when the hold switched layers.
    fn start_hold(
        &mut self,
        pending: Pending,
        ctx: &mut Context,
        out: &mut Vec<OutputEvent>,
    ) -> bool {
        log_decision(pending.key, "hold");
        let relayered = match &pending.hold {
            HoldAction::Key(key) => {
                out.push(OutputEvent::Press(*key));
                false
            }
            HoldAction::Layer(layer) => {
                activate_layer(ctx.active_layers, layer);
                true
            }
        };
        self.holding.insert(pending.key, pending.hold);
        relayered
    }

    fn end_hold(&mut self, key: KeyCode, ctx: &mut Context, out: &mut Vec<OutputEvent>) {
        match self.holding.remove(&key) {
            Some(HoldAction::Key(hold)) => out.push(OutputEvent::Release(hold)),
            Some(HoldAction::Layer(layer)) => deactivate_layer(ctx.active_layers, &layer),
            None => {}
        }
    }

    /// Replays buffered events. After a layer hold they are resolved again against the new stack.
    fn flush(&mut self, ctx: &mut Context, relayered: bool, out: &mut Vec<OutputEvent>) {
        let mut reresolved: HashMap<KeyCode, Action> = HashMap::new();

        for mut event in std::mem::take(&mut self.buffer) {
            if relayered {
                if event.pressed() {
                    let action = resolve(event.key, ctx.active_layers, ctx.device_config);
                    ctx.held_actions.insert(event.key, action.clone());
                    reresolved.insert(event.key, action.clone());
                    event.action = action;
                } else if let Some(action) = reresolved.remove(&event.key) {
                    ctx.held_actions.remove(&event.key);
                    event.action = action;
                }
            }

            if let Some(event) = self.step(event, ctx, out) {
                out.extend(OutputEvent::for_event(&event));
            }
        }
    }
}

impl Feature for TapHoldFeature {
    fn name(&self) -> &'static str {
        "tap_hold"
    }

    fn on_event(&mut self, event: KeyEvent, ctx: &mut Context) -> Result<FeatureResult> {
        let mut out = Vec::new();
        let passed = self.step(event, ctx, &mut out);

        Ok(match (passed, out.is_empty()) {
            (Some(event), true) => FeatureResult::Continue(event),
            (Some(event), false) => FeatureResult::EmitThen(out, event),
            (None, true) => FeatureResult::Consume,
            (None, false) => FeatureResult::Emit(out),
        })
    }

    fn on_timer(
        &mut self,
        msg: &TimerMsg,
        ctx: &mut Context,
    ) -> Result<Option<Vec<OutputEvent>>> {
        let TimerMsg::HoldTimeout { key, since } = *msg;
        let Some(pending) = self
            .pending
            .take_if(|pending| pending.key == key && pending.since == since)
        else {
            return Ok(None);
        };

        let mut out = Vec::new();
        let relayered = self.start_hold(pending, ctx, &mut out);
        self.flush(ctx, relayered, &mut out);
        Ok(Some(out))
    }
}

fn log_decision(key: KeyCode, decision: &str) {
    debug!(
        "[{}] {:?} {} [{}]",
        "?".yellow().bold(),
        key,
        decision.bright_blue(),
        "tap_hold".purple(),
    );
}
