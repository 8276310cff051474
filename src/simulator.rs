//! Tightening-result simulator: single-spindle (MID 0061) and multi-spindle
//! (MID 0101) generation, plus the cancellation-aware periodic emitter
//! spawned when a session starts.
//!
//! Every emission follows the same discipline as the MID handlers: compute
//! everything under the state lock, drop the guard, then hand the built
//! frame to the dispatcher.

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use crate::dispatcher::Message as OutMessage;
use crate::mids::payloads::{self, MultiSpindleResult, SpindleResult, TighteningResult};
use crate::mids::{vin_mid, HandlerContext};
use crate::pset::Pset;

/// One spindle's drawn measurement, before it's packed into a payload.
struct SpindleDraw {
    torque: f64,
    angle: i32,
    torque_status: u8,
    angle_status: u8,
    ok: bool,
}

fn to_hundredths(v: f64) -> i64 {
    (v * 100.0).round() as i64
}

/// Draw one spindle's result against `pset`'s tolerances. With probability
/// `nok_probability` one of torque/angle is redrawn into the adjacent
/// out-of-range band (step 4 of the single-spindle procedure); the other
/// field stays an in-range, "OK" draw.
fn draw_spindle(pset: &Pset, nok_probability: f64, rng: &mut impl Rng) -> SpindleDraw {
    let nok_probability = nok_probability.clamp(0.0, 1.0);
    let is_nok = rng.random_bool(nok_probability);

    let mut torque = rng.random_range(pset.min_torque..=pset.max_torque);
    let mut angle = rng.random_range(pset.min_angle..=pset.max_angle);
    let mut torque_status = 1u8;
    let mut angle_status = 1u8;

    if is_nok {
        let offend_torque = rng.random_bool(0.5);
        let low = rng.random_bool(0.5);
        if offend_torque {
            torque = if low {
                rng.random_range((pset.min_torque - 5.0)..(pset.min_torque - 0.1))
            } else {
                rng.random_range((pset.max_torque + 0.1)..(pset.max_torque + 5.0))
            };
            torque_status = if low { 0 } else { 2 };
        } else {
            angle = if low {
                rng.random_range((pset.min_angle - 20)..(pset.min_angle - 1))
            } else {
                rng.random_range((pset.max_angle + 1)..(pset.max_angle + 20))
            };
            angle_status = if low { 0 } else { 2 };
        }
    }

    SpindleDraw {
        torque,
        angle,
        torque_status,
        angle_status,
        ok: !is_nok,
    }
}

/// Emit one single-spindle tightening result (MID 0061), advancing the
/// tightening id, tool lifetime counters, batch counter, and (on batch
/// completion) the VIN. A no-op, logged at debug, if session/subscription/
/// tool-enabled preconditions aren't all met.
pub fn generate_single_spindle(ctx: &HandlerContext) {
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if !(state.session_active && state.subscriptions.result.active && state.tool_enabled) {
        log::debug!("single-spindle result emission skipped: preconditions unmet");
        return;
    }

    let tightening_id = state.next_tightening_id();
    let pset = state.active_pset_params();
    let mut rng = rand::rng();
    let draw = draw_spindle(&pset, state.nok_probability, &mut rng);

    state.tool_lifetime_tightenings += 1;
    state.tool.tightenings_since_service += 1;

    let target = pset.batch_size;
    if draw.ok {
        state.ok_counter += 1;
        if target > 0 {
            state.batch.counter += 1;
        }
    }
    let batch_complete = state.batch.is_complete(target);

    let now = chrono::Local::now().naive_local();
    let result = TighteningResult {
        cell_id: state.identification.cell_id,
        channel_id: state.identification.channel_id,
        controller_name: state.identification.name.clone(),
        vin: state.vin.as_string(),
        job_id: 0,
        pset_id: state.current_pset.clone(),
        batch_size: target,
        batch_counter: state.batch.counter,
        status_ok: draw.ok,
        torque_status: draw.torque_status,
        angle_status: draw.angle_status,
        torque_min_hundredths: to_hundredths(pset.min_torque),
        torque_max_hundredths: to_hundredths(pset.max_torque),
        torque_target_hundredths: to_hundredths(pset.target_torque),
        torque_final_hundredths: to_hundredths(draw.torque),
        angle_min: pset.min_angle,
        angle_max: pset.max_angle,
        angle_target: pset.target_angle,
        angle_final: draw.angle,
        timestamp: now,
        pset_change_time: state.pset_change_time,
        batch_complete,
        tightening_id,
        strategy_code: 0,
        strategy_options: String::new(),
        tightening_error_status_2: 0,
        stage_result_count: 0,
    };

    let rev = state.subscriptions.result.revision;
    let no_ack = state.subscriptions.result.no_ack;
    if batch_complete {
        state.batch.counter = 0;
    }
    drop(state);

    let data = payloads::build_mid0061(rev, &result);
    ctx.dispatcher
        .send(OutMessage::new(61, rev, data).no_ack(no_ack));

    log::info!(
        "tightening result #{tightening_id}: {} (batch {}/{})",
        if result.status_ok { "OK" } else { "NOK" },
        result.batch_counter,
        result.batch_size
    );

    if batch_complete {
        vin_mid::increment_and_push(ctx);
    }
}

/// Emit one multi-spindle result (MID 0101) across every configured
/// spindle. Overall status is the AND of all per-spindle draws; unlike
/// single-spindle emission this never touches batch/VIN state (§4.6).
pub fn generate_multi_spindle(ctx: &HandlerContext) {
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if !(state.session_active && state.subscriptions.multi_spindle.active && state.tool_enabled) {
        log::debug!("multi-spindle result emission skipped: preconditions unmet");
        return;
    }

    let pset = state.active_pset_params();
    let num_spindles = state.num_spindles.max(1);
    let mut rng = rand::rng();
    let mut spindles = Vec::with_capacity(num_spindles as usize);
    for i in 0..num_spindles {
        let draw = draw_spindle(&pset, state.nok_probability, &mut rng);
        spindles.push(SpindleResult {
            number: i + 1,
            channel: i + 1,
            status_ok: draw.ok,
            torque_status: draw.torque_status,
            torque_hundredths: to_hundredths(draw.torque),
            angle_status: draw.angle_status,
            angle: draw.angle,
        });
    }

    let sync_tightening_id = state.next_sync_tightening_id();
    let now = chrono::Local::now().naive_local();
    let result = MultiSpindleResult {
        num_spindles,
        vin: state.vin.as_string(),
        job_id: 0,
        pset_id: state.current_pset.clone(),
        batch_size: pset.batch_size,
        batch_counter: state.batch.counter,
        torque_min_hundredths: to_hundredths(pset.min_torque),
        torque_max_hundredths: to_hundredths(pset.max_torque),
        torque_target_hundredths: to_hundredths(pset.target_torque),
        angle_min: pset.min_angle,
        angle_max: pset.max_angle,
        angle_target: pset.target_angle,
        pset_change_time: state.pset_change_time,
        timestamp: now,
        sync_tightening_id,
        spindles,
    };

    let rev = state.subscriptions.multi_spindle.revision;
    let no_ack = state.subscriptions.multi_spindle.no_ack;
    drop(state);

    let data = payloads::build_mid0101(rev, &result);
    ctx.dispatcher
        .send(OutMessage::new(101, rev, data).no_ack(no_ack));
}

/// Spawn the periodic single-spindle emitter for one session. Waits
/// `auto_loop_interval_secs`, checks preconditions, emits, repeats — until
/// the session ends or the returned sender is used to cancel it. Per the
/// design notes, a single cancellation-aware sleep replaces the source's
/// one-second polling decomposition.
pub fn spawn_periodic_loop(ctx: HandlerContext) -> watch::Sender<bool> {
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        loop {
            let interval = {
                let state = ctx.state.lock().expect("state mutex poisoned");
                if !state.session_active {
                    break;
                }
                Duration::from_secs(state.auto_loop_interval_secs.max(1))
            };

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel_rx.changed() => break,
            }

            let should_emit = {
                let state = ctx.state.lock().expect("state mutex poisoned");
                state.session_active
                    && state.subscriptions.result.active
                    && state.auto_loop_enabled
            };
            if !should_emit {
                let still_active = ctx.state.lock().expect("state mutex poisoned").session_active;
                if !still_active {
                    break;
                }
                continue;
            }
            generate_single_spindle(&ctx);
        }
        log::debug!("periodic result loop ended");
    });
    cancel_tx
}
