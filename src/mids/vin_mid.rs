//! VIN handlers: MID 0050 (download), 0051 (subscribe), 0054 (unsubscribe).

use crate::codec;
use crate::dispatcher::Message as OutMessage;
use crate::vin::Vin;

use super::{payloads, send_ack, send_error, HandlerContext};

fn push_vin_message(rev: u32, no_ack: bool, vin: &str, part2: &str, part3: &str, part4: &str) -> OutMessage {
    let data = payloads::build_mid0052(rev, vin, part2, part3, part4);
    OutMessage::new(52, rev, data).no_ack(no_ack)
}

/// Download a new VIN. Parse failures still ack — the VIN is stored as
/// the fallback decomposition per the data model, never rejected.
pub fn download(ctx: &HandlerContext, msg: &codec::Message) {
    let raw = msg.data_str();

    let mut state = ctx.state.lock().expect("state mutex poisoned");
    state.vin = Vin::parse(raw.trim_end());
    state.batch.counter = 0;

    let push = if state.subscriptions.vin.active {
        Some((
            state.subscriptions.vin.revision,
            state.subscriptions.vin.no_ack,
            state.vin.as_string(),
            state.vin_identifier_part2.clone(),
            state.vin_identifier_part3.clone(),
            state.vin_identifier_part4.clone(),
        ))
    } else {
        None
    };
    drop(state);

    send_ack(ctx, 50);
    if let Some((rev, no_ack, vin, p2, p3, p4)) = push {
        ctx.dispatcher.send(push_vin_message(rev, no_ack, &vin, &p2, &p3, &p4));
    }
}

pub fn subscribe(ctx: &HandlerContext, msg: &codec::Message) {
    let requested = msg.revision as u32;
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if state.subscriptions.vin.active {
        drop(state);
        send_error(ctx, 51, 6);
        return;
    }
    let rev = ctx
        .revisions
        .lock()
        .expect("revision registry poisoned")
        .negotiate(52, requested);
    state.subscriptions.vin.active = true;
    state.subscriptions.vin.revision = rev;
    state.subscriptions.vin.no_ack = msg.no_ack;

    let vin = state.vin.as_string();
    let (p2, p3, p4) = (
        state.vin_identifier_part2.clone(),
        state.vin_identifier_part3.clone(),
        state.vin_identifier_part4.clone(),
    );
    drop(state);

    send_ack(ctx, 51);
    ctx.dispatcher.send(push_vin_message(rev, msg.no_ack, &vin, &p2, &p3, &p4));
}

/// Advance the VIN to the next value and, if a subscriber is listening,
/// push the updated MID 0052. Called by the simulator when a batch
/// completes.
pub fn increment_and_push(ctx: &HandlerContext) {
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    state.vin.increment();
    let push = if state.subscriptions.vin.active {
        Some((
            state.subscriptions.vin.revision,
            state.subscriptions.vin.no_ack,
            state.vin.as_string(),
            state.vin_identifier_part2.clone(),
            state.vin_identifier_part3.clone(),
            state.vin_identifier_part4.clone(),
        ))
    } else {
        None
    };
    drop(state);

    if let Some((rev, no_ack, vin, p2, p3, p4)) = push {
        ctx.dispatcher.send(push_vin_message(rev, no_ack, &vin, &p2, &p3, &p4));
    }
}

pub fn unsubscribe(ctx: &HandlerContext, _msg: &codec::Message) {
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if !state.subscriptions.vin.active {
        drop(state);
        send_error(ctx, 54, 7);
        return;
    }
    state.subscriptions.vin = Default::default();
    drop(state);
    send_ack(ctx, 54);
}
