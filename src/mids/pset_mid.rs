//! Parameter-set subscribe/select handlers (MID 0014/0016/0017/0018).

use crate::codec;
use crate::dispatcher::Message as OutMessage;
use crate::pset::is_none_id;
use crate::state::is_known_pset_table_id;

use super::{payloads, send_ack, send_error, HandlerContext};

fn push_pset_message(
    rev: u32,
    no_ack: bool,
    pset_id: &str,
    change_time: chrono::NaiveDateTime,
    batch_size: u32,
    batch_counter: u32,
    ok_counter: u32,
) -> OutMessage {
    let data = payloads::build_mid0015(rev, pset_id, change_time, batch_size, batch_counter, ok_counter);
    OutMessage::new(15, rev, data).no_ack(no_ack)
}

pub fn subscribe(ctx: &HandlerContext, msg: &codec::Message) {
    let requested = msg.revision as u32;
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if state.subscriptions.pset.active {
        drop(state);
        send_error(ctx, 14, 6);
        return;
    }
    let rev = ctx
        .revisions
        .lock()
        .expect("revision registry poisoned")
        .negotiate(15, requested);
    state.subscriptions.pset.active = true;
    state.subscriptions.pset.revision = rev;
    state.subscriptions.pset.no_ack = msg.no_ack;

    let push = if !is_none_id(&state.current_pset) {
        Some((
            state.current_pset.clone(),
            state.pset_change_time,
            state.active_pset_params().batch_size,
            state.batch.counter,
            state.ok_counter,
        ))
    } else {
        None
    };
    drop(state);

    send_ack(ctx, 14);
    if let Some((pset_id, change_time, batch_size, batch_counter, ok_counter)) = push {
        let out = push_pset_message(rev, msg.no_ack, &pset_id, change_time, batch_size, batch_counter, ok_counter);
        ctx.dispatcher.send(out);
    }
}

pub fn unsubscribe(ctx: &HandlerContext, _msg: &codec::Message) {
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if !state.subscriptions.pset.active {
        drop(state);
        send_error(ctx, 17, 7);
        return;
    }
    state.subscriptions.pset = Default::default();
    drop(state);
    send_ack(ctx, 17);
}

pub fn select(ctx: &HandlerContext, msg: &codec::Message) {
    let id = msg.data_str();
    let id = id.trim_start().to_string();
    let now = chrono::Local::now().naive_local();

    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if is_none_id(&id) {
        state.deselect_pset(now);
    } else if is_known_pset_table_id(&id) {
        state.select_pset(&id, now);
    } else {
        drop(state);
        send_error(ctx, 18, 2);
        return;
    }

    let push = if state.subscriptions.pset.active {
        Some((
            state.subscriptions.pset.revision,
            state.subscriptions.pset.no_ack,
            state.current_pset.clone(),
            state.pset_change_time,
            state.active_pset_params().batch_size,
            state.batch.counter,
            state.ok_counter,
        ))
    } else {
        None
    };
    drop(state);

    send_ack(ctx, 18);
    if let Some((rev, no_ack, pset_id, change_time, batch_size, batch_counter, ok_counter)) = push {
        let out = push_pset_message(rev, no_ack, &pset_id, change_time, batch_size, batch_counter, ok_counter);
        ctx.dispatcher.send(out);
    }
}
