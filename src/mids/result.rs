//! Tightening result subscribe/unsubscribe: MID 0060/0063.
//!
//! Subscribing never pushes immediately — results only arrive through the
//! simulator (periodic loop or an ad-hoc trigger), per the data model.

use crate::codec;

use super::{send_ack, send_error, HandlerContext};

pub fn subscribe(ctx: &HandlerContext, msg: &codec::Message) {
    let requested = msg.revision as u32;
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if state.subscriptions.result.active {
        drop(state);
        send_error(ctx, 60, 9);
        return;
    }
    let rev = ctx
        .revisions
        .lock()
        .expect("revision registry poisoned")
        .negotiate(61, requested);
    state.subscriptions.result.active = true;
    state.subscriptions.result.revision = rev;
    state.subscriptions.result.no_ack = msg.no_ack;
    drop(state);

    send_ack(ctx, 60);
}

pub fn unsubscribe(ctx: &HandlerContext, _msg: &codec::Message) {
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if !state.subscriptions.result.active {
        drop(state);
        send_error(ctx, 63, 10);
        return;
    }
    state.subscriptions.result = Default::default();
    drop(state);
    send_ack(ctx, 63);
}
