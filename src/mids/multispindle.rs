//! Multi-spindle result subscribe/unsubscribe: MID 0100/0103.
//!
//! Unlike every other subscribe handler, MID 0100 *rejects* an
//! over-maximum revision request with error 97 instead of downgrading —
//! see the asymmetry noted in the design notes.

use crate::codec;

use super::{send_ack, send_error, HandlerContext};

pub fn subscribe(ctx: &HandlerContext, msg: &codec::Message) {
    let requested = msg.revision as u32;
    let max = ctx
        .revisions
        .lock()
        .expect("revision registry poisoned")
        .max_rev(101);
    if requested > max {
        send_error(ctx, 100, 97);
        return;
    }

    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if state.subscriptions.multi_spindle.active {
        drop(state);
        send_error(ctx, 100, 9);
        return;
    }
    // Rev >= 2 carries an optional rewind point, rev >= 3 a send-only-new
    // flag; this controller ignores both and always streams fresh results.
    state.subscriptions.multi_spindle.active = true;
    state.subscriptions.multi_spindle.revision = requested;
    state.subscriptions.multi_spindle.no_ack = msg.no_ack;
    drop(state);

    send_ack(ctx, 100);
}

pub fn unsubscribe(ctx: &HandlerContext, _msg: &codec::Message) {
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if !state.subscriptions.multi_spindle.active {
        drop(state);
        send_error(ctx, 103, 10);
        return;
    }
    state.subscriptions.multi_spindle = Default::default();
    drop(state);
    send_ack(ctx, 103);
}
