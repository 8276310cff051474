//! Tool handlers: MID 0040 (request data), 0042 (disable), 0043 (enable).

use crate::codec;
use crate::dispatcher::Message as OutMessage;

use super::{payloads, send_ack, HandlerContext};

/// Build the MID 0041 payload at the negotiated revision under the state
/// lock, then hand it to the dispatcher after releasing the guard.
fn build_and_send(ctx: &HandlerContext, rev: u32, no_ack: bool) {
    let state = ctx.state.lock().expect("state mutex poisoned");
    let data = payloads::build_mid0041(
        rev,
        &state.tool,
        state.tool_lifetime_tightenings,
        &state.identification.controller_serial,
        &state.identification.controller_software_version,
    );
    drop(state);
    ctx.dispatcher.send(OutMessage::new(41, rev, data).no_ack(no_ack));
}

pub fn request_data(ctx: &HandlerContext, msg: &codec::Message) {
    let requested = msg.revision as u32;
    let rev = ctx
        .revisions
        .lock()
        .expect("revision registry poisoned")
        .negotiate(41, requested);
    build_and_send(ctx, rev, msg.no_ack);
}

pub fn disable(ctx: &HandlerContext, msg: &codec::Message) {
    ctx.state.lock().expect("state mutex poisoned").tool_enabled = false;
    send_ack(ctx, 42);

    ctx.dispatcher
        .send(OutMessage::new(40, 1, payloads::build_mid0040()).no_ack(msg.no_ack));
}

pub fn enable(ctx: &HandlerContext, msg: &codec::Message) {
    ctx.state.lock().expect("state mutex poisoned").tool_enabled = true;
    send_ack(ctx, 43);

    let rev = ctx
        .revisions
        .lock()
        .expect("revision registry poisoned")
        .negotiate(41, msg.revision as u32);
    build_and_send(ctx, rev, msg.no_ack);
}
