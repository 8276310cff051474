//! Session lifecycle: MID 0001 start, 0003 stop, 9999 keep-alive.

use crate::codec;
use crate::dispatcher::Message as OutMessage;

use super::{cancel_periodic_loop, payloads, send_ack, send_error, HandlerContext};

pub fn start(ctx: &HandlerContext, msg: &codec::Message) {
    let requested = msg.revision as u32;
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if state.session_active {
        drop(state);
        send_error(ctx, 1, 96);
        return;
    }
    state.start_session();
    state.session_active = true;
    let ident = state.identification.clone();
    drop(state);

    let rev = ctx
        .revisions
        .lock()
        .expect("revision registry poisoned")
        .negotiate(2, requested);
    let data = payloads::build_mid0002(rev, &ident);
    ctx.dispatcher.send(OutMessage::new(2, rev, data));

    let cancel = crate::simulator::spawn_periodic_loop(ctx.clone());
    *ctx.periodic_cancel.lock().expect("periodic cancel handle poisoned") = Some(cancel);
}

pub fn stop(ctx: &HandlerContext, _msg: &codec::Message) {
    send_ack(ctx, 3);
    let mut state = ctx.state.lock().expect("state mutex poisoned");
    state.end_session();
    drop(state);
    cancel_periodic_loop(ctx);
    ctx.dispatcher.close();
}

pub fn keep_alive(ctx: &HandlerContext) {
    ctx.dispatcher.send(OutMessage::new(9999, 1, ""));
}
