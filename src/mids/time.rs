//! Controller time set: MID 0082.

use chrono::NaiveDateTime;

use crate::codec;

use super::{send_ack, send_error, HandlerContext};

const TIME_FMT: &str = "%Y-%m-%d:%H:%M:%S";
const TIME_LEN: usize = 19;

pub fn set_time(ctx: &HandlerContext, msg: &codec::Message) {
    let raw = msg.data_str();
    if raw.len() != TIME_LEN {
        send_error(ctx, 82, 20);
        return;
    }
    let parsed = NaiveDateTime::parse_from_str(&raw, TIME_FMT);
    match parsed {
        Ok(t) => {
            ctx.state.lock().expect("state mutex poisoned").controller_time = t;
            send_ack(ctx, 82);
        }
        Err(_) => send_error(ctx, 82, 20),
    }
}
