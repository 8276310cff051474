//! MID handler table: dispatch inbound messages to per-domain handlers.
//!
//! Every handler follows the same discipline: compute under the state
//! lock, copy out what's needed to build a response, release the lock,
//! then hand the response to the dispatcher. See [`crate::dispatcher`]
//! for why sends never happen while the lock is held.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::codec;
use crate::dispatcher::{Dispatcher, Message as OutMessage};
use crate::revision::RevisionRegistry;
use crate::state::ControllerState;

pub mod comm;
pub mod io;
pub mod multispindle;
pub mod payloads;
pub mod pset_mid;
pub mod result;
pub mod time;
pub mod tool;
pub mod vin_mid;

/// Everything a handler needs: shared state, the revision registry, and a
/// handle to queue outbound frames.
#[derive(Clone)]
pub struct HandlerContext {
    pub state: Arc<Mutex<ControllerState>>,
    pub revisions: Arc<Mutex<RevisionRegistry>>,
    pub dispatcher: Dispatcher,
    /// Cancel handle for this session's periodic result loop, set by
    /// [`comm::start`] and used by [`comm::stop`] and the read loop's
    /// disconnect path to tear it down.
    pub periodic_cancel: Arc<Mutex<Option<watch::Sender<bool>>>>,
}

impl HandlerContext {
    pub fn new(
        state: Arc<Mutex<ControllerState>>,
        revisions: Arc<Mutex<RevisionRegistry>>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            state,
            revisions,
            dispatcher,
            periodic_cancel: Arc::new(Mutex::new(None)),
        }
    }
}

/// Stop this session's periodic result loop, if one is running.
pub(crate) fn cancel_periodic_loop(ctx: &HandlerContext) {
    if let Some(tx) = ctx
        .periodic_cancel
        .lock()
        .expect("periodic cancel handle poisoned")
        .take()
    {
        let _ = tx.send(true);
    }
}

/// Route one decoded inbound message to its handler.
///
/// Unknown MIDs get a generic MID 0004 error 99. MIDs the controller only
/// ever logs (4, 5, 16, 41, 53, 62, 102, 218 — either response-only MIDs
/// reflected back by a peer, or request fields this controller doesn't act
/// on) are handled inline here rather than via a per-MID function.
pub fn dispatch(ctx: &HandlerContext, msg: codec::Message) {
    match msg.mid {
        1 => comm::start(ctx, &msg),
        3 => comm::stop(ctx, &msg),
        4 | 5 => log::debug!("ignoring inbound MID {:04} (response-only)", msg.mid),
        9999 => comm::keep_alive(ctx),
        14 => pset_mid::subscribe(ctx, &msg),
        16 => log::debug!("MID 0016 received, no action"),
        17 => pset_mid::unsubscribe(ctx, &msg),
        18 => pset_mid::select(ctx, &msg),
        40 => tool::request_data(ctx, &msg),
        41 => log::debug!("MID 0041 received, no action (server does not accept tool data)"),
        42 => tool::disable(ctx, &msg),
        43 => tool::enable(ctx, &msg),
        50 => vin_mid::download(ctx, &msg),
        51 => vin_mid::subscribe(ctx, &msg),
        53 => log::debug!("MID 0053 received, no action"),
        54 => vin_mid::unsubscribe(ctx, &msg),
        60 => result::subscribe(ctx, &msg),
        62 => log::debug!("MID 0062 received, no action"),
        63 => result::unsubscribe(ctx, &msg),
        82 => time::set_time(ctx, &msg),
        100 => multispindle::subscribe(ctx, &msg),
        102 => log::debug!("MID 0102 received, no action"),
        103 => multispindle::unsubscribe(ctx, &msg),
        214 => io::device_status(ctx, &msg),
        216 => io::subscribe_relay(ctx, &msg),
        218 => log::debug!("MID 0218 received, no action"),
        219 => io::unsubscribe_relay(ctx, &msg),
        other => {
            log::warn!("unknown MID {:04}", other);
            send_error(ctx, other, 99);
        }
    }
}

/// Send a MID 0004 error. Always emitted at revision 1 regardless of the
/// registry's MID 0004 maximum — the controller this emulates never varies
/// it, so client integrations can rely on the untagged two-field layout.
pub(crate) fn send_error(ctx: &HandlerContext, failing_mid: u16, code: u8) {
    let data = payloads::build_mid0004(1, failing_mid, code, "");
    ctx.dispatcher.send(OutMessage::new(4, 1, data));
}

/// Send a generic MID 0005 command-accepted acknowledgement.
pub(crate) fn send_ack(ctx: &HandlerContext, acked_mid: u16) {
    let data = payloads::build_mid0005(acked_mid);
    ctx.dispatcher.send(OutMessage::new(5, 1, data));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn in_msg(mid: u16, revision: u16, data: &str) -> codec::Message {
        codec::Message {
            mid,
            revision,
            no_ack: false,
            station: 0,
            spindle: 0,
            data: data.as_bytes().to_vec(),
        }
    }

    async fn harness() -> (HandlerContext, tokio::net::TcpStream) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let (_read_half, write_half) = server.into_split();

        let state = Arc::new(Mutex::new(ControllerState::new()));
        let (dispatcher, _handle) = Dispatcher::spawn(write_half, state.clone());
        let ctx = HandlerContext::new(state, Arc::new(Mutex::new(RevisionRegistry::new())), dispatcher);
        (ctx, client)
    }

    async fn recv(client: &mut tokio::net::TcpStream) -> codec::Message {
        let mut buf = [0u8; 512];
        let n = client.read(&mut buf).await.unwrap();
        let (msg, consumed) = codec::decode_frame(&buf[..n]).unwrap();
        assert_eq!(consumed, n);
        msg
    }

    #[tokio::test]
    async fn start_acks_with_mid0002_and_activates_session() {
        let (ctx, mut client) = harness().await;
        dispatch(&ctx, in_msg(1, 1, ""));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 2);
        assert!(ctx.state.lock().unwrap().session_active);
    }

    #[tokio::test]
    async fn second_start_while_active_is_rejected() {
        let (ctx, mut client) = harness().await;
        dispatch(&ctx, in_msg(1, 1, ""));
        let _ = recv(&mut client).await;
        dispatch(&ctx, in_msg(1, 1, ""));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 4);
        assert_eq!(&reply.data_str()[4..6], "96");
    }

    #[tokio::test]
    async fn keep_alive_is_echoed() {
        let (ctx, mut client) = harness().await;
        dispatch(&ctx, in_msg(9999, 1, ""));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 9999);
    }

    #[tokio::test]
    async fn unknown_mid_yields_error_99() {
        let (ctx, mut client) = harness().await;
        dispatch(&ctx, in_msg(7777, 1, ""));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 4);
        assert_eq!(&reply.data_str()[4..6], "99");
    }

    #[tokio::test]
    async fn invalid_pset_select_yields_error_2() {
        let (ctx, mut client) = harness().await;
        dispatch(&ctx, in_msg(18, 1, "999"));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 4);
        assert_eq!(&reply.data_str()[4..6], "02");
    }

    #[tokio::test]
    async fn valid_pset_select_acks_and_updates_state() {
        let (ctx, mut client) = harness().await;
        dispatch(&ctx, in_msg(18, 1, "001"));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 5);
        assert_eq!(reply.data_str(), "0018");
        assert_eq!(ctx.state.lock().unwrap().current_pset, "001");

        // Close the read half to avoid a dangling write task in the test.
        drop(client);
    }
}
