//! I/O handlers: MID 0214 (device status), 0216/0219 (relay function
//! subscribe/unsubscribe).

use crate::codec;
use crate::dispatcher::Message as OutMessage;

use super::{payloads, send_ack, send_error, HandlerContext};

/// MID 0214 carries the device id directly as its payload; reject
/// revisions above the MID 0215 maximum instead of downgrading (mirrors
/// MID 0100's asymmetry — see the design notes).
pub fn device_status(ctx: &HandlerContext, msg: &codec::Message) {
    let requested = msg.revision as u32;
    let max = ctx
        .revisions
        .lock()
        .expect("revision registry poisoned")
        .max_rev(215);
    if requested > max {
        send_error(ctx, 214, 97);
        return;
    }

    let device_id = msg.data_str().trim().to_string();
    let state = ctx.state.lock().expect("state mutex poisoned");
    let device = match state.io.device(&device_id) {
        Some(d) => d.clone(),
        None => {
            drop(state);
            send_error(ctx, 214, 1);
            return;
        }
    };
    drop(state);

    let (relays, digital_inputs): (Vec<_>, Vec<_>) = if requested < 2 {
        (device.relays_rev1().to_vec(), device.digital_inputs_rev1().to_vec())
    } else {
        (device.relays.clone(), device.digital_inputs.clone())
    };
    let data = payloads::build_mid0215(requested, &device_id, &relays, &digital_inputs);
    ctx.dispatcher.send(OutMessage::new(215, requested, data));
}

pub fn subscribe_relay(ctx: &HandlerContext, msg: &codec::Message) {
    let raw = msg.data_str();
    let function: u16 = match raw.trim().parse() {
        Ok(f) => f,
        Err(_) => {
            send_error(ctx, 216, 99);
            return;
        }
    };

    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if state.relay_subscriptions.contains_key(&function) {
        drop(state);
        send_error(ctx, 216, 6);
        return;
    }
    state.relay_subscriptions.insert(function, msg.no_ack);
    let status = state.io.relay_status(function);
    drop(state);

    send_ack(ctx, 216);
    let data = payloads::build_mid0217(function, status);
    ctx.dispatcher.send(OutMessage::new(217, 1, data).no_ack(msg.no_ack));
}

pub fn unsubscribe_relay(ctx: &HandlerContext, msg: &codec::Message) {
    let raw = msg.data_str();
    let function: u16 = match raw.trim().parse() {
        Ok(f) => f,
        Err(_) => {
            send_error(ctx, 219, 99);
            return;
        }
    };

    let mut state = ctx.state.lock().expect("state mutex poisoned");
    if state.relay_subscriptions.remove(&function).is_none() {
        drop(state);
        send_error(ctx, 219, 7);
        return;
    }
    drop(state);
    send_ack(ctx, 219);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::RevisionRegistry;
    use crate::state::ControllerState;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;

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
        let (dispatcher, _handle) = crate::dispatcher::Dispatcher::spawn(write_half, state.clone());
        let ctx = HandlerContext::new(state, Arc::new(Mutex::new(RevisionRegistry::new())), dispatcher);
        (ctx, client)
    }

    async fn recv(client: &mut tokio::net::TcpStream) -> codec::Message {
        let mut buf = [0u8; 512];
        let n = client.read(&mut buf).await.unwrap();
        let (msg, _) = codec::decode_frame(&buf[..n]).unwrap();
        msg
    }

    async fn recv_all(client: &mut tokio::net::TcpStream, count: usize) -> Vec<codec::Message> {
        let mut buf = vec![0u8; 4096];
        let mut got = Vec::new();
        while got.len() < count {
            let n = client.read(&mut buf).await.unwrap();
            let mut decoder = codec::FrameDecoder::new();
            for r in decoder.feed(&buf[..n]) {
                got.push(r.unwrap());
            }
        }
        got
    }

    #[tokio::test]
    async fn unknown_device_is_error_1() {
        let (ctx, mut client) = harness().await;
        device_status(&ctx, &in_msg(214, 1, "99"));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 4);
        assert_eq!(&reply.data_str()[4..6], "01");
    }

    #[tokio::test]
    async fn known_device_emits_mid0215() {
        let (ctx, mut client) = harness().await;
        device_status(&ctx, &in_msg(214, 1, "00"));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 215);
    }

    #[tokio::test]
    async fn over_max_revision_is_rejected() {
        let (ctx, mut client) = harness().await;
        device_status(&ctx, &in_msg(214, 9, "00"));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 4);
        assert_eq!(&reply.data_str()[4..6], "97");
    }

    #[tokio::test]
    async fn subscribe_relay_pushes_current_status() {
        let (ctx, mut client) = harness().await;
        subscribe_relay(&ctx, &in_msg(216, 1, "001"));
        let msgs = recv_all(&mut client, 2).await;
        assert_eq!(msgs[0].mid, 5);
        assert_eq!(msgs[1].mid, 217);
        assert_eq!(msgs[1].data_str(), "0010");
    }

    #[tokio::test]
    async fn non_numeric_function_is_error_99() {
        let (ctx, mut client) = harness().await;
        subscribe_relay(&ctx, &in_msg(216, 1, "abc"));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 4);
        assert_eq!(&reply.data_str()[4..6], "99");
    }

    #[tokio::test]
    async fn duplicate_subscribe_is_error_6() {
        let (ctx, mut client) = harness().await;
        subscribe_relay(&ctx, &in_msg(216, 1, "001"));
        let _ = recv_all(&mut client, 2).await;
        subscribe_relay(&ctx, &in_msg(216, 1, "001"));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 4);
        assert_eq!(&reply.data_str()[4..6], "06");
    }

    #[tokio::test]
    async fn unsubscribe_without_active_is_error_7() {
        let (ctx, mut client) = harness().await;
        unsubscribe_relay(&ctx, &in_msg(219, 1, "001"));
        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 4);
        assert_eq!(&reply.data_str()[4..6], "07");
    }
}
