//! Serializes writes to the single active client connection.
//!
//! Encoding and sending happen off the state lock: handlers compute a
//! [`Message`] while holding [`crate::state::ControllerState`], drop the
//! guard, then call [`Dispatcher::send`]. The write task is the only
//! thing that ever touches the socket's write half, so two concurrent
//! emitters never interleave bytes.

use std::sync::{Arc, Mutex};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::codec;
use crate::state::ControllerState;

#[derive(Debug, Clone)]
pub struct Message {
    pub mid: u16,
    pub revision: u32,
    pub data: String,
    pub no_ack: bool,
}

impl Message {
    pub fn new(mid: u16, revision: u32, data: impl Into<String>) -> Self {
        Self {
            mid,
            revision,
            data: data.into(),
            no_ack: false,
        }
    }

    pub fn no_ack(mut self, no_ack: bool) -> Self {
        self.no_ack = no_ack;
        self
    }
}

/// Internal queue item: either a frame to encode and send, or a request to
/// shut the connection down once the queue drains (used by MID 0003).
#[derive(Debug)]
enum Command {
    Send(Message),
    Close,
}

/// Handle to the per-connection write task. Cheap to clone; every clone
/// shares the same outbound queue.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: UnboundedSender<Command>,
}

impl Dispatcher {
    /// Spawn the write task over `writer`, guarding against two concurrent
    /// writers with the channel itself as the serialization point. Write
    /// failures end the session: the socket is dropped and `state` is
    /// reset as if the peer had disconnected.
    pub fn spawn(writer: OwnedWriteHalf, state: Arc<Mutex<ControllerState>>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(Self::write_loop(writer, rx, state));
        (Self { tx }, handle)
    }

    /// Queue a message for encoding and transmission. Returns `false` if
    /// the write task has already shut down (e.g. after a prior write
    /// error) — callers should treat this as "nothing more to send".
    pub fn send(&self, msg: Message) -> bool {
        self.tx.send(Command::Send(msg)).is_ok()
    }

    /// Queue a shutdown: every frame already queued is flushed first, then
    /// the socket is closed. Used after the MID 0005 ack for MID 0003, so
    /// the client sees its acknowledgement before the connection drops.
    pub fn close(&self) {
        let _ = self.tx.send(Command::Close);
    }

    async fn write_loop(
        mut writer: OwnedWriteHalf,
        mut rx: UnboundedReceiver<Command>,
        state: Arc<Mutex<ControllerState>>,
    ) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                Command::Send(msg) => {
                    let bytes =
                        codec::encode(msg.mid, msg.revision as u16, msg.data.as_bytes(), msg.no_ack, 0, 0);
                    if let Err(e) = writer.write_all(&bytes).await {
                        log::warn!("write error sending MID {:04}: {e}", msg.mid);
                        let mut state = state.lock().expect("state mutex poisoned");
                        state.end_session();
                        break;
                    }
                    log::debug!("sent MID {:04} rev {} ({} bytes)", msg.mid, msg.revision, bytes.len());
                }
                Command::Close => {
                    let _ = writer.shutdown().await;
                    break;
                }
            }
        }
    }
}
