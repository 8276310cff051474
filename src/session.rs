//! TCP accept loop and per-connection read/write plumbing.
//!
//! At most one session is ever active. A connection that arrives while one
//! is already running gets a MID 0004 (error 96) and is closed immediately
//! — it never reaches the dispatcher or gets a client id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::codec;
use crate::dispatcher::Dispatcher;
use crate::mids::{self, payloads, HandlerContext};
use crate::revision::RevisionRegistry;
use crate::state::ControllerState;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Owns the listening socket and the shared controller state, and runs the
/// accept loop to completion.
pub struct SessionController {
    listener: TcpListener,
    state: Arc<Mutex<ControllerState>>,
    revisions: Arc<Mutex<RevisionRegistry>>,
}

impl SessionController {
    pub fn new(
        listener: TcpListener,
        state: Arc<Mutex<ControllerState>>,
        revisions: Arc<Mutex<RevisionRegistry>>,
    ) -> Self {
        Self {
            listener,
            state,
            revisions,
        }
    }

    /// Accept connections until the listener itself errors out (which, for
    /// a bound `TcpListener`, only happens if the OS runs out of resources
    /// or the socket is torn down out from under us).
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    if self.state.lock().expect("state mutex poisoned").session_active {
                        log::warn!("rejecting connection from {addr}: a session is already active");
                        tokio::spawn(reject_busy(stream));
                        continue;
                    }

                    let client_id = generate_client_id();
                    log::info!("accepted connection {client_id} from {addr}");
                    tokio::spawn(Self::handle_connection(
                        client_id,
                        stream,
                        self.state.clone(),
                        self.revisions.clone(),
                    ));
                }
                Err(e) => log::error!("accept error: {e}"),
            }
        }
    }

    async fn handle_connection(
        client_id: String,
        stream: TcpStream,
        state: Arc<Mutex<ControllerState>>,
        revisions: Arc<Mutex<RevisionRegistry>>,
    ) {
        let (mut read_half, write_half) = stream.into_split();
        let (dispatcher, _write_handle) = Dispatcher::spawn(write_half, state.clone());
        let ctx = HandlerContext::new(state.clone(), revisions, dispatcher);

        let mut decoder = codec::FrameDecoder::new();
        let mut buf = vec![0u8; READ_BUF_SIZE];

        loop {
            match read_half.read(&mut buf).await {
                Ok(0) => {
                    log::info!("client {client_id} disconnected");
                    break;
                }
                Ok(n) => {
                    for result in decoder.feed(&buf[..n]) {
                        match result {
                            Ok(msg) => mids::dispatch(&ctx, msg),
                            Err(e) => log::warn!("frame decode error from {client_id}: {e}"),
                        }
                    }
                }
                Err(e) => {
                    log::warn!("read error from {client_id}: {e}");
                    break;
                }
            }
        }

        state.lock().expect("state mutex poisoned").end_session();
        mids::cancel_periodic_loop(&ctx);
    }
}

/// Reject a connection received while another session is active. No
/// `HandlerContext` is built for it — it never gets a client id.
async fn reject_busy(mut stream: TcpStream) {
    let data = payloads::build_mid0004(1, 1, 96, "");
    let frame = codec::encode(4, 1, data.as_bytes(), false, 0, 0);
    let _ = stream.write_all(&frame).await;
}

/// Monotonic counter + random suffix, so ids stay unique across restarts
/// without needing to persist anything.
fn generate_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix: u16 = rand::random();
    format!("tcp:{seq:x}{suffix:04x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt as _;

    async fn spawn_controller() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(ControllerState::new()));
        let revisions = Arc::new(Mutex::new(RevisionRegistry::new()));
        let controller = SessionController::new(listener, state, revisions);
        tokio::spawn(controller.run());
        addr
    }

    async fn recv(stream: &mut TcpStream) -> codec::Message {
        let mut buf = [0u8; 512];
        let n = stream.read(&mut buf).await.unwrap();
        let (msg, _) = codec::decode_frame(&buf[..n]).unwrap();
        msg
    }

    #[tokio::test]
    async fn first_connection_starts_a_session() {
        let addr = spawn_controller().await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        let start = codec::encode(1, 1, b"", false, 0, 0);
        client.write_all(&start).await.unwrap();

        let reply = recv(&mut client).await;
        assert_eq!(reply.mid, 2);
    }

    #[tokio::test]
    async fn second_connection_while_active_is_rejected() {
        let addr = spawn_controller().await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(&codec::encode(1, 1, b"", false, 0, 0)).await.unwrap();
        let _ = recv(&mut first).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        let reply = recv(&mut second).await;
        assert_eq!(reply.mid, 4);
        assert_eq!(&reply.data_str()[4..6], "96");
    }

    #[tokio::test]
    async fn disconnect_ends_the_session_and_frees_the_slot() {
        let addr = spawn_controller().await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(&codec::encode(1, 1, b"", false, 0, 0)).await.unwrap();
        let _ = recv(&mut first).await;
        drop(first);

        // Give the read loop a moment to observe EOF and clear session_active.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        second.write_all(&codec::encode(1, 1, b"", false, 0, 0)).await.unwrap();
        let reply = recv(&mut second).await;
        assert_eq!(reply.mid, 2);
    }
}
