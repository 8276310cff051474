//! End-to-end scenarios driven over a real TCP connection, the way a
//! client integration actually talks to the controller.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use toolsim::codec;
use toolsim::revision::RevisionRegistry;
use toolsim::session::SessionController;
use toolsim::state::ControllerState;

async fn spawn_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(Mutex::new(ControllerState::new()));
    let revisions = Arc::new(Mutex::new(RevisionRegistry::new()));
    let controller = SessionController::new(listener, state, revisions);
    tokio::spawn(controller.run());
    addr
}

async fn send(stream: &mut TcpStream, mid: u16, revision: u16, data: &str) {
    let frame = codec::encode(mid, revision, data.as_bytes(), false, 0, 0);
    stream.write_all(&frame).await.unwrap();
}

async fn recv(stream: &mut TcpStream) -> codec::Message {
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    let (msg, consumed) = codec::decode_frame(&buf[..n]).unwrap();
    assert_eq!(consumed, n, "expected exactly one frame per read in this test");
    msg
}

#[tokio::test]
async fn session_starts_at_negotiated_revision() {
    let addr = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    send(&mut client, 1, 1, "").await;
    let reply = recv(&mut client).await;
    assert_eq!(reply.mid, 2);
    assert_eq!(reply.revision, 1);
}

#[tokio::test]
async fn a_second_connection_is_rejected_while_one_is_active() {
    let addr = spawn_server().await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    send(&mut first, 1, 1, "").await;
    let _ = recv(&mut first).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    let reply = recv(&mut second).await;
    assert_eq!(reply.mid, 4);
    assert_eq!(&reply.data_str()[4..6], "96");
}

#[tokio::test]
async fn vin_subscribe_then_download_falls_back_without_trailing_digits() {
    let addr = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    send(&mut client, 1, 1, "").await;
    let _ = recv(&mut client).await;

    send(&mut client, 51, 2, "").await;
    let ack = recv(&mut client).await;
    assert_eq!(ack.mid, 5);
    let push = recv(&mut client).await;
    assert_eq!(push.mid, 52);
    assert!(push.data_str().starts_with("AB123000"));

    send(&mut client, 50, 1, "XYZ7").await;
    let ack = recv(&mut client).await;
    assert_eq!(ack.mid, 5);
    let push = recv(&mut client).await;
    assert_eq!(push.mid, 52);
    assert!(push.data_str().starts_with("XYZ70"));
}

#[tokio::test]
async fn pset_select_rejects_unknown_id_then_accepts_a_known_one() {
    let addr = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    send(&mut client, 1, 1, "").await;
    let _ = recv(&mut client).await;

    send(&mut client, 18, 1, "999").await;
    let reply = recv(&mut client).await;
    assert_eq!(reply.mid, 4);
    assert_eq!(&reply.data_str()[4..6], "02");

    send(&mut client, 14, 3, "").await;
    let ack = recv(&mut client).await;
    assert_eq!(ack.mid, 5);
    let push = recv(&mut client).await;
    assert_eq!(push.mid, 15);

    send(&mut client, 18, 1, "001").await;
    let ack = recv(&mut client).await;
    assert_eq!(ack.mid, 5);
    assert_eq!(ack.data_str(), "0018");
    let push = recv(&mut client).await;
    assert_eq!(push.mid, 15);
    assert!(push.data_str().starts_with("001"));
}

#[tokio::test]
async fn time_set_rejects_an_invalid_month_then_accepts_a_valid_timestamp() {
    let addr = spawn_server().await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    send(&mut client, 1, 1, "").await;
    let _ = recv(&mut client).await;

    send(&mut client, 82, 1, "2026-13-01:00:00:00").await;
    let reply = recv(&mut client).await;
    assert_eq!(reply.mid, 4);

    send(&mut client, 82, 1, "2026-07-28:12:30:00").await;
    let reply = recv(&mut client).await;
    assert_eq!(reply.mid, 5);
}

#[tokio::test]
async fn stop_acks_then_closes_the_socket_and_frees_the_session() {
    let addr = spawn_server().await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    send(&mut first, 1, 1, "").await;
    let _ = recv(&mut first).await;

    send(&mut first, 3, 1, "").await;
    let ack = recv(&mut first).await;
    assert_eq!(ack.mid, 5);
    assert_eq!(ack.data_str(), "0003");

    let mut buf = [0u8; 16];
    let n = first.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "server must close the socket after MID 0003");

    let mut second = TcpStream::connect(addr).await.unwrap();
    send(&mut second, 1, 1, "").await;
    let reply = recv(&mut second).await;
    assert_eq!(reply.mid, 2);
}

#[tokio::test]
async fn disconnect_frees_the_session_for_the_next_connection() {
    let addr = spawn_server().await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    send(&mut first, 1, 1, "").await;
    let _ = recv(&mut first).await;
    drop(first);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    send(&mut second, 1, 1, "").await;
    let reply = recv(&mut second).await;
    assert_eq!(reply.mid, 2);
}
