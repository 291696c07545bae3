//! Integration tests for the client exchange engine.
//!
//! The engine talks to a hand-driven loopback `UdpSocket` standing in for a
//! server session, so each test controls exactly which replies arrive.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use udp_file_transfer::{
    exchange::Exchange,
    frame::{Frame, Opcode, MAX_FRAME, MAX_PAYLOAD},
    socket::Socket,
    timer::TimerConfig,
    TransferError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

async fn engine(ack_timeout: Duration) -> Exchange {
    let socket = Socket::bind(loopback()).await.expect("bind client socket");
    Exchange::new(
        socket,
        TimerConfig {
            ack_timeout,
            max_transmissions: 3,
        },
    )
}

async fn peer() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind(loopback()).await.expect("bind peer socket");
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

async fn recv_frame(socket: &UdpSocket) -> (Frame, SocketAddr) {
    let mut buf = [0u8; MAX_FRAME];
    let (n, from) = socket.recv_from(&mut buf).await.expect("peer recv");
    (Frame::decode(&buf[..n]).expect("peer decode"), from)
}

async fn send_frame(socket: &UdpSocket, frame: &Frame, to: SocketAddr) {
    socket
        .send_to(&frame.encode().unwrap(), to)
        .await
        .expect("peer send");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

/// Each call uses the next sequence number and returns the echoing ACK.
#[tokio::test]
async fn exchange_returns_matching_ack_and_advances_sequence() {
    let (server, server_addr) = peer().await;
    let mut engine = engine(Duration::from_secs(2)).await;

    let responder = tokio::spawn(async move {
        let mut seen = Vec::new();
        for _ in 0..2 {
            let (frame, from) = recv_frame(&server).await;
            send_frame(&server, &Frame::ack(&frame.header), from).await;
            seen.push(frame);
        }
        seen
    });

    let first = engine
        .exchange(Opcode::Data, b"one\n", server_addr)
        .await
        .expect("first exchange");
    let second = engine
        .exchange(Opcode::End, b"", server_addr)
        .await
        .expect("second exchange");

    let seen = responder.await.unwrap();
    assert_eq!(seen[0].header.seq, 1);
    assert_eq!(seen[0].header.opcode, Opcode::Data);
    assert_eq!(seen[0].payload, b"one\n");
    assert_eq!(seen[1].header.seq, 2);
    assert_eq!(seen[1].header.opcode, Opcode::End);

    assert_eq!(first.header.seq, 1);
    assert_eq!(first.header.timestamp, seen[0].header.timestamp);
    assert_eq!(first.from, server_addr);
    assert!(first.payload.is_empty());
    assert_eq!(second.header.seq, 2);
    assert_eq!(engine.sequence(), 2);
}

/// A silent peer sees the same sequence number exactly `max_transmissions`
/// times, then the call fails with `Timeout` and the next call moves on.
#[tokio::test]
async fn silent_peer_exhausts_retransmissions() {
    let (server, server_addr) = peer().await;
    let mut engine = engine(Duration::from_millis(150)).await;

    let result = engine.exchange(Opcode::Data, b"lost", server_addr).await;
    assert!(
        matches!(
            result,
            Err(TransferError::Timeout {
                seq: 1,
                transmissions: 3
            })
        ),
        "expected Timeout, got: {result:?}"
    );

    let mut copies = Vec::new();
    for _ in 0..3 {
        let (frame, _) = tokio::time::timeout(Duration::from_secs(1), recv_frame(&server))
            .await
            .expect("queued retransmission");
        copies.push(frame);
    }
    assert!(copies.iter().all(|f| f.header.seq == 1 && f.payload == b"lost"));
    assert_ne!(copies[0].header.timestamp, copies[2].header.timestamp);

    // Nothing beyond the third transmission.
    let extra = tokio::time::timeout(Duration::from_millis(300), recv_frame(&server)).await;
    assert!(extra.is_err(), "unexpected fourth transmission");
    assert_eq!(engine.sequence(), 1);

    // The budget is per call: the next exchange starts over with seq 2.
    let responder = tokio::spawn(async move {
        let (frame, from) = recv_frame(&server).await;
        send_frame(&server, &Frame::ack(&frame.header), from).await;
        frame.header.seq
    });
    let reply = engine
        .exchange(Opcode::Data, b"again", server_addr)
        .await
        .expect("exchange after timeout");
    assert_eq!(reply.header.seq, 2);
    assert_eq!(responder.await.unwrap(), 2);
}

/// An ACK for another sequence number is ignored; the engine keeps waiting
/// for the right one without retransmitting.
#[tokio::test]
async fn mismatched_ack_is_ignored() {
    let (server, server_addr) = peer().await;
    let mut engine = engine(Duration::from_secs(2)).await;

    let responder = tokio::spawn(async move {
        let (frame, from) = recv_frame(&server).await;
        let mut stale = frame.header;
        stale.seq = frame.header.seq.wrapping_add(7);
        send_frame(&server, &Frame::ack(&stale), from).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        send_frame(&server, &Frame::ack(&frame.header), from).await;

        // Only one transmission should ever arrive.
        tokio::time::timeout(Duration::from_millis(300), recv_frame(&server))
            .await
            .is_err()
    });

    let reply = engine
        .exchange(Opcode::Data, b"payload", server_addr)
        .await
        .expect("exchange");
    assert_eq!(reply.header.seq, 1);
    assert!(responder.await.unwrap(), "frame was retransmitted");
}

/// Datagrams shorter than a header never satisfy an exchange.
#[tokio::test]
async fn runt_datagrams_are_discarded() {
    let (server, server_addr) = peer().await;
    let mut engine = engine(Duration::from_secs(2)).await;

    let responder = tokio::spawn(async move {
        let (frame, from) = recv_frame(&server).await;
        server.send_to(&[0u8; 5], from).await.unwrap();
        send_frame(&server, &Frame::ack(&frame.header), from).await;
    });

    let reply = engine
        .exchange(Opcode::Data, b"x", server_addr)
        .await
        .expect("exchange");
    assert_eq!(reply.header.seq, 1);
    responder.await.unwrap();
}

/// `exchange` only trusts the destination; `request` accepts the first
/// matching ACK from anywhere and reports where it came from.
#[tokio::test]
async fn reply_source_rules() {
    let (server, server_addr) = peer().await;
    let (other, other_addr) = peer().await;
    let mut engine = engine(Duration::from_secs(2)).await;
    let client_addr = engine.local_addr();

    // request(): the other endpoint answers.
    let relay = tokio::spawn(async move {
        let (frame, _) = recv_frame(&server).await;
        send_frame(&other, &Frame::ack(&frame.header), client_addr).await;
        (server, other)
    });
    let reply = engine
        .request(Opcode::WriteRequest, b"report.txt", server_addr)
        .await
        .expect("request");
    assert_eq!(reply.from, other_addr);
    let (server, other) = relay.await.unwrap();

    // exchange(): the other endpoint's ACK is ignored, the destination's wins.
    let relay = tokio::spawn(async move {
        let (frame, from) = recv_frame(&server).await;
        send_frame(&other, &Frame::ack(&frame.header), from).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        send_frame(&server, &Frame::ack(&frame.header), from).await;
    });
    let reply = engine
        .exchange(Opcode::Data, b"x", server_addr)
        .await
        .expect("exchange");
    assert_eq!(reply.from, server_addr);
    assert_eq!(reply.header.seq, 2);
    relay.await.unwrap();
}

/// Oversized payloads are rejected before anything is sent.
#[tokio::test]
async fn oversized_payload_is_rejected_without_consuming_a_sequence() {
    let (_server, server_addr) = peer().await;
    let mut engine = engine(Duration::from_millis(100)).await;

    let result = engine
        .exchange(Opcode::Data, &vec![0u8; MAX_PAYLOAD + 1], server_addr)
        .await;
    assert!(matches!(result, Err(TransferError::Frame(_))));
    assert_eq!(engine.sequence(), 0);
}
