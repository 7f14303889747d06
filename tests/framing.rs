#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Frame dispatch over real byte streams: round-trips, partial-read
//! reassembly, zero-length payloads, and read-loop termination paths.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use framelink::error::ProtocolError;
use framelink::protocol::connection::{Connection, ConnectionState};
use framelink::protocol::handler::MessageHandler;
use framelink::utils::task_pool::TaskPool;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::sync::mpsc;

/// Transport wrapper that yields at most `max_read` bytes per read,
/// simulating a stream that fragments frames arbitrarily.
struct Trickle<T> {
    inner: T,
    max_read: usize,
}

impl<T> Trickle<T> {
    fn new(inner: T, max_read: usize) -> Self {
        Self { inner, max_read }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for Trickle<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        let limit = me.max_read.min(buf.remaining());
        let mut tmp = vec![0u8; limit];
        let mut tmp_buf = ReadBuf::new(&mut tmp);
        match Pin::new(&mut me.inner).poll_read(cx, &mut tmp_buf) {
            Poll::Ready(Ok(())) => {
                buf.put_slice(tmp_buf.filled());
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for Trickle<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

fn capture_handler(tx: mpsc::UnboundedSender<Vec<u8>>) -> MessageHandler {
    MessageHandler::inline(move |_conn, payload: Bytes| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(payload.to_vec());
            Ok(())
        }
    })
}

// ============================================================================
// ROUND-TRIP
// ============================================================================

#[tokio::test]
async fn test_send_roundtrip_various_sizes() {
    for size in [0usize, 1, 64, 1024, 65_536] {
        let (a, b) = tokio::io::duplex(8192);
        let sender = Connection::with_defaults(a, "sender", TaskPool::default());
        let receiver = Connection::with_defaults(b, "receiver", TaskPool::default());

        let (tx, mut rx) = mpsc::unbounded_channel();
        receiver.add_handler(0x07, capture_handler(tx));
        let loop_task = tokio::spawn(receiver.clone().run());

        let payload: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        sender.send(0x07, payload.clone()).await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("frame should arrive")
            .unwrap();
        assert_eq!(received, payload, "payload size {size}");

        receiver.close().await;
        loop_task.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_zero_length_frame_dispatches_empty_payload() {
    let (a, b) = tokio::io::duplex(256);
    let sender = Connection::with_defaults(a, "sender", TaskPool::default());
    let receiver = Connection::with_defaults(b, "receiver", TaskPool::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    receiver.add_handler(1, capture_handler(tx));
    tokio::spawn(receiver.clone().run());

    sender.send(1, Vec::new()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("empty frame should arrive")
        .unwrap();
    assert!(received.is_empty());
}

// ============================================================================
// PARTIAL-READ REASSEMBLY
// ============================================================================

#[tokio::test]
async fn test_reassembly_from_tiny_reads() {
    let (a, b) = tokio::io::duplex(8192);
    let sender = Connection::with_defaults(a, "sender", TaskPool::default());
    // Receiver sees at most 3 bytes per read, splitting every header
    let receiver = Connection::with_defaults(Trickle::new(b, 3), "receiver", TaskPool::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    receiver.add_handler(0x42, capture_handler(tx));
    tokio::spawn(receiver.clone().run());

    let payload: Vec<u8> = (0..100u8).collect();
    sender.send(0x42, payload.clone()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("reassembled frame should arrive")
        .unwrap();
    assert_eq!(received, payload);

    // Exactly one event for one frame
    let extra = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(extra.is_err(), "no second event expected");
}

#[tokio::test]
async fn test_back_to_back_frames_through_trickle() {
    let (a, b) = tokio::io::duplex(8192);
    let sender = Connection::with_defaults(a, "sender", TaskPool::default());
    let receiver = Connection::with_defaults(Trickle::new(b, 2), "receiver", TaskPool::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    receiver.add_handler(9, capture_handler(tx));
    tokio::spawn(receiver.clone().run());

    sender.send(9, b"first".to_vec()).await.unwrap();
    sender.send(9, b"second".to_vec()).await.unwrap();

    let one = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let two = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one, b"first");
    assert_eq!(two, b"second");
}

// ============================================================================
// DISPATCH ORDER AND REGISTRATION
// ============================================================================

#[tokio::test]
async fn test_handlers_invoked_in_registration_order() {
    let (a, b) = tokio::io::duplex(256);
    let sender = Connection::with_defaults(a, "sender", TaskPool::default());
    let receiver = Connection::with_defaults(b, "receiver", TaskPool::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    for tag in [1u8, 2, 3] {
        let tx = tx.clone();
        receiver.add_handler(
            5,
            MessageHandler::inline(move |_conn, _payload: Bytes| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(tag);
                    Ok(())
                }
            }),
        );
    }
    tokio::spawn(receiver.clone().run());

    sender.send(5, b"x".to_vec()).await.unwrap();

    let mut order = Vec::new();
    for _ in 0..3 {
        order.push(
            tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap(),
        );
    }
    assert_eq!(order, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_removed_handler_no_longer_fires() {
    let (a, b) = tokio::io::duplex(256);
    let sender = Connection::with_defaults(a, "sender", TaskPool::default());
    let receiver = Connection::with_defaults(b, "receiver", TaskPool::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = receiver.add_handler(8, capture_handler(tx));
    assert!(receiver.remove_handler(8, id));
    assert!(!receiver.remove_handler(8, id), "second removal finds nothing");

    tokio::spawn(receiver.clone().run());
    sender.send(8, b"dropped".to_vec()).await.unwrap();

    let got = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(got.is_err(), "removed handler must not fire");
}

#[tokio::test]
async fn test_inline_handler_error_does_not_kill_read_loop() {
    let (a, b) = tokio::io::duplex(256);
    let sender = Connection::with_defaults(a, "sender", TaskPool::default());
    let receiver = Connection::with_defaults(b, "receiver", TaskPool::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    receiver.add_handler(
        2,
        MessageHandler::inline(move |_conn, _payload: Bytes| async move {
            Err(ProtocolError::Custom("handler failure".into()))
        }),
    );
    receiver.add_handler(3, capture_handler(tx));
    tokio::spawn(receiver.clone().run());

    sender.send(2, b"boom".to_vec()).await.unwrap();
    sender.send(3, b"still alive".to_vec()).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("loop should survive the failing handler")
        .unwrap();
    assert_eq!(received, b"still alive");
}

// ============================================================================
// HEAVY OFFLOAD
// ============================================================================

#[tokio::test]
async fn test_heavy_handler_does_not_stall_reads() {
    let (a, b) = tokio::io::duplex(1024);
    let sender = Connection::with_defaults(a, "sender", TaskPool::bounded(4));
    let receiver = Connection::with_defaults(b, "receiver", TaskPool::bounded(4));

    let (tx, mut rx) = mpsc::unbounded_channel();

    let heavy_tx = tx.clone();
    receiver.add_handler(
        10,
        MessageHandler::heavy(move |_conn, _payload: Bytes| {
            let tx = heavy_tx.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                let _ = tx.send("heavy");
                Ok(())
            }
        }),
    );
    let inline_tx = tx.clone();
    receiver.add_handler(
        11,
        MessageHandler::inline(move |_conn, _payload: Bytes| {
            let tx = inline_tx.clone();
            async move {
                let _ = tx.send("inline");
                Ok(())
            }
        }),
    );
    tokio::spawn(receiver.clone().run());

    sender.send(10, b"slow".to_vec()).await.unwrap();
    sender.send(11, b"fast".to_vec()).await.unwrap();

    // Inline frame is processed while the heavy task still sleeps
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, "inline");

    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, "heavy");
}

// ============================================================================
// TERMINATION PATHS
// ============================================================================

#[tokio::test]
async fn test_eof_mid_payload_is_premature_close() {
    let (mut raw, b) = tokio::io::duplex(256);
    let receiver = Connection::with_defaults(b, "receiver", TaskPool::default());
    let loop_task = tokio::spawn(receiver.clone().run());

    // Header declares 10 payload bytes, only 3 arrive before EOF
    raw.write_all(&[0x01, 0x00, 0x00, 0x00, 0x0A, 0xDE, 0xAD, 0xBE])
        .await
        .unwrap();
    drop(raw);

    let result = loop_task.await.unwrap();
    assert!(matches!(result, Err(ProtocolError::PrematureClose)));
    assert_eq!(receiver.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_clean_eof_ends_loop_without_error() {
    let (raw, b) = tokio::io::duplex(256);
    let receiver = Connection::with_defaults(b, "receiver", TaskPool::default());
    let loop_task = tokio::spawn(receiver.clone().run());

    drop(raw);

    loop_task.await.unwrap().unwrap();
    assert_eq!(receiver.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_close_ends_read_loop_and_is_idempotent() {
    let (_raw, b) = tokio::io::duplex(256);
    let receiver = Connection::with_defaults(b, "receiver", TaskPool::default());
    let loop_task = tokio::spawn(receiver.clone().run());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(receiver.is_active());

    receiver.close().await;
    receiver.close().await;
    loop_task.await.unwrap().unwrap();
    assert_eq!(receiver.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_send_after_close_fails() {
    let (_raw, b) = tokio::io::duplex(256);
    let conn = Connection::with_defaults(b, "peer", TaskPool::default());
    conn.close().await;

    let err = conn.send(1, b"late".to_vec()).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn test_second_run_call_fails() {
    let (_raw, b) = tokio::io::duplex(256);
    let conn = Connection::with_defaults(b, "peer", TaskPool::default());
    let loop_task = tokio::spawn(conn.clone().run());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = conn.clone().run().await.unwrap_err();
    assert!(matches!(err, ProtocolError::Custom(_)));

    conn.close().await;
    loop_task.await.unwrap().unwrap();
}
