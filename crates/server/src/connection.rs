//! Full-duplex message pump over an upgraded websocket stream.
use std::borrow::Cow;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use std::time::Duration;

use axum::extract::ws::{
    close_code, CloseFrame, Message, WebSocket,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{interval_at, timeout, timeout_at, Instant};

use signaling_protocol::SignalingMessage;

use crate::{
    peer::Peer,
    session::RoutedMessage,
    Error, Result,
};

/// Time allowed to write a message to the peer.
pub(crate) const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed to read the next keep-alive acknowledgement from
/// the peer.
pub(crate) const PONG_WAIT: Duration = Duration::from_secs(10);

/// Period between keep-alive pings. Must be less than `PONG_WAIT`.
pub(crate) const PING_PERIOD: Duration = Duration::from_secs(9);

/// Maximum frame size accepted from a peer.
pub(crate) const MAX_MESSAGE_SIZE: usize = 4096;

/// Time to wait for the reader to finish during a clean close.
const CLOSE_WAIT: Duration = Duration::from_secs(1);

/// Capacity of the outbound message queue of one connection.
const OUTBOUND_QUEUE: usize = 64;

/// State shared between the reader and writer tasks of one
/// attached stream.
///
/// The writer task is the only task touching the websocket sink;
/// everything that has to reach the wire goes through the outbound
/// queue.
pub(crate) struct Connection {
    outgoing: mpsc::Sender<SignalingMessage>,
    closing: AtomicBool,
    close: Notify,
    done: watch::Sender<bool>,
    remote: String,
    peer: Weak<Peer>,
}

impl Connection {
    pub(crate) fn new(
        remote: String,
        peer: Weak<Peer>,
    ) -> (Arc<Self>, mpsc::Receiver<SignalingMessage>) {
        let (outgoing, receiver) = mpsc::channel(OUTBOUND_QUEUE);
        let (done, _) = watch::channel(false);
        let conn = Arc::new(Self {
            outgoing,
            closing: AtomicBool::new(false),
            close: Notify::new(),
            done,
            remote,
            peer,
        });
        (conn, receiver)
    }

    /// Remote address of the underlying stream.
    pub(crate) fn remote(&self) -> &str {
        &self.remote
    }

    /// Enqueue an envelope for delivery to the peer.
    pub(crate) async fn send(
        &self,
        message: SignalingMessage,
    ) -> Result<()> {
        self.outgoing
            .send(message)
            .await
            .map_err(|_| Error::ConnectionClosing)
    }

    /// Start the reader and writer tasks for this connection.
    pub(crate) fn start(
        self: Arc<Self>,
        sink: SplitSink<WebSocket, Message>,
        stream: SplitStream<WebSocket>,
        outgoing: mpsc::Receiver<SignalingMessage>,
        peer: Arc<Peer>,
        inbound: mpsc::Sender<RoutedMessage>,
    ) {
        tokio::spawn(read(
            stream,
            Arc::clone(&self),
            peer,
            inbound,
        ));
        tokio::spawn(write(sink, self, outgoing));
    }

    /// Close the connection.
    ///
    /// Asks the writer to send a normal-closure frame and waits up
    /// to one second for the reader to finish; on timeout the close
    /// proceeds anyway. Idempotent.
    pub(crate) async fn close(self: Arc<Self>) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!(remote = %self.remote, "connection closing");
        self.close.notify_one();

        let mut done = self.done.subscribe();
        if timeout(CLOSE_WAIT, done.wait_for(|done| *done))
            .await
            .is_err()
        {
            tracing::warn!(
                remote = %self.remote,
                "timed out waiting for connection close"
            );
        }

        if let Some(peer) = self.peer.upgrade() {
            peer.detach(&self).await;
        }
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// Read framed envelopes until the stream fails, closes or misses
/// its keep-alive deadline, then run the close finalizer.
async fn read(
    mut receiver: SplitStream<WebSocket>,
    conn: Arc<Connection>,
    peer: Arc<Peer>,
    inbound: mpsc::Sender<RoutedMessage>,
) {
    let mut deadline = Instant::now() + PONG_WAIT;

    loop {
        let message =
            match timeout_at(deadline, receiver.next()).await {
                Err(_) => {
                    tracing::warn!(
                        peer = %peer.name(),
                        remote = %conn.remote,
                        "keep-alive timeout"
                    );
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    if !conn.is_closing() {
                        tracing::warn!(
                            peer = %peer.name(),
                            error = %e,
                            "failed to read"
                        );
                    }
                    break;
                }
                Ok(Some(Ok(message))) => message,
            };

        let decoded = match message {
            Message::Pong(_) => {
                deadline = Instant::now() + PONG_WAIT;
                continue;
            }
            Message::Ping(_) => continue,
            Message::Close(frame) => {
                let code = frame.map(|frame| frame.code);
                if matches!(
                    code,
                    None | Some(close_code::NORMAL)
                        | Some(close_code::AWAY)
                ) {
                    // Reciprocate a clean remote close.
                    if !conn.closing.swap(true, Ordering::SeqCst) {
                        conn.close.notify_one();
                    }
                } else {
                    tracing::warn!(
                        peer = %peer.name(),
                        code = ?code,
                        "connection closed abnormally"
                    );
                }
                break;
            }
            Message::Text(text) => {
                serde_json::from_str::<SignalingMessage>(&text)
            }
            Message::Binary(buffer) => {
                serde_json::from_slice::<SignalingMessage>(&buffer)
            }
        };

        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    peer = %peer.name(),
                    error = %e,
                    "failed to decode signaling message"
                );
                break;
            }
        };

        tracing::debug!(
            peer = %peer.name(),
            %message,
            "received signaling message"
        );

        let routed = RoutedMessage {
            message,
            sender: Arc::clone(&peer),
        };
        if inbound.send(routed).await.is_err() {
            // Session router is gone.
            break;
        }
    }

    finalize(&conn).await;
}

/// Close finalizer, invoked exactly once per connection lifetime
/// when the reader exits.
async fn finalize(conn: &Arc<Connection>) {
    conn.done.send_replace(true);

    if let Some(peer) = conn.peer.upgrade() {
        peer.detach(conn).await;
    }

    tracing::debug!(remote = %conn.remote, "connection closed");
}

/// Drain the outbound queue, send keep-alive pings and react to
/// close requests until the connection is done.
async fn write(
    mut sender: SplitSink<WebSocket, Message>,
    conn: Arc<Connection>,
    mut outgoing: mpsc::Receiver<SignalingMessage>,
) {
    let mut done = conn.done.subscribe();
    let mut ticker =
        interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);

    loop {
        tokio::select! {
            _ = async { let _ = done.wait_for(|done| *done).await; } => break,

            _ = conn.close.notified() => {
                let frame = CloseFrame {
                    code: close_code::NORMAL,
                    reason: Cow::from(""),
                };
                if let Err(e) =
                    sender.send(Message::Close(Some(frame))).await
                {
                    tracing::debug!(
                        remote = %conn.remote,
                        error = %e,
                        "failed to send close message"
                    );
                    break;
                }
            }

            message = outgoing.recv() => {
                let Some(message) = message else { break };

                tracing::debug!(
                    remote = %conn.remote,
                    %message,
                    "sending signaling message"
                );

                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "failed to encode signaling message"
                        );
                        continue;
                    }
                };

                match timeout(
                    WRITE_WAIT,
                    sender.send(Message::Text(text)),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(
                            remote = %conn.remote,
                            error = %e,
                            "failed to send message"
                        );
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(
                            remote = %conn.remote,
                            "write timeout"
                        );
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                match timeout(
                    WRITE_WAIT,
                    sender.send(Message::Ping(Vec::new())),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(
                            remote = %conn.remote,
                            error = %e,
                            "failed to ping"
                        );
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(
                            remote = %conn.remote,
                            "write timeout"
                        );
                        break;
                    }
                }
            }
        }
    }

    let _ = sender.close().await;
}
