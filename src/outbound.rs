//! Outbound frame queue (spec §4.1, §5).
//!
//! The session engine is single-producer on the outbound side: every
//! response, notification, and server-initiated request (sampling) is
//! funnelled through one channel and written out by a dedicated writer task,
//! preserving per-request and per-subscription ordering even though
//! handlers themselves run concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::protocol::{CreateMessageResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};

/// A single outbound wire frame, serialized to one JSON line.
pub enum OutboundFrame {
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
    /// Server-initiated request (e.g. `sampling/createMessage`), carrying a
    /// top-level `id` per spec §6 — distinct from `Notification`, which has
    /// none, so a compliant client can tell it owes a reply.
    Request(JsonRpcRequest),
}

impl OutboundFrame {
    fn to_value(&self) -> Value {
        match self {
            OutboundFrame::Response(r) => serde_json::to_value(r).unwrap_or(Value::Null),
            OutboundFrame::Notification(n) => serde_json::to_value(n).unwrap_or(Value::Null),
            OutboundFrame::Request(r) => serde_json::to_value(r).unwrap_or(Value::Null),
        }
    }
}

/// Cloneable handle to the outbound queue. Each handler posts frames through
/// this; a single writer task drains them in send order, which is what
/// gives per-subscription FIFO and per-request progress-before-response
/// ordering (§4.1) without handlers needing to coordinate directly.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutboundFrame>,
    next_sampling_id: Arc<AtomicU64>,
    pending_sampling: Arc<Mutex<HashMap<RequestId, oneshot::Sender<CreateMessageResult>>>>,
}

impl OutboundQueue {
    /// Spawns the writer task over `sink` and returns a handle plus a
    /// join handle for the writer (used for graceful shutdown draining).
    pub fn spawn<W>(sink: W) -> (Self, tokio::task::JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let writer = tokio::spawn(async move {
            let mut sink = sink;
            while let Some(frame) = rx.recv().await {
                let value = frame.to_value();
                let mut line = match serde_json::to_string(&value) {
                    Ok(s) => s,
                    Err(_) => continue,
                };
                line.push('\n');
                if sink.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                let _ = sink.flush().await;
            }
        });

        let queue = Self {
            tx,
            next_sampling_id: Arc::new(AtomicU64::new(1)),
            pending_sampling: Arc::new(Mutex::new(HashMap::new())),
        };
        (queue, writer)
    }

    pub fn send_response(&self, response: JsonRpcResponse) {
        let _ = self.tx.send(OutboundFrame::Response(response));
    }

    pub fn send_notification(&self, notification: JsonRpcNotification) {
        let _ = self.tx.send(OutboundFrame::Notification(notification));
    }

    /// Sends a server-initiated request (carries a top-level `id`, unlike a
    /// notification) — used for `sampling/createMessage`.
    pub fn send_request(&self, request: JsonRpcRequest) {
        let _ = self.tx.send(OutboundFrame::Request(request));
    }

    /// Allocates a fresh id for a server-initiated request, drawn from a
    /// namespace disjoint from client-supplied ids (spec §4.1): a string
    /// prefixed `srv-` can never collide with a client's numeric or
    /// plain-string id space as long as clients don't mint their own
    /// `srv-`-prefixed ids, which is a caller contract, not enforced here.
    pub fn next_server_request_id(&self) -> RequestId {
        let n = self.next_sampling_id.fetch_add(1, Ordering::SeqCst);
        RequestId::String(format!("srv-{n}"))
    }

    /// Registers a pending server-initiated request awaiting a client
    /// response, returning the receiver half.
    pub async fn register_pending(&self, id: RequestId) -> oneshot::Receiver<CreateMessageResult> {
        let (tx, rx) = oneshot::channel();
        self.pending_sampling.lock().await.insert(id, tx);
        rx
    }

    /// Resolves a pending server-initiated request by id, e.g. when a
    /// `sampling/createMessage` response frame arrives. Returns false if no
    /// such request is outstanding (late or duplicate response).
    pub async fn resolve_pending(&self, id: &RequestId, result: CreateMessageResult) -> bool {
        if let Some(tx) = self.pending_sampling.lock().await.remove(id) {
            tx.send(result).is_ok()
        } else {
            false
        }
    }

    pub async fn forget_pending(&self, id: &RequestId) {
        self.pending_sampling.lock().await.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ContentBlock;

    #[tokio::test]
    async fn writer_drains_frames_in_send_order() {
        let (read, write) = tokio::io::duplex(8192);
        let (queue, _writer) = OutboundQueue::spawn(write);

        queue.send_notification(JsonRpcNotification::new("notifications/progress", serde_json::json!({"progress": 1})));
        queue.send_notification(JsonRpcNotification::new("notifications/progress", serde_json::json!({"progress": 2})));

        use tokio::io::{AsyncBufReadExt, BufReader};
        let mut lines = BufReader::new(read).lines();
        let first = lines.next_line().await.unwrap().unwrap();
        let second = lines.next_line().await.unwrap().unwrap();
        assert!(first.contains("\"progress\":1"));
        assert!(second.contains("\"progress\":2"));
    }

    #[test]
    fn server_request_ids_are_disjoint_from_numeric_client_space() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let queue = OutboundQueue {
            tx,
            next_sampling_id: Arc::new(AtomicU64::new(1)),
            pending_sampling: Arc::new(Mutex::new(HashMap::new())),
        };
        let id = queue.next_server_request_id();
        match id {
            RequestId::String(s) => assert!(s.starts_with("srv-")),
            RequestId::Number(_) => panic!("expected string id"),
        }
    }

    #[tokio::test]
    async fn resolve_pending_delivers_result() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let queue = OutboundQueue {
            tx,
            next_sampling_id: Arc::new(AtomicU64::new(1)),
            pending_sampling: Arc::new(Mutex::new(HashMap::new())),
        };
        let id = queue.next_server_request_id();
        let rx = queue.register_pending(id.clone()).await;
        let delivered = queue
            .resolve_pending(
                &id,
                CreateMessageResult {
                    role: "assistant".to_string(),
                    content: ContentBlock::text("hello"),
                    model: None,
                    stop_reason: None,
                },
            )
            .await;
        assert!(delivered);
        let result = rx.await.unwrap();
        assert_eq!(result.role, "assistant");
    }
}
