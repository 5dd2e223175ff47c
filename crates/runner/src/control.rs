//! JSON-lines control link to the game-side adapter.
//!
//! One TCP connection carries correlated request/response pairs plus
//! unsolicited session events. Long-running operations answer when they
//! complete, so a pending response doubles as the action's completion handle;
//! when the link closes, every outstanding completion fails, which releases
//! its in-flight token instead of leaking it against a dead session.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, oneshot};

use craft_bridge_core::agent::ChatSink;
use craft_bridge_core::session::{
    Completion, ControlFlag, FaceVector, Position, Session, SessionFuture, Snapshot,
};

/// Inbound events pushed by the adapter outside any request/response pair.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Chat { username: String, text: String },
    Spawned,
    Died,
    Kicked { reason: String },
    Disconnected,
}

struct Shared {
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
}

pub struct ControlLink {
    writer: Mutex<OwnedWriteHalf>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl ControlLink {
    /// Connects and spawns the reader task. Events arrive on the returned
    /// channel; a closed link surfaces as [`SessionEvent::Disconnected`].
    pub async fn connect(addr: &str) -> anyhow::Result<(Arc<Self>, mpsc::Receiver<SessionEvent>)> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect control port {addr}"))?;
        let (read, write) = stream.into_split();
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
        });
        let (events_tx, events_rx) = mpsc::channel(64);
        tokio::spawn(read_loop(
            BufReader::new(read),
            Arc::clone(&shared),
            events_tx,
        ));
        Ok((
            Arc::new(Self {
                writer: Mutex::new(write),
                shared,
                next_id: AtomicU64::new(1),
            }),
            events_rx,
        ))
    }

    /// Writes one request line and returns the receiver for its response.
    async fn submit(&self, op: &str, mut body: Value) -> anyhow::Result<oneshot::Receiver<Value>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().await.insert(id, tx);

        body["id"] = json!(id);
        body["op"] = json!(op);
        let line = format!("{body}\n");

        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            self.shared.pending.lock().await.remove(&id);
            return Err(err).context("control write");
        }
        writer.flush().await.ok();
        Ok(rx)
    }

    /// Request/response form: resolves when the adapter answers.
    async fn call(&self, op: &str, body: Value) -> anyhow::Result<Value> {
        let rx = self.submit(op, body).await?;
        await_response(rx).await
    }

    /// Two-phase form: the request is on the wire once this returns, and the
    /// returned handle resolves when the adapter answers.
    async fn call_deferred(&self, op: &str, body: Value) -> anyhow::Result<Completion> {
        let rx = self.submit(op, body).await?;
        Ok(Box::pin(async move {
            await_response(rx).await.map(|_| ())
        }))
    }
}

async fn await_response(rx: oneshot::Receiver<Value>) -> anyhow::Result<Value> {
    let v = rx.await.context("control link closed before response")?;
    if v.get("ok").and_then(Value::as_bool) != Some(true) {
        let detail = v
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unspecified");
        anyhow::bail!("adapter rejected request: {detail}");
    }
    Ok(v)
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    shared: Arc<Shared>,
    events: mpsc::Sender<SessionEvent>,
) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let Ok(v) = serde_json::from_str::<Value>(line.trim()) else {
            tracing::warn!(line = %line.trim(), "discarding unparseable control line");
            continue;
        };

        if let Some(id) = v.get("id").and_then(Value::as_u64) {
            if let Some(tx) = shared.pending.lock().await.remove(&id) {
                let _ = tx.send(v);
            } else {
                tracing::warn!(id, "response for unknown request id");
            }
            continue;
        }

        match parse_event(&v) {
            Some(event) => {
                if events.send(event).await.is_err() {
                    break;
                }
            }
            None => tracing::warn!(line = %line.trim(), "unrecognized control event"),
        }
    }

    // Waking every outstanding caller with an error releases their in-flight
    // tokens; nothing keeps ticking against a dead session.
    shared.pending.lock().await.clear();
    let _ = events.send(SessionEvent::Disconnected).await;
}

fn parse_event(v: &Value) -> Option<SessionEvent> {
    match v.get("event").and_then(Value::as_str)? {
        "chat" => Some(SessionEvent::Chat {
            username: v.get("username")?.as_str()?.to_string(),
            text: v.get("text")?.as_str()?.to_string(),
        }),
        "spawned" => Some(SessionEvent::Spawned),
        "died" => Some(SessionEvent::Died),
        "kicked" => Some(SessionEvent::Kicked {
            reason: v
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        "disconnected" => Some(SessionEvent::Disconnected),
        _ => None,
    }
}

/// [`Session`] and [`ChatSink`] implementation speaking the control protocol.
pub struct RemoteSession {
    link: Arc<ControlLink>,
}

impl RemoteSession {
    pub fn new(link: Arc<ControlLink>) -> Self {
        Self { link }
    }
}

impl Session for RemoteSession {
    fn set_control_state(&self, flag: ControlFlag, active: bool) -> SessionFuture<'_, ()> {
        Box::pin(async move {
            self.link
                .call("control_state", json!({ "flag": flag, "active": active }))
                .await
                .map(|_| ())
        })
    }

    fn navigate_to(&self, target: Position, tolerance: f64) -> SessionFuture<'_, Completion> {
        Box::pin(async move {
            self.link
                .call_deferred("navigate", json!({ "target": target, "tolerance": tolerance }))
                .await
        })
    }

    fn place_block_at<'a>(
        &'a self,
        pos: Position,
        face: FaceVector,
        block: &'a str,
    ) -> SessionFuture<'a, Completion> {
        Box::pin(async move {
            self.link
                .call_deferred(
                    "place_block",
                    json!({ "position": pos, "face": face, "block": block }),
                )
                .await
        })
    }

    fn break_block_at(&self, pos: Position) -> SessionFuture<'_, Completion> {
        Box::pin(async move {
            self.link
                .call_deferred("break_block", json!({ "position": pos }))
                .await
        })
    }

    fn toss_item<'a>(&'a self, item: &'a str, count: u32) -> SessionFuture<'a, ()> {
        Box::pin(async move {
            self.link
                .call("toss_item", json!({ "item": item, "count": count }))
                .await
                .map(|_| ())
        })
    }

    fn snapshot(&self) -> SessionFuture<'_, Snapshot> {
        Box::pin(async move {
            let v = self.link.call("snapshot", json!({})).await?;
            let snapshot = v
                .get("snapshot")
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("missing snapshot in response"))?;
            serde_json::from_value(snapshot).context("decode snapshot")
        })
    }
}

impl ChatSink for RemoteSession {
    fn say<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.link
                .call("chat", json!({ "text": text }))
                .await
                .map(|_| ())
        })
    }
}
