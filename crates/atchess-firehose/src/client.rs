//! Long-lived firehose connection
//!
//! A supervisor task owns the WebSocket: connect with a 30-second timeout,
//! resume from the last seen sequence, read until something breaks, then
//! reconnect behind exponential backoff (1 s doubling to a 5-minute cap,
//! reset on every successful connection). A ping rides out every 30 seconds
//! and 40 seconds of total silence fails the connection.

use crate::events::{ChessEvent, EventType};
use crate::frames::decode_frame;
use crate::{FirehoseError, FirehoseResult};
use atchess_records::collections;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Ping every 30 s, pong expected within 10 s: 40 s of silence is fatal
const MAX_SILENCE: Duration = Duration::from_secs(40);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Firehose client; [`FirehoseClient::start`] hands back the handle that
/// owns the supervisor task
pub struct FirehoseClient {
    url: String,
    last_seq: Arc<AtomicU64>,
    events_tx: mpsc::Sender<ChessEvent>,
}

/// Running supervisor; [`FirehoseHandle::stop`] cancels it and closes the
/// connection
pub struct FirehoseHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    last_seq: Arc<AtomicU64>,
}

impl FirehoseClient {
    /// `url` is the full subscribe endpoint, e.g.
    /// `wss://host/xrpc/com.atproto.sync.subscribeRepos`. Events come out
    /// of the returned receiver.
    pub fn new(url: &str, event_buffer: usize) -> (Self, mpsc::Receiver<ChessEvent>) {
        let (events_tx, events_rx) = mpsc::channel(event_buffer);
        (
            Self {
                url: url.to_string(),
                last_seq: Arc::new(AtomicU64::new(0)),
                events_tx,
            },
            events_rx,
        )
    }

    /// Resume from a previously persisted cursor
    pub fn with_cursor(mut self, cursor: u64) -> Self {
        self.last_seq = Arc::new(AtomicU64::new(cursor));
        self
    }

    /// Launch the supervisor
    pub fn start(self) -> FirehoseHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let last_seq = Arc::clone(&self.last_seq);
        let task = tokio::spawn(self.supervise(stop_rx));
        FirehoseHandle {
            stop_tx,
            task,
            last_seq,
        }
    }

    async fn supervise(self, mut stop_rx: watch::Receiver<bool>) {
        let mut delay = INITIAL_BACKOFF;
        loop {
            if *stop_rx.borrow() {
                break;
            }
            let url = self.cursor_url();
            match timeout(CONNECT_TIMEOUT, connect_async(url.as_str())).await {
                Ok(Ok((stream, _))) => {
                    info!("[FIREHOSE] connected to {}", url);
                    delay = INITIAL_BACKOFF;
                    match self.run_stream(stream, &mut stop_rx).await {
                        Ok(()) => break, // stop requested
                        Err(e) => warn!("[FIREHOSE] stream failed: {}", e),
                    }
                }
                Ok(Err(e)) => warn!("[FIREHOSE] connect to {} failed: {}", url, e),
                Err(_) => warn!("[FIREHOSE] connect to {} timed out", url),
            }

            // Back off, but wake immediately on stop
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_rx.changed() => {}
            }
            delay = (delay * 2).min(MAX_BACKOFF);
        }
        info!("[FIREHOSE] supervisor stopped");
    }

    /// Read the stream until stop (Ok) or failure (Err)
    async fn run_stream(
        &self,
        stream: WsStream,
        stop_rx: &mut watch::Receiver<bool>,
    ) -> FirehoseResult<()> {
        let (mut write, mut read) = stream.split();
        let mut ping = interval(PING_INTERVAL);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.reset(); // skip the immediate first tick
        let mut last_activity = Instant::now();

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(());
                    }
                }
                _ = ping.tick() => {
                    if last_activity.elapsed() > MAX_SILENCE {
                        return Err(FirehoseError::Silent(MAX_SILENCE.as_secs()));
                    }
                    write.send(Message::Ping(Vec::new())).await?;
                }
                msg = read.next() => {
                    let msg = match msg {
                        None => return Err(FirehoseError::Closed),
                        Some(Err(e)) => return Err(e.into()),
                        Some(Ok(msg)) => msg,
                    };
                    last_activity = Instant::now();
                    match msg {
                        Message::Binary(data) => {
                            // A frame that fails to decode or route is
                            // logged and skipped; the stream survives
                            if let Err(e) = self.handle_frame(&data).await {
                                match e {
                                    FirehoseError::ChannelClosed => return Err(e),
                                    other => warn!("[FIREHOSE] skipping frame: {}", other),
                                }
                            }
                        }
                        Message::Ping(payload) => {
                            write.send(Message::Pong(payload)).await?;
                        }
                        Message::Close(_) => return Err(FirehoseError::Closed),
                        _ => {}
                    }
                }
            }
        }
    }

    /// Decode one commit frame and forward its chess ops
    async fn handle_frame(&self, data: &[u8]) -> FirehoseResult<()> {
        let (header, blocks) = decode_frame(data)?;
        if !header.is_commit() {
            return Ok(());
        }
        // Sequence advances strictly monotonically
        self.last_seq.fetch_max(header.seq, Ordering::SeqCst);

        for op in &header.ops {
            if !op.path.starts_with(collections::NAMESPACE) {
                continue;
            }
            let Some(collection) = op.path.split('/').next() else {
                continue;
            };
            let Some(event_type) = EventType::from_collection(collection) else {
                continue;
            };
            let record = op
                .cid
                .as_deref()
                .and_then(|cid| blocks.get(cid))
                .cloned();
            let event = ChessEvent {
                event_type,
                repo: header.repo.clone(),
                path: op.path.clone(),
                cid: op.cid.clone(),
                action: op.action.clone(),
                time: Utc::now(),
                record,
            };
            debug!(
                "[FIREHOSE] seq {} {} {} in {}",
                header.seq, event.action, event.path, event.repo
            );
            self.events_tx
                .send(event)
                .await
                .map_err(|_| FirehoseError::ChannelClosed)?;
        }
        Ok(())
    }

    fn cursor_url(&self) -> String {
        let cursor = self.last_seq.load(Ordering::SeqCst);
        if cursor == 0 {
            self.url.clone()
        } else {
            format!("{}?cursor={cursor}", self.url)
        }
    }
}

impl FirehoseHandle {
    /// Last `#commit` sequence seen; persist this to resume across restarts
    pub fn last_seq(&self) -> u64 {
        self.last_seq.load(Ordering::SeqCst)
    }

    /// Cancel the supervisor and wait for it to wind down
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{encode_frame, FrameHeader, RepoOp};
    use serde_json::json;
    use std::collections::HashMap;

    fn client() -> (FirehoseClient, mpsc::Receiver<ChessEvent>) {
        FirehoseClient::new("wss://host.example/xrpc/com.atproto.sync.subscribeRepos", 16)
    }

    fn commit(seq: u64, ops: Vec<RepoOp>) -> FrameHeader {
        FrameHeader {
            op: 1,
            kind: "#commit".to_string(),
            seq,
            repo: "did:plc:alice".to_string(),
            rev: "3krev".to_string(),
            ops,
        }
    }

    #[test]
    fn test_cursor_url() {
        let (client, _rx) = client();
        assert_eq!(
            client.cursor_url(),
            "wss://host.example/xrpc/com.atproto.sync.subscribeRepos"
        );
        client.last_seq.store(100, Ordering::SeqCst);
        assert_eq!(
            client.cursor_url(),
            "wss://host.example/xrpc/com.atproto.sync.subscribeRepos?cursor=100"
        );
    }

    #[tokio::test]
    async fn test_commit_frames_become_events_and_advance_cursor() {
        let (client, mut rx) = client();
        let mut blocks = HashMap::new();
        blocks.insert("bafymove".to_string(), json!({"san": "e4"}));
        let frame = encode_frame(
            &commit(
                101,
                vec![
                    RepoOp {
                        action: "create".to_string(),
                        path: "app.atchess.move/3kmv".to_string(),
                        cid: Some("bafymove".to_string()),
                    },
                    // Non-chess op in the same commit is ignored
                    RepoOp {
                        action: "create".to_string(),
                        path: "app.bsky.feed.post/3kpost".to_string(),
                        cid: Some("bafypost".to_string()),
                    },
                ],
            ),
            &blocks,
        )
        .unwrap();

        client.handle_frame(&frame).await.unwrap();
        assert_eq!(client.last_seq.load(Ordering::SeqCst), 101);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Move);
        assert_eq!(event.repo, "did:plc:alice");
        assert_eq!(event.record.unwrap()["san"], "e4");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sequence_never_regresses() {
        let (client, mut _rx) = client();
        let empty = HashMap::new();
        for seq in [100, 102, 101] {
            let frame = encode_frame(&commit(seq, Vec::new()), &empty).unwrap();
            client.handle_frame(&frame).await.unwrap();
        }
        assert_eq!(client.last_seq.load(Ordering::SeqCst), 102);
    }

    #[tokio::test]
    async fn test_non_commit_frames_ignored() {
        let (client, mut rx) = client();
        let header = FrameHeader {
            op: 1,
            kind: "#info".to_string(),
            seq: 999,
            repo: String::new(),
            rev: String::new(),
            ops: Vec::new(),
        };
        let frame = encode_frame(&header, &HashMap::new()).unwrap();
        client.handle_frame(&frame).await.unwrap();
        assert_eq!(client.last_seq.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_ops_have_no_record() {
        let (client, mut rx) = client();
        let frame = encode_frame(
            &commit(
                5,
                vec![RepoOp {
                    action: "delete".to_string(),
                    path: "app.atchess.challengeNotification/3kn".to_string(),
                    cid: None,
                }],
            ),
            &HashMap::new(),
        )
        .unwrap();
        client.handle_frame(&frame).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::ChallengeNotification);
        assert_eq!(event.action, "delete");
        assert!(event.record.is_none());
    }

    #[tokio::test]
    async fn test_resume_cursor_carries_into_url() {
        let (client, _rx) = client();
        let client = client.with_cursor(100);
        assert!(client.cursor_url().ends_with("?cursor=100"));

        // Later sequences advance the resume point
        let frame = encode_frame(&commit(101, Vec::new()), &HashMap::new()).unwrap();
        client.handle_frame(&frame).await.unwrap();
        assert!(client.cursor_url().ends_with("?cursor=101"));
    }
}
