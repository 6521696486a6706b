//! One client's duplex link and its chat-visibility state.
//!
//! Lifecycle: `Disconnected → Connected` on [`Connection::admit`], then
//! `Closed` on transport error, peer hang-up, or [`Connection::close`].
//! A closed connection is never revived.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chat::user::Session;

use super::error::ConnectionError;
use super::events::{self, EventType};
use super::transport::{FrameReader, FrameWriter};

/// Which chats a connection wants to hear about.
#[derive(Debug, Default)]
struct ChatState {
    /// Passive interest, replaced wholesale by subscribe-chats.
    subscribed: HashSet<u64>,
    /// The chat the client is actively viewing.
    current: Option<u64>,
}

pub struct Connection {
    id: String,
    session: Session,
    chats: Mutex<ChatState>,
    writer: tokio::sync::Mutex<Box<dyn FrameWriter>>,
    /// Taken by the read loop on admission.
    reader: Mutex<Option<Box<dyn FrameReader>>>,
    inbox_tx: mpsc::UnboundedSender<Vec<u8>>,
    /// Taken by the connector's dispatch loop.
    inbox_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    close_signal: CancellationToken,
    connected: AtomicBool,
    closed: AtomicBool,
    send_timeout: Duration,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new(
        session: Session,
        reader: Box<dyn FrameReader>,
        writer: Box<dyn FrameWriter>,
        send_timeout: Duration,
    ) -> Arc<Self> {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            id: chat_common::id::prefixed_ulid(chat_common::id::prefix::CONNECTION),
            session,
            chats: Mutex::new(ChatState::default()),
            writer: tokio::sync::Mutex::new(writer),
            reader: Mutex::new(Some(reader)),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
            close_signal: CancellationToken::new(),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            send_timeout,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user_id(&self) -> u64 {
        self.session.user.id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        self.close_signal.cancelled().await
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the transport read loop. No-op if already admitted or closed.
    pub fn admit(self: &Arc<Self>) {
        if self.is_closed() {
            return;
        }
        let Some(reader) = self.reader.lock().take() else {
            return;
        };

        self.connected.store(true, Ordering::SeqCst);
        tokio::spawn(Arc::clone(self).read_loop(reader));
    }

    async fn read_loop(self: Arc<Self>, mut reader: Box<dyn FrameReader>) {
        loop {
            tokio::select! {
                _ = self.close_signal.cancelled() => break,
                frame = reader.read_frame() => match frame {
                    Ok(Some(frame)) => {
                        if self.inbox_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(conn_id = %self.id, "peer closed transport");
                        break;
                    }
                    Err(err) => {
                        tracing::debug!(conn_id = %self.id, %err, "transport read failed");
                        break;
                    }
                },
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        self.close().await;
    }

    /// Hand the inbound frame queue to its single consumer.
    pub(crate) fn take_inbox(&self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.inbox_rx.lock().take()
    }

    /// Fire the close signal and release the transport. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.close_signal.cancel();

        let release = async {
            let mut writer = self.writer.lock().await;
            writer.close().await
        };
        match tokio::time::timeout(self.send_timeout, release).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::debug!(conn_id = %self.id, %err, "transport close failed"),
            Err(_) => tracing::debug!(conn_id = %self.id, "transport close timed out"),
        }

        tracing::info!(
            conn_id = %self.id,
            user_id = self.session.user.id,
            "connection closed"
        );
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Encode `{type, data}` and write it to the transport.
    pub async fn send_event<T: Serialize + ?Sized>(
        &self,
        event_type: EventType,
        data: &T,
    ) -> Result<(), ConnectionError> {
        let frame = events::encode(event_type, &data)?;
        self.send_frame(frame).await
    }

    /// Write an already-encoded frame. A failed or timed-out write closes the
    /// connection.
    pub async fn send_frame(&self, frame: String) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_frame(frame).await
        };

        match tokio::time::timeout(self.send_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                self.close().await;
                Err(err.into())
            }
            Err(_) => {
                tracing::warn!(
                    conn_id = %self.id,
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "send timed out, dropping slow connection"
                );
                self.close().await;
                Err(ConnectionError::Timeout)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Chat state
    // -----------------------------------------------------------------------

    /// Replace the subscription set.
    pub fn set_subscribed_chats(&self, ids: impl IntoIterator<Item = u64>) {
        self.chats.lock().subscribed = ids.into_iter().collect();
    }

    pub fn unsubscribe_chats(&self, ids: &[u64]) {
        let mut chats = self.chats.lock();
        for id in ids {
            chats.subscribed.remove(id);
        }
    }

    pub fn subscribed_chats(&self) -> HashSet<u64> {
        self.chats.lock().subscribed.clone()
    }

    pub fn is_subscribed(&self, chat_id: u64) -> bool {
        self.chats.lock().subscribed.contains(&chat_id)
    }

    pub fn set_current_chat(&self, chat_id: u64) {
        self.chats.lock().current = Some(chat_id);
    }

    pub fn unset_current_chat(&self) {
        self.chats.lock().current = None;
    }

    pub fn current_chat(&self) -> Option<u64> {
        self.chats.lock().current
    }

    pub fn is_current_chat(&self, chat_id: u64) -> bool {
        self.chats.lock().current == Some(chat_id)
    }

    /// Whether broadcasts for `chat_id` should reach this connection.
    pub fn is_eligible_for(&self, chat_id: u64) -> bool {
        let chats = self.chats.lock();
        chats.current == Some(chat_id) || chats.subscribed.contains(&chat_id)
    }
}
