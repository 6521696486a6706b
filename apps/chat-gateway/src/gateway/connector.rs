//! Connector: owns the connection registry, admits new connections, runs
//! their dispatch loops, and periodically sweeps closed ones.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::chat::user::Session;
use crate::config::Config;

use super::connection::Connection;
use super::error::ConnectorError;
use super::events::Event;
use super::handler::EventHandler;
use super::registry::ConnectionRegistry;
use super::transport::{FrameReader, FrameWriter};

/// Default interval between sweeps of closed connections.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default per-send write timeout.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub sweep_interval: Duration,
    pub send_timeout: Duration,
    /// Registry bound. `None` admits without limit.
    pub max_connections: Option<usize>,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_connections: None,
        }
    }
}

impl ConnectorConfig {
    /// Replace zero durations with the defaults.
    pub fn sanitized(mut self) -> Self {
        if self.sweep_interval.is_zero() {
            tracing::warn!("zero sweep interval, using default");
            self.sweep_interval = DEFAULT_SWEEP_INTERVAL;
        }
        if self.send_timeout.is_zero() {
            tracing::warn!("zero send timeout, using default");
            self.send_timeout = DEFAULT_SEND_TIMEOUT;
        }
        self
    }
}

impl From<&Config> for ConnectorConfig {
    fn from(config: &Config) -> Self {
        Self {
            sweep_interval: config.sweep_interval,
            send_timeout: config.ws_send_timeout,
            max_connections: config.max_connections,
        }
    }
}

pub struct Connector {
    registry: Arc<ConnectionRegistry>,
    handler: Arc<EventHandler>,
    config: ConnectorConfig,
    running: AtomicBool,
    /// Serializes the capacity check with the insert.
    admission: Mutex<()>,
}

/// Clears the running flag when `start` returns or is dropped.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Connector {
    pub fn new(handler: EventHandler, config: ConnectorConfig) -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
            handler: Arc::new(handler),
            config: config.sanitized(),
            running: AtomicBool::new(false),
            admission: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Supervise the registry until `cancel` fires, then close every
    /// connection. Fails if another `start` is already running.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), ConnectorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ConnectorError::AlreadyStarted);
        }
        let _running = RunningGuard(&self.running);

        tracing::info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            max_connections = ?self.config.max_connections,
            "connector started"
        );

        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    tracing::debug!(removed, live = self.registry.len(), "swept closed connections");
                }
            }
        }

        let open = self.registry.len();
        self.close_all().await;
        tracing::info!(closed = open, "connector stopped");
        Ok(())
    }

    /// Register a connection over the given transport and start serving it.
    ///
    /// On `CapacityReached` the transport halves are dropped.
    pub fn add_connection(
        &self,
        session: Session,
        reader: Box<dyn FrameReader>,
        writer: Box<dyn FrameWriter>,
    ) -> Result<Arc<Connection>, ConnectorError> {
        let conn = {
            let _admission = self.admission.lock();
            if let Some(max) = self.config.max_connections {
                if self.registry.len() >= max {
                    self.sweep();
                }
                if self.registry.len() >= max {
                    tracing::warn!(user_id = session.user.id, max, "connection refused, registry full");
                    return Err(ConnectorError::CapacityReached(max));
                }
            }

            let conn = Connection::new(session, reader, writer, self.config.send_timeout);
            self.registry.insert(Arc::clone(&conn));
            conn
        };
        conn.admit();

        tokio::spawn(dispatch_loop(
            Arc::clone(&self.registry),
            Arc::clone(&self.handler),
            Arc::clone(&conn),
        ));

        tracing::info!(conn_id = %conn.id(), user_id = conn.user_id(), "connection admitted");
        Ok(conn)
    }

    /// Snapshot of registered connections.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.registry.snapshot()
    }

    /// Remove closed connections. Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.registry.remove_closed()
    }

    /// Close every registered connection and empty the registry.
    pub async fn close_all(&self) {
        let conns = self.registry.snapshot();
        futures_util::future::join_all(conns.iter().map(|conn| conn.close())).await;
        self.registry.remove_closed();
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

/// Consume one connection's inbox in order until it closes.
async fn dispatch_loop(
    registry: Arc<ConnectionRegistry>,
    handler: Arc<EventHandler>,
    conn: Arc<Connection>,
) {
    let Some(mut inbox) = conn.take_inbox() else {
        return;
    };

    loop {
        let frame = tokio::select! {
            biased;
            _ = conn.closed() => break,
            frame = inbox.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let event = match Event::decode(&frame) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(conn_id = %conn.id(), %err, "dropping undecodable frame");
                continue;
            }
        };
        let event_type = event.event_type;
        tracing::debug!(conn_id = %conn.id(), event_type, "event received");

        let outcome = AssertUnwindSafe(handler.handle(&registry, &conn, event))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(conn_id = %conn.id(), event_type, %err, "event handling failed");
            }
            Err(panic) => {
                tracing::error!(
                    conn_id = %conn.id(),
                    event_type,
                    panic = %panic_message(&panic),
                    "event handler panicked"
                );
            }
        }
    }

    tracing::debug!(conn_id = %conn.id(), "dispatch loop finished");
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
        .to_string()
}
