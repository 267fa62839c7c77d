//! WebSocket channel to the home-automation host.
//!
//! Authenticates with an access token, then multiplexes id-correlated
//! commands and push subscriptions over a single connection. A reader
//! task routes `result` frames to the waiting caller and `event` frames
//! to the matching subscription. Initial connection attempts retry with
//! exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use aldbkit_api::{ConnectOptions, HostClient};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let url = Url::parse("ws://homeassistant.local:8123/api/websocket")?;
//! let client = HostClient::connect(&url, &token, ConnectOptions::default(), CancellationToken::new()).await?;
//!
//! let mut status = client.subscribe_aldb_status().await?;
//! while let Some(note) = status.next_notification().await {
//!     println!("{note:?}");
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, Message, protocol::CloseFrame};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::messages::{AldbNotification, HostFailure, Incoming, build_command, command, parse_frames};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for establishing the connection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum retries before giving up. `None` means retry forever.
    /// Default: 3.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: Some(3),
        }
    }
}

/// Connection tuning.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// How long a command waits for its result frame.
    pub timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// ── Routing tables ───────────────────────────────────────────────────

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, HostFailure>>>;
type SubscriptionMap = HashMap<u64, mpsc::UnboundedSender<Value>>;

#[derive(Default)]
struct Routes {
    pending: Mutex<PendingMap>,
    subscriptions: Mutex<SubscriptionMap>,
}

impl Routes {
    async fn dispatch(&self, incoming: Incoming) {
        match incoming {
            Incoming::Result { id, outcome } => {
                if let Some(tx) = self.pending.lock().await.remove(&id) {
                    let _ = tx.send(outcome);
                } else {
                    tracing::trace!(id, "Result for unknown request");
                }
            }
            Incoming::Event { id, event } => {
                let mut subs = self.subscriptions.lock().await;
                if let Some(tx) = subs.get(&id) {
                    if tx.send(event).is_err() {
                        // Receiver dropped without unsubscribing.
                        subs.remove(&id);
                    }
                }
            }
            Incoming::Other { kind } => tracing::trace!(kind, "Ignoring host frame"),
        }
    }

    /// Drop every waiter so callers observe the closed channel.
    async fn close(&self) {
        self.pending.lock().await.clear();
        self.subscriptions.lock().await.clear();
    }
}

// ── HostClient ───────────────────────────────────────────────────────

/// Handle to an authenticated host connection.
///
/// Cheaply cloneable. The background reader/writer tasks stop when
/// [`shutdown`](Self::shutdown) is called, the parent cancellation token
/// fires, or the host closes the socket.
#[derive(Clone)]
pub struct HostClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    outgoing: mpsc::UnboundedSender<Message>,
    routes: Arc<Routes>,
    next_id: AtomicU64,
    timeout: Duration,
    cancel: CancellationToken,
}

impl HostClient {
    /// Connect, authenticate, and spawn the routing tasks.
    ///
    /// Transient failures (refused connection, dropped socket) are retried
    /// per `options.reconnect`; authentication failures are returned
    /// immediately.
    pub async fn connect(
        url: &Url,
        token: &SecretString,
        options: ConnectOptions,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::Connect(format!(
                "unsupported URL scheme '{}' (expected ws or wss)",
                url.scheme()
            )));
        }

        let mut attempt: u32 = 0;
        loop {
            match open_channel(url, token).await {
                Ok(ws) => {
                    tracing::info!(url = %url, "Host channel authenticated");
                    return Ok(Self::spawn(ws, options.timeout, cancel.child_token()));
                }
                Err(e) if e.is_transient() => {
                    if let Some(max) = options.reconnect.max_retries {
                        if attempt >= max {
                            tracing::error!(max_retries = max, "Host connection retry limit reached");
                            return Err(e);
                        }
                    }

                    let delay = calculate_backoff(attempt, &options.reconnect);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Host connection failed, retrying"
                    );

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return Err(Error::Closed { code: 1000, reason: "cancelled".into() });
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn spawn<S>(ws: S, timeout: Duration, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<Message, tungstenite::Error>>
            + Sink<Message, Error = tungstenite::Error>
            + Send
            + Unpin
            + 'static,
    {
        let (write, read) = ws.split();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let routes = Arc::new(Routes::default());

        tokio::spawn(write_loop(write, outgoing_rx, cancel.clone()));
        tokio::spawn(read_loop(read, Arc::clone(&routes), cancel.clone()));

        Self {
            inner: Arc::new(ClientInner {
                outgoing,
                routes,
                next_id: AtomicU64::new(1),
                timeout,
                cancel,
            }),
        }
    }

    /// Whether the underlying socket has gone away.
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Stop the routing tasks and close the socket.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    /// Send a command and wait for its result payload.
    pub async fn call(&self, command: &str, payload: Value) -> Result<Value, Error> {
        let id = self.next_id();
        self.request(id, command, payload).await
    }

    /// Send a command and decode its result payload.
    pub async fn call_typed<T: DeserializeOwned>(
        &self,
        command: &str,
        payload: Value,
    ) -> Result<T, Error> {
        let value = self.call(command, payload).await?;
        T::deserialize(&value).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: value.to_string(),
        })
    }

    /// Open a push subscription. Events that arrive between the command
    /// and its result are buffered, not lost.
    pub async fn subscribe(&self, command: &str, payload: Value) -> Result<HostSubscription, Error> {
        let id = self.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.routes.subscriptions.lock().await.insert(id, tx);

        if let Err(e) = self.request(id, command, payload).await {
            self.inner.routes.subscriptions.lock().await.remove(&id);
            return Err(e);
        }

        tracing::debug!(id, command, "Subscription established");
        Ok(HostSubscription {
            id,
            events: rx,
            client: self.clone(),
        })
    }

    /// Release a subscription on the host. A closed channel has nothing
    /// left to release, so this succeeds without a round trip.
    pub async fn unsubscribe(&self, subscription: u64) -> Result<(), Error> {
        self.inner
            .routes
            .subscriptions
            .lock()
            .await
            .remove(&subscription);
        if self.is_closed() {
            return Ok(());
        }
        self.call(command::UNSUBSCRIBE, json!({ "subscription": subscription }))
            .await
            .map(|_| ())
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(&self, id: u64, command: &str, payload: Value) -> Result<Value, Error> {
        if self.is_closed() {
            return Err(channel_closed());
        }

        let (tx, rx) = oneshot::channel();
        self.inner.routes.pending.lock().await.insert(id, tx);

        let frame = build_command(id, command, payload);
        if self.inner.outgoing.send(Message::text(frame.to_string())).is_err() {
            self.inner.routes.pending.lock().await.remove(&id);
            return Err(channel_closed());
        }
        tracing::debug!(id, command, "Sent host command");

        match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(failure))) => Err(Error::Command {
                command: command.into(),
                code: failure.code,
                message: failure.message,
            }),
            Ok(Err(_)) => Err(channel_closed()),
            Err(_) => {
                self.inner.routes.pending.lock().await.remove(&id);
                Err(Error::Timeout {
                    timeout_secs: self.inner.timeout.as_secs(),
                })
            }
        }
    }
}

// ── HostSubscription ─────────────────────────────────────────────────

/// A live push subscription. Call [`unsubscribe`](Self::unsubscribe) to
/// release it on the host; dropping it only stops local delivery.
pub struct HostSubscription {
    id: u64,
    events: mpsc::UnboundedReceiver<Value>,
    client: HostClient,
}

impl HostSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next raw event payload, or `None` once the channel closed.
    pub async fn next_event(&mut self) -> Option<Value> {
        self.events.recv().await
    }

    /// Next ALDB notification. Undecodable events are skipped.
    pub async fn next_notification(&mut self) -> Option<AldbNotification> {
        self.next_decoded().await
    }

    /// Next event decoded as `T`. Undecodable events are skipped.
    pub async fn next_decoded<T: DeserializeOwned>(&mut self) -> Option<T> {
        loop {
            let event = self.events.recv().await?;
            match serde_json::from_value::<T>(event) {
                Ok(decoded) => return Some(decoded),
                Err(e) => tracing::debug!(error = %e, id = self.id, "Skipping undecodable event"),
            }
        }
    }

    pub async fn unsubscribe(self) -> Result<(), Error> {
        self.client.unsubscribe(self.id).await
    }
}

// ── Connection setup ─────────────────────────────────────────────────

async fn open_channel(url: &Url, token: &SecretString) -> Result<WsStream, Error> {
    tracing::info!(url = %url, "Connecting to host");
    let (mut ws, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::Connect(e.to_string()))?;
    authenticate(&mut ws, token).await?;
    Ok(ws)
}

/// Run the `auth_required` → `auth` → `auth_ok` handshake.
async fn authenticate<S>(ws: &mut S, token: &SecretString) -> Result<(), Error>
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin,
{
    let greeting = next_json(ws).await?;
    if greeting["type"].as_str() != Some("auth_required") {
        return Err(Error::Protocol(format!(
            "expected auth_required, got {}",
            greeting["type"]
        )));
    }

    let auth = json!({ "type": "auth", "access_token": token.expose_secret() });
    ws.send(Message::text(auth.to_string()))
        .await
        .map_err(|e| Error::Connect(e.to_string()))?;

    let reply = next_json(ws).await?;
    match reply["type"].as_str() {
        Some("auth_ok") => Ok(()),
        Some("auth_invalid") => Err(Error::Authentication {
            message: reply["message"]
                .as_str()
                .unwrap_or("invalid access token")
                .to_owned(),
        }),
        other => Err(Error::Protocol(format!(
            "unexpected handshake reply: {}",
            other.unwrap_or("<none>")
        ))),
    }
}

async fn next_json<S>(ws: &mut S) -> Result<Value, Error>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: text.as_str().to_owned(),
                });
            }
            Some(Ok(Message::Close(frame))) => return Err(closed_by_host(frame.as_ref())),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::Connect(e.to_string())),
            None => {
                return Err(Error::Closed {
                    code: 1006,
                    reason: "stream ended during handshake".into(),
                });
            }
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn write_loop<W>(
    mut write: W,
    mut rx: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            msg = rx.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = write.send(msg).await {
                    tracing::warn!(error = %e, "Host write failed");
                    break;
                }
            }
        }
    }
    tracing::debug!("Host writer exiting");
}

async fn read_loop<R>(mut read: R, routes: Arc<Routes>, cancel: CancellationToken)
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    for incoming in parse_frames(text.as_str()) {
                        routes.dispatch(incoming).await;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let err = closed_by_host(frame.as_ref());
                    tracing::info!(error = %err, "Host closed the channel");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Host read failed");
                    break;
                }
                None => {
                    tracing::info!("Host stream ended");
                    break;
                }
            }
        }
    }

    // Stops the writer and makes later requests fail fast.
    cancel.cancel();
    routes.close().await;
    tracing::debug!("Host reader exiting");
}

// ── Helpers ──────────────────────────────────────────────────────────

fn channel_closed() -> Error {
    Error::Closed {
        code: 1006,
        reason: "host channel is closed".into(),
    }
}

fn closed_by_host(frame: Option<&CloseFrame>) -> Error {
    match frame {
        Some(cf) => Error::Closed {
            code: u16::from(cf.code),
            reason: cf.reason.as_str().to_owned(),
        },
        None => Error::Closed {
            code: 1005,
            reason: "no close payload".into(),
        },
    }
}

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
