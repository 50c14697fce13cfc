//! Socket.IO push channel with handshake timeout and reconnection.
//!
//! Connects to the tracking backend's Socket.IO endpoint over a raw
//! websocket, joins the room of one pet, and streams typed events through
//! a [`tokio::sync::broadcast`] channel. Connectivity is published through
//! a [`tokio::sync::watch`] channel and only reads `Connected` after the
//! namespace connect ack arrives.
//!
//! # Example
//!
//! ```rust,ignore
//! use pawtrack_api::push::{PushChannel, PushConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let mut config = PushConfig::new(Url::parse("http://localhost:3000")?);
//! config.room = Some("P1".into());
//!
//! let channel = PushChannel::connect(config, CancellationToken::new())?;
//! let mut rx = channel.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{:?}", event.kind());
//! }
//!
//! channel.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::models::{LocationRecord, SensorReading};
use crate::socketio::{self, EnginePacket, OpenPayload, SocketPacket};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Client → server event asking the server to scope pushes to one pet.
pub const JOIN_ROOM_EVENT: &str = "join-pet-room";

// ── PushEvent ────────────────────────────────────────────────────────

/// The closed set of push event kinds the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Sensor,
    Location,
    Notification,
}

impl EventKind {
    /// Socket.IO event name used on the wire.
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Sensor => "sensor-update",
            Self::Location => "location-update",
            Self::Notification => "notification",
        }
    }

    /// Map a wire event name to a kind. Unknown names yield `None`.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "sensor-update" => Some(Self::Sensor),
            "location-update" => Some(Self::Location),
            "notification" => Some(Self::Notification),
            _ => None,
        }
    }
}

/// A decoded server push.
#[derive(Debug, Clone)]
pub enum PushEvent {
    Sensor(SensorReading),
    Location(LocationRecord),
    /// Notification payloads are opaque; receipt alone is the signal.
    Notification(Value),
}

impl PushEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Sensor(_) => EventKind::Sensor,
            Self::Location(_) => EventKind::Location,
            Self::Notification(_) => EventKind::Notification,
        }
    }

    /// Decode a Socket.IO event. `None` for event names outside the
    /// known set, `Some(Err)` when a known event carries a bad payload.
    pub fn decode(name: &str, payload: Value) -> Option<Result<Self, serde_json::Error>> {
        let kind = EventKind::from_wire_name(name)?;
        Some(match kind {
            EventKind::Sensor => serde_json::from_value(payload).map(Self::Sensor),
            EventKind::Location => serde_json::from_value(payload).map(Self::Location),
            EventKind::Notification => Ok(Self::Notification(payload)),
        })
    }
}

// ── Connectivity ─────────────────────────────────────────────────────

/// Where the push link currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkPhase {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Shut down by the owner. Terminal.
    Closed,
}

/// Observable push-link state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityState {
    pub phase: LinkPhase,
    /// Receipt time of the most recent decoded push event.
    pub last_event_at: Option<DateTime<Utc>>,
}

impl ConnectivityState {
    /// `true` only between the handshake ack and the next drop.
    pub fn connected(&self) -> bool {
        matches!(self.phase, LinkPhase::Connected)
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            phase: LinkPhase::Disconnected,
            last_event_at: None,
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for push reconnection.
///
/// Defaults match the Socket.IO client's own policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 5s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_retries: None,
        }
    }
}

// ── PushConfig ───────────────────────────────────────────────────────

/// How to reach and join the push server.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Server base URL (`http(s)://` or `ws(s)://`). The Socket.IO path is appended.
    pub url: Url,
    /// Pet id announced with `join-pet-room` after every handshake.
    pub room: Option<String>,
    /// Bound on websocket upgrade + Engine.IO open + namespace ack.
    pub handshake_timeout: Duration,
    /// `None` connects once and stays disconnected after the first failure.
    pub reconnect: Option<ReconnectConfig>,
    /// Sent as `{"token": ...}` in the namespace connect packet.
    pub auth: Option<SecretString>,
}

impl PushConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            room: None,
            handshake_timeout: Duration::from_secs(5),
            reconnect: Some(ReconnectConfig::default()),
            auth: None,
        }
    }
}

/// Build the websocket-transport endpoint for a Socket.IO server.
///
/// `http://host:3000` → `ws://host:3000/socket.io/?EIO=4&transport=websocket`
pub fn socket_url(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::PushConnect(format!("unsupported URL scheme '{other}'")));
        }
    };
    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::PushConnect(format!("cannot use scheme '{scheme}' for {base}")))?;
    let path = format!("{}/socket.io/", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

// ── PushChannel ──────────────────────────────────────────────────────

/// Handle to a running push connection.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct PushChannel {
    event_rx: broadcast::Receiver<Arc<PushEvent>>,
    state_rx: watch::Receiver<ConnectivityState>,
    cancel: CancellationToken,
}

impl PushChannel {
    /// Spawn the connection loop. Must be called inside a Tokio runtime.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Subscribe before awaiting anything to see every event.
    pub fn connect(config: PushConfig, cancel: CancellationToken) -> Result<Self, Error> {
        // Fail fast on an unusable URL instead of inside the loop.
        socket_url(&config.url)?;

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectivityState::default());

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            push_loop(config, event_tx, state_tx, task_cancel).await;
        });

        Ok(Self {
            event_rx,
            state_rx,
            cancel,
        })
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PushEvent>> {
        self.event_rx.resubscribe()
    }

    /// Watch connectivity transitions.
    pub fn connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.state_rx.clone()
    }

    /// Signal the background task to disconnect and stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// How a single connected session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Cancelled,
    /// Server sent a namespace disconnect; the client must not reconnect.
    ServerDisconnect,
    /// Close frame, Engine.IO close, or end of stream.
    TransportClosed,
}

/// Main loop: connect → read → on drop, backoff → reconnect.
async fn push_loop(
    config: PushConfig,
    event_tx: broadcast::Sender<Arc<PushEvent>>,
    state_tx: watch::Sender<ConnectivityState>,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut first = true;

    loop {
        let phase = if first {
            LinkPhase::Connecting
        } else {
            LinkPhase::Reconnecting { attempt }
        };
        first = false;
        state_tx.send_modify(|s| s.phase = phase);

        let outcome = run_session(&config, &event_tx, &state_tx, &cancel).await;
        state_tx.send_modify(|s| s.phase = LinkPhase::Disconnected);

        match outcome {
            Ok(SessionEnd::Cancelled) => break,
            Ok(SessionEnd::ServerDisconnect) => {
                tracing::info!("push server closed the namespace, not reconnecting");
                return;
            }
            Ok(SessionEnd::TransportClosed) => {
                tracing::info!("push channel disconnected");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "push channel error");
            }
        }

        let Some(policy) = config.reconnect.as_ref() else {
            tracing::info!("reconnection disabled, push channel stays disconnected");
            return;
        };

        if let Some(max) = policy.max_retries {
            if attempt >= max {
                tracing::error!(max_retries = max, "push reconnection limit reached, giving up");
                return;
            }
        }

        let delay = calculate_backoff(attempt, policy);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    state_tx.send_modify(|s| s.phase = LinkPhase::Closed);
    tracing::debug!("push loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Handshake, join the room, then read frames until the link drops.
async fn run_session(
    config: &PushConfig,
    event_tx: &broadcast::Sender<Arc<PushEvent>>,
    state_tx: &watch::Sender<ConnectivityState>,
    cancel: &CancellationToken,
) -> Result<SessionEnd, Error> {
    let url = socket_url(&config.url)?;
    let timeout_ms = u64::try_from(config.handshake_timeout.as_millis()).unwrap_or(u64::MAX);

    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
        result = tokio::time::timeout(config.handshake_timeout, handshake(&url, config)) => result,
    };
    let (mut ws, open) = outcome.map_err(|_| Error::HandshakeTimeout { timeout_ms })??;

    tracing::info!(sid = %open.sid, "push channel connected");
    state_tx.send_modify(|s| s.phase = LinkPhase::Connected);

    if let Some(ref room) = config.room {
        let join = socketio::encode_event(JOIN_ROOM_EVENT, &[Value::String(room.clone())]);
        ws.send(Message::text(join)).await.map_err(ws_error)?;
        tracing::debug!(room, "joined pet room");
    }

    // The server pings every `pingInterval`; silence past this is a dead link.
    let idle_limit = Duration::from_millis(open.ping_interval.saturating_add(open.ping_timeout));

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Leaving the room is implied by closing the socket.
                let _ = ws.close(None).await;
                return Ok(SessionEnd::Cancelled);
            }
            next = tokio::time::timeout(idle_limit, ws.next()) => next,
        };

        let Ok(frame) = next else {
            return Err(Error::PushConnect("ping timeout".into()));
        };

        match frame {
            Some(Ok(Message::Text(text))) => match handle_frame(&text, event_tx, state_tx) {
                FrameAction::Continue => {}
                FrameAction::Pong => {
                    ws.send(Message::text(socketio::PONG)).await.map_err(ws_error)?;
                }
                FrameAction::End(end) => return Ok(end),
            },
            Some(Ok(Message::Close(frame))) => {
                if let Some(ref cf) = frame {
                    tracing::info!(code = %cf.code, reason = %cf.reason, "push close frame received");
                } else {
                    tracing::info!("push close frame received (no payload)");
                }
                return Ok(SessionEnd::TransportClosed);
            }
            Some(Ok(_)) => {
                // Binary, Ping, Pong, Frame -- tungstenite answers pings itself
            }
            Some(Err(e)) => return Err(ws_error(e)),
            None => {
                tracing::info!("push stream ended");
                return Ok(SessionEnd::TransportClosed);
            }
        }
    }
}

/// Websocket upgrade, Engine.IO open, namespace connect, namespace ack.
async fn handshake(url: &Url, config: &PushConfig) -> Result<(WsStream, OpenPayload), Error> {
    tracing::info!(url = %url, "connecting push channel");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::PushConnect(e.to_string()))?;

    let (mut ws, _response) = tokio_tungstenite::connect_async(ClientRequestBuilder::new(uri))
        .await
        .map_err(ws_error)?;

    let auth = config
        .auth
        .as_ref()
        .map(|t| serde_json::json!({ "token": t.expose_secret() }));
    let mut open: Option<OpenPayload> = None;

    loop {
        let frame = ws
            .next()
            .await
            .ok_or_else(|| Error::PushConnect("stream ended during handshake".into()))?
            .map_err(ws_error)?;

        let Message::Text(text) = frame else {
            continue;
        };

        match socketio::decode(&text)? {
            EnginePacket::Open(payload) => {
                tracing::debug!(sid = %payload.sid, "engine.io open");
                open = Some(payload);
                ws.send(Message::text(socketio::encode_connect(auth.as_ref())))
                    .await
                    .map_err(ws_error)?;
            }
            EnginePacket::Ping => {
                ws.send(Message::text(socketio::PONG)).await.map_err(ws_error)?;
            }
            EnginePacket::Message(SocketPacket::Connect(_)) => {
                let open = open
                    .take()
                    .ok_or_else(|| Error::Protocol("namespace ack before open".into()))?;
                return Ok((ws, open));
            }
            EnginePacket::Message(SocketPacket::ConnectError(reason)) => {
                return Err(Error::PushRejected(reason.to_string()));
            }
            EnginePacket::Close => {
                return Err(Error::PushConnect("server closed during handshake".into()));
            }
            _ => {}
        }
    }
}

fn ws_error(e: tungstenite::Error) -> Error {
    Error::PushConnect(e.to_string())
}

// ── Frame handling ───────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum FrameAction {
    Continue,
    Pong,
    End(SessionEnd),
}

/// Decode one post-handshake frame and broadcast any event inside.
fn handle_frame(
    text: &str,
    event_tx: &broadcast::Sender<Arc<PushEvent>>,
    state_tx: &watch::Sender<ConnectivityState>,
) -> FrameAction {
    let packet = match socketio::decode(text) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed push frame");
            return FrameAction::Continue;
        }
    };

    match packet {
        EnginePacket::Ping => FrameAction::Pong,
        EnginePacket::Close => FrameAction::End(SessionEnd::TransportClosed),
        EnginePacket::Message(SocketPacket::Disconnect) => {
            FrameAction::End(SessionEnd::ServerDisconnect)
        }
        EnginePacket::Message(SocketPacket::Event { name, args }) => {
            let payload = args.into_iter().next().unwrap_or(Value::Null);
            match PushEvent::decode(&name, payload) {
                None => tracing::debug!(event = %name, "ignoring unrecognized push event"),
                Some(Err(e)) => {
                    tracing::debug!(event = %name, error = %e, "dropping undecodable push payload");
                }
                Some(Ok(event)) => {
                    state_tx.send_modify(|s| s.last_event_at = Some(Utc::now()));
                    // Ignore send errors -- just means no active subscribers right now
                    let _ = event_tx.send(Arc::new(event));
                }
            }
            FrameAction::Continue
        }
        _ => FrameAction::Continue,
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
///
/// Jitter spreads out reconnection storms from many dashboards.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap, clippy::as_conversions)]
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = attempt.min(30) as i32;
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(5));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        };

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig::default();
        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 6.25s
        assert!(
            d10 <= Duration::from_millis(6_250),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }

    #[test]
    fn socket_url_maps_scheme_and_path() {
        let http = socket_url(&Url::parse("http://localhost:3000").unwrap()).unwrap();
        assert_eq!(http.as_str(), "ws://localhost:3000/socket.io/?EIO=4&transport=websocket");

        let https = socket_url(&Url::parse("https://push.example.com/rt/").unwrap()).unwrap();
        assert_eq!(
            https.as_str(),
            "wss://push.example.com/rt/socket.io/?EIO=4&transport=websocket"
        );

        assert!(socket_url(&Url::parse("ftp://example.com").unwrap()).is_err());
    }

    #[test]
    fn decode_known_and_unknown_events() {
        let sensor = PushEvent::decode(
            "sensor-update",
            serde_json::json!({"heartRate": 90, "timestamp": "2026-03-01T10:00:00Z"}),
        )
        .unwrap()
        .unwrap();
        assert_eq!(sensor.kind(), EventKind::Sensor);

        assert!(PushEvent::decode("collar-reboot", serde_json::json!({})).is_none());
        assert!(PushEvent::decode("location-update", serde_json::json!({"latitude": 1})).unwrap().is_err());
    }

    #[test]
    fn handle_frame_broadcasts_events_and_stamps_time() {
        let (tx, mut rx) = broadcast::channel(16);
        let (state_tx, state_rx) = watch::channel(ConnectivityState::default());

        let frame = r#"42["location-update",{"latitude":"6.25","longitude":"-75.59","timestamp":"2026-03-01T10:00:00Z"}]"#;
        assert_eq!(handle_frame(frame, &tx, &state_tx), FrameAction::Continue);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind(), EventKind::Location);
        assert!(state_rx.borrow().last_event_at.is_some());
    }

    #[test]
    fn handle_frame_control_packets() {
        let (tx, mut rx) = broadcast::channel::<Arc<PushEvent>>(16);
        let (state_tx, _state_rx) = watch::channel(ConnectivityState::default());

        assert_eq!(handle_frame("2", &tx, &state_tx), FrameAction::Pong);
        assert_eq!(
            handle_frame("41", &tx, &state_tx),
            FrameAction::End(SessionEnd::ServerDisconnect)
        );
        assert_eq!(
            handle_frame("1", &tx, &state_tx),
            FrameAction::End(SessionEnd::TransportClosed)
        );
        assert_eq!(handle_frame("not a packet", &tx, &state_tx), FrameAction::Continue);
        assert_eq!(
            handle_frame(r#"42["firmware-update",{}]"#, &tx, &state_tx),
            FrameAction::Continue
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn connectivity_only_connected_in_connected_phase() {
        let mut state = ConnectivityState::default();
        assert!(!state.connected());
        state.phase = LinkPhase::Reconnecting { attempt: 2 };
        assert!(!state.connected());
        state.phase = LinkPhase::Connected;
        assert!(state.connected());
    }
}
