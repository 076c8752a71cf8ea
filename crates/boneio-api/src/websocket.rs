//! Realtime state socket.
//!
//! The device pushes `{type, data}` frames over `WS /ws/state`: an initial
//! burst with the state of every entity, then one frame per change. The
//! client keeps the socket alive by sending the text frame `ping`, which the
//! device answers with `pong`.
//!
//! Authentication rides on the handshake: the bearer token is offered as the
//! subprotocol `token.<jwt>`. The device closes with code 4001 when it
//! rejects the token.
//!
//! This module only opens sockets and decodes frames. Reconnects, heartbeats
//! and fan-out live in `boneio-core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use boneio_api::websocket::{self, Inbound};
//! use futures_util::{SinkExt, StreamExt};
//!
//! let url = websocket::state_socket_url(&"http://boneio.local:8090".parse()?)?;
//! let mut socket = websocket::open_state_socket(&url, None).await?;
//! socket.sink.send(websocket::PING.to_owned()).await?;
//!
//! while let Some(Ok(text)) = socket.stream.next().await {
//!     if let Ok(Inbound::Update(update)) = websocket::parse_frame(&text) {
//!         println!("{} {:?}", update.kind(), update.entity_key());
//!     }
//! }
//! ```

use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt, future};
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use url::Url;

use crate::error::Error;
use crate::models::StateUpdate;

// ── Protocol constants ───────────────────────────────────────────────

/// Path of the state socket, relative to the device base URL.
pub const STATE_PATH: &str = "ws/state";

/// Heartbeat request sent by the client.
pub const PING: &str = "ping";

/// Heartbeat reply sent by the device.
pub const PONG: &str = "pong";

/// Close code the device uses when the token subprotocol is rejected.
pub const CLOSE_UNAUTHORIZED: u16 = 4001;

/// Upper bound for the TCP connect plus WebSocket upgrade.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

// ── Socket halves ────────────────────────────────────────────────────

/// Outgoing half: accepts text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Incoming half: yields text frames. Ends when the socket closes; an
/// abnormal close is reported as a final [`Error::WebSocketClosed`].
pub type FrameStream = BoxStream<'static, Result<String, Error>>;

/// An open state socket, split into its two halves.
pub struct StateSocket {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl std::fmt::Debug for StateSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSocket").finish_non_exhaustive()
    }
}

// ── URL derivation ───────────────────────────────────────────────────

/// Derive the state socket URL from the device base URL.
///
/// `http` maps to `ws` and `https` to `wss`; any path prefix on the base
/// URL is kept so reverse-proxied devices work.
pub fn state_socket_url(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::WebSocketConnect(format!(
                "unsupported URL scheme: {other}"
            )));
        }
    };

    let mut prefix = base.path().trim_end_matches('/').to_owned();
    prefix.push('/');
    let mut url = base.join(&format!("{prefix}{STATE_PATH}"))?;
    url.set_query(None);
    url.set_fragment(None);
    url.set_scheme(scheme)
        .map_err(|()| Error::WebSocketConnect(format!("cannot switch {base} to {scheme}")))?;
    Ok(url)
}

// ── Connect ──────────────────────────────────────────────────────────

/// Open the state socket, offering `token` as the `token.<value>` subprotocol.
pub async fn open_state_socket(url: &Url, token: Option<&SecretString>) -> Result<StateSocket, Error> {
    open_state_socket_within(url, token, HANDSHAKE_TIMEOUT).await
}

/// [`open_state_socket`] with an explicit handshake bound. A device that
/// accepts the TCP connection but never answers the upgrade yields
/// [`Error::Timeout`].
pub async fn open_state_socket_within(
    url: &Url,
    token: Option<&SecretString>,
    limit: Duration,
) -> Result<StateSocket, Error> {
    tracing::info!(url = %url, authenticated = token.is_some(), "Connecting to state socket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(token) = token {
        request = request.with_sub_protocol(format!("token.{}", token.expose_secret()));
    }

    let (ws_stream, _response) = tokio::time::timeout(limit, tokio_tungstenite::connect_async(request))
        .await
        .map_err(|_| Error::Timeout {
            timeout_secs: limit.as_secs(),
        })?
        .map_err(|e| match e {
            tungstenite::Error::Http(ref response)
                if response.status() == tungstenite::http::StatusCode::UNAUTHORIZED =>
            {
                Error::Unauthorized
            }
            other => Error::WebSocketConnect(other.to_string()),
        })?;

    tracing::info!("State socket connected");

    let (write, read) = ws_stream.split();

    let sink = write
        .sink_map_err(|e| Error::WebSocketConnect(e.to_string()))
        .with(|text: String| future::ready(Ok::<_, Error>(tungstenite::Message::text(text))));

    let stream = read.filter_map(|frame| future::ready(decode_message(frame)));

    Ok(StateSocket {
        sink: Box::pin(sink),
        stream: stream.boxed(),
    })
}

/// Reduce a transport message to a text frame, a terminal error, or nothing.
fn decode_message(
    frame: Result<tungstenite::Message, tungstenite::Error>,
) -> Option<Result<String, Error>> {
    match frame {
        Ok(tungstenite::Message::Text(text)) => Some(Ok(text.to_string())),
        Ok(tungstenite::Message::Close(Some(cf))) if cf.code != CloseCode::Normal => {
            tracing::info!(code = %cf.code, reason = %cf.reason, "State socket close frame received");
            Some(Err(Error::WebSocketClosed {
                code: cf.code.into(),
                reason: cf.reason.to_string(),
            }))
        }
        Ok(tungstenite::Message::Close(_)) => {
            tracing::info!("State socket closed normally");
            None
        }
        Ok(_) => {
            // Binary, Ping, Pong, Frame -- tungstenite answers pings itself
            None
        }
        Err(e) => Some(Err(Error::WebSocketConnect(e.to_string()))),
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Heartbeat reply.
    Pong,
    /// Entity state change.
    Update(StateUpdate),
}

/// Decode a text frame from the state socket.
pub fn parse_frame(text: &str) -> Result<Inbound, Error> {
    if text.trim() == PONG {
        return Ok(Inbound::Pong);
    }
    StateUpdate::from_json(text).map(Inbound::Update)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_translates_scheme() {
        let ws = state_socket_url(&Url::parse("http://boneio.local:8090").unwrap()).unwrap();
        assert_eq!(ws.as_str(), "ws://boneio.local:8090/ws/state");

        let wss = state_socket_url(&Url::parse("https://10.0.0.5/").unwrap()).unwrap();
        assert_eq!(wss.as_str(), "wss://10.0.0.5/ws/state");
    }

    #[test]
    fn socket_url_keeps_path_prefix() {
        let url =
            state_socket_url(&Url::parse("https://proxy.example/boneio/?x=1").unwrap()).unwrap();
        assert_eq!(url.as_str(), "wss://proxy.example/boneio/ws/state");
    }

    #[test]
    fn socket_url_rejects_other_schemes() {
        let err = state_socket_url(&Url::parse("ftp://boneio.local").unwrap()).unwrap_err();
        assert!(matches!(err, Error::WebSocketConnect(_)));
    }

    #[test]
    fn pong_is_recognised() {
        assert_eq!(parse_frame("pong").unwrap(), Inbound::Pong);
    }

    #[test]
    fn update_frames_parse() {
        let frame =
            parse_frame(r#"{"type":"output","data":{"id":"relay1","name":"Relay 1","state":"ON"}}"#)
                .unwrap();
        let Inbound::Update(update) = frame else {
            panic!("expected update");
        };
        assert_eq!(update.entity_key(), Some("relay1"));
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        assert!(matches!(parse_frame("{oops"), Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn silent_upgrade_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection without ever answering the upgrade.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let url = Url::parse(&format!("ws://{addr}/ws/state")).unwrap();
        let err = open_state_socket_within(&url, None, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(err.is_transient());
        server.abort();
    }

    #[test]
    fn abnormal_close_surfaces_code() {
        use tungstenite::protocol::CloseFrame;

        let frame = tungstenite::Message::Close(Some(CloseFrame {
            code: CloseCode::from(CLOSE_UNAUTHORIZED),
            reason: "Unauthorized".into(),
        }));
        let decoded = decode_message(Ok(frame)).unwrap();
        assert!(matches!(
            decoded,
            Err(Error::WebSocketClosed { code: 4001, .. })
        ));

        let normal = tungstenite::Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        }));
        assert!(decode_message(Ok(normal)).is_none());
    }
}
