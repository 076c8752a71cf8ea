// Socket factory seam. Production opens a tungstenite socket; tests hand
// out in-memory channel pairs.

use boneio_api::websocket::{self, StateSocket};
use futures_util::future::BoxFuture;
use secrecy::SecretString;
use url::Url;

/// Everything needed to open one state socket.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub url: Url,
    /// Offered as the `token.<value>` subprotocol when present.
    pub token: Option<SecretString>,
}

/// Opens state sockets for the connection manager.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, request: ConnectRequest) -> BoxFuture<'static, Result<StateSocket, boneio_api::Error>>;
}

/// Connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, request: ConnectRequest) -> BoxFuture<'static, Result<StateSocket, boneio_api::Error>> {
        Box::pin(async move { websocket::open_state_socket(&request.url, request.token.as_ref()).await })
    }
}
