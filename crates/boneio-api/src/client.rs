// Device HTTP client
//
// Wraps `reqwest::Client` with boneIO URL construction, bearer-token
// injection and `{detail}` error unwrapping. Endpoint groups (auth, control,
// files, system) are implemented as inherent methods in separate files to
// keep this module focused on transport mechanics.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(serde::Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Raw HTTP client for a single boneIO device.
///
/// Every protected request carries `Authorization: Bearer <token>` when a
/// token is stored. Responses outside 2xx become [`Error::Api`], except 401
/// which is surfaced as [`Error::Unauthorized`] so callers can evict the
/// credential.
pub struct BoneioClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    /// Bearer token from `/api/login`. Shared with the state socket
    /// handshake, which carries it as a subprotocol.
    token: RwLock<Option<SecretString>>,
}

impl BoneioClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the device root (e.g. `http://boneio.local:8090`), optionally
    /// with a path prefix when served behind a reverse proxy.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, transport.timeout))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            timeout,
            token: RwLock::new(None),
        }
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Token management ──────────────────────────────────────────────

    /// Store (or clear) the bearer token.
    pub fn set_token(&self, token: Option<SecretString>) {
        if token.is_some() {
            debug!("storing bearer token");
        } else {
            debug!("clearing bearer token");
        }
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// The current bearer token, if any.
    pub fn token(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a bearer token is currently stored.
    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Apply the stored bearer token to a request builder.
    fn apply_bearer(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self.token.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{segments...}`, percent-encoding each segment.
    pub(crate) fn api_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("api")
            .extend(segments.iter().filter(|s| !s.is_empty()));
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.send(self.apply_bearer(self.http.get(url))).await?;
        Self::parse_json(resp).await
    }

    /// Send a POST request with an optional JSON body.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let mut builder = self.http.post(url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let resp = self.send(self.apply_bearer(builder)).await?;
        Self::parse_json(resp).await
    }

    /// Send a PUT request with a JSON body.
    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("PUT {}", url);

        let builder = self.apply_bearer(self.http.put(url).json(body));
        let resp = self.send(builder).await?;
        Self::parse_json(resp).await
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                Error::Transport(e)
            }
        })
    }

    /// Map non-success statuses to errors and decode the body otherwise.
    async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: detail_message(&body)
                    .unwrap_or_else(|| format!("HTTP {status}: {}", preview(&body))),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(len = body.len(), "response body");

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }
}

/// Extract `detail` from an error body. Validation errors carry a list of
/// `{msg}` objects instead of a string.
fn detail_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => {
            let msgs: Vec<String> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()).map(String::from))
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        other => Some(other.to_string()),
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
