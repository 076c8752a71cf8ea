use tracing::debug;

use crate::client::BoneioClient;
use crate::error::Error;
use crate::models::{
    LogEntry, LogsResponse, NameResponse, ParsedConfigResponse, StatusResponse, UpdateInfo,
    VersionResponse,
};

impl BoneioClient {
    /// Firmware version. Unauthenticated, so it doubles as the liveness probe.
    ///
    /// `GET /api/version`
    pub async fn version(&self) -> Result<String, Error> {
        let url = self.api_url(&["version"])?;
        let resp: VersionResponse = self.get(url).await?;
        Ok(resp.version)
    }

    /// Configured device name.
    ///
    /// `GET /api/name`
    pub async fn name(&self) -> Result<String, Error> {
        let url = self.api_url(&["name"])?;
        let resp: NameResponse = self.get(url).await?;
        Ok(resp.name)
    }

    /// Validate the on-device configuration. Invalid configuration is a
    /// successful call with `status: "error"` and a message.
    ///
    /// `GET /api/check_configuration`
    pub async fn check_configuration(&self) -> Result<StatusResponse, Error> {
        let url = self.api_url(&["check_configuration"])?;
        self.get(url).await
    }

    /// `GET /api/check_update`
    pub async fn check_update(&self) -> Result<UpdateInfo, Error> {
        let url = self.api_url(&["check_update"])?;
        self.get(url).await
    }

    /// Upgrade the boneIO package and restart. The device answers before
    /// the upgrade runs, with `not available` when it is not a service.
    ///
    /// `POST /api/update`
    pub async fn update(&self) -> Result<StatusResponse, Error> {
        let url = self.api_url(&["update"])?;
        self.post(url, None::<&()>).await
    }

    /// The whole configuration as the device parsed it, includes resolved.
    /// A configuration the device cannot load is an HTTP 500.
    ///
    /// `GET /api/config`
    pub async fn config(&self) -> Result<serde_json::Value, Error> {
        let url = self.api_url(&["config"])?;
        let resp: ParsedConfigResponse = self.get(url).await?;
        Ok(resp.config)
    }

    /// Journal or log-file lines. `since` is passed through verbatim
    /// (journalctl syntax, e.g. `"10m"` or an ISO timestamp).
    ///
    /// `GET /api/logs?since=&limit=`
    pub async fn logs(&self, since: Option<&str>, limit: Option<u32>) -> Result<Vec<LogEntry>, Error> {
        let mut url = self.api_url(&["logs"])?;
        let limit = limit.map(|l| l.to_string());
        let pairs: Vec<(&str, &str)> = [("since", since), ("limit", limit.as_deref())]
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        let resp: LogsResponse = self.get(url).await?;
        debug!(count = resp.logs.len(), "fetched log entries");
        Ok(resp.logs)
    }
}
