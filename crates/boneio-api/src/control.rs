// Output and cover control endpoints.

use serde::Serialize;

use crate::client::BoneioClient;
use crate::error::Error;
use crate::models::{CoverAction, StatusResponse};

#[derive(Serialize)]
struct ActionBody {
    action: CoverAction,
}

#[derive(Serialize)]
struct PositionBody {
    position: u8,
}

#[derive(Serialize)]
struct TiltBody {
    tilt: u8,
}

impl BoneioClient {
    /// Flip a relay output. The device answers with the resulting state
    /// (`ON`/`OFF`) or `error`.
    ///
    /// `POST /api/outputs/{id}/toggle`
    pub async fn toggle_output(&self, id: &str) -> Result<StatusResponse, Error> {
        let url = self.api_url(&["outputs", id, "toggle"])?;
        self.post(url, None::<&()>).await
    }

    /// `POST /api/covers/{id}/action`
    pub async fn cover_action(&self, id: &str, action: CoverAction) -> Result<StatusResponse, Error> {
        let url = self.api_url(&["covers", id, "action"])?;
        self.post(url, Some(&ActionBody { action })).await
    }

    /// `POST /api/covers/{id}/set_position`
    pub async fn set_cover_position(&self, id: &str, position: u8) -> Result<StatusResponse, Error> {
        let url = self.api_url(&["covers", id, "set_position"])?;
        self.post(url, Some(&PositionBody { position })).await
    }

    /// Venetian covers only; other kinds are rejected with HTTP 400.
    ///
    /// `POST /api/covers/{id}/set_tilt`
    pub async fn set_cover_tilt(&self, id: &str, tilt: u8) -> Result<StatusResponse, Error> {
        let url = self.api_url(&["covers", id, "set_tilt"])?;
        self.post(url, Some(&TiltBody { tilt })).await
    }

    /// Ask the service to exit so its supervisor restarts it. Returns
    /// `not available` when the device is not running as a service.
    ///
    /// `POST /api/restart`
    pub async fn restart(&self) -> Result<StatusResponse, Error> {
        let url = self.api_url(&["restart"])?;
        self.post(url, None::<&()>).await
    }
}
