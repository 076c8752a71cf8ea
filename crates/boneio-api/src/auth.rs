// Authentication endpoints
//
// The device issues a JWT from `/api/login`; every other `/api` route
// expects it as a bearer token. `/api/auth/required` and `/api/version`
// stay open so a client can discover whether to prompt at all.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::client::BoneioClient;
use crate::error::Error;
use crate::models::{AuthRequiredResponse, LoginResponse};

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

impl BoneioClient {
    /// Whether the device demands a login.
    ///
    /// `GET /api/auth/required`
    pub async fn auth_required(&self) -> Result<bool, Error> {
        let url = self.api_url(&["auth", "required"])?;
        let resp: AuthRequiredResponse = self.get(url).await?;
        debug!(required = resp.required, "auth requirement");
        Ok(resp.required)
    }

    /// Exchange credentials for a bearer token.
    ///
    /// `POST /api/login`. On success the token is stored on the client and
    /// returned so the caller can persist it. A 401 becomes
    /// [`Error::Authentication`].
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<SecretString, Error> {
        let url = self.api_url(&["login"])?;
        let body = LoginBody {
            username,
            password: password.expose_secret(),
        };

        let resp: LoginResponse = match self.post(url, Some(&body)).await {
            Ok(resp) => resp,
            Err(Error::Unauthorized) => {
                return Err(Error::Authentication {
                    message: "invalid credentials".into(),
                });
            }
            Err(e) => return Err(e),
        };

        let token = SecretString::from(resp.token);
        self.set_token(Some(token.clone()));
        debug!(username, "login succeeded");
        Ok(token)
    }
}
