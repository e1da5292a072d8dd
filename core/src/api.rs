use crate::auth::AuthApi;
use crate::error::{ClientError, RefreshError};
use crate::models::{Conversation, User};
use crate::store::Credential;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

/// `GET /user/me`.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    async fn me(&self, credential: &Credential) -> Result<User, ClientError>;
}

/// Conversation listing, `GET /chat`.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn list_chats(&self, credential: &Credential) -> Result<Vec<Conversation>, ClientError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct PhoneLogin<'a> {
    phone: &'a str,
    password: &'a str,
}

/// REST client for the job-board backend. Keeps a cookie jar so the refresh
/// endpoint sees the session cookie set at login.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base: Url,
}

impl HttpApi {
    pub fn new(mut base: Url) -> Result<Self, ClientError> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|err| ClientError::validation(format!("bad endpoint {path}: {err}")))
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn refresh(&self) -> Result<String, RefreshError> {
        let url = self
            .endpoint("auth/refresh")
            .map_err(|err| RefreshError::malformed(err.to_string()))?;
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|err| RefreshError::network(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(refresh_status_error(status));
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| RefreshError::network(err.to_string()))?;
        let token: TokenResponse = serde_json::from_slice(&body)
            .map_err(|err| RefreshError::malformed(err.to_string()))?;
        Ok(token.access_token)
    }

    async fn login_by_phone(&self, phone: &str, password: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.endpoint("auth/login-by-phone")?)
            .json(&PhoneLogin { phone, password })
            .send()
            .await?;
        let token: TokenResponse = decode(response).await?;
        if token.access_token.is_empty() {
            return Err(ClientError::validation("login returned an empty access token"));
        }
        Ok(token.access_token)
    }
}

#[async_trait]
impl ProfileApi for HttpApi {
    async fn me(&self, credential: &Credential) -> Result<User, ClientError> {
        let response = self
            .client
            .get(self.endpoint("user/me")?)
            .bearer_auth(&credential.access_token)
            .send()
            .await?;
        decode(response).await
    }
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn list_chats(&self, credential: &Credential) -> Result<Vec<Conversation>, ClientError> {
        let response = self
            .client
            .get(self.endpoint("chat")?)
            .bearer_auth(&credential.access_token)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }
    let body = response.bytes().await?;
    let decoded = serde_json::from_slice(&body).map_err(|err| {
        tracing::warn!(%err, "unexpected response shape");
        ClientError::from(err)
    })?;
    Ok(decoded)
}

/// Maps a non-success status on an authorized call to the error taxonomy.
pub fn status_error(status: StatusCode, body: &str) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED => ClientError::unauthenticated(),
        StatusCode::FORBIDDEN => ClientError::forbidden(),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ClientError::validation(format!("{status}: {body}"))
        }
        _ => ClientError::network(format!("{status}: {body}")),
    }
}

/// Maps a non-success status on the refresh endpoint.
pub fn refresh_status_error(status: StatusCode) -> RefreshError {
    if status.is_server_error() {
        RefreshError::network(status.to_string())
    } else {
        RefreshError::rejected(status.to_string())
    }
}
