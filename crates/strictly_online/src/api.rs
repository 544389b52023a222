//! Request/response client for the game server's REST API.

use async_trait::async_trait;
use derive_getters::Getters;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::error::ApiError;
use crate::session::{RoomId, RoomSummary, UserId};

/// Fallback message when the server gives no usable reason.
const GENERIC_FAILURE: &str = "Something went wrong";

/// Room operations the session controller delegates to the server.
#[async_trait]
pub trait RoomApi: Send + Sync {
    /// Lists all rooms.
    async fn get_rooms(&self, token: &str) -> Result<Vec<RoomSummary>, ApiError>;

    /// Creates a room named `name`.
    async fn create_room(&self, name: &str, token: &str) -> Result<(), ApiError>;

    /// Asks the server to pick a room for the caller.
    async fn join_random_room(&self, token: &str) -> Result<RoomId, ApiError>;
}

/// An account on the game server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct User {
    /// User id, as referenced by sessions and rooms.
    #[serde(alias = "_id")]
    id: UserId,
    /// Display name.
    #[serde(default)]
    username: String,
    /// Login email.
    #[serde(default)]
    email: String,
}

/// Result of logging in or signing up.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct AuthSession {
    /// The authenticated user.
    user: User,
    /// Bearer token for later calls and the WebSocket handshake.
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RandomJoin {
    #[serde(rename = "roomId")]
    room_id: RoomId,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MeResponse {
    Wrapped { user: User },
    Bare(User),
}

/// HTTP implementation of [`RoomApi`] plus the account endpoints.
#[derive(Debug, Clone)]
pub struct RestApi {
    base_url: String,
    client: reqwest::Client,
}

impl RestApi {
    /// Creates a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Server base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Returns the body of a 200 response, or the server's reason for anything else.
    async fn check(response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::OK {
            return Ok(body);
        }
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE.to_string());
        warn!(status = status.as_u16(), %message, "Request rejected");
        Err(ApiError::new(message).with_status(status.as_u16()))
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let body = Self::check(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::new(format!("Unexpected response body: {}", e)).with_status(200))
    }

    /// Logs in with email and password.
    #[instrument(skip(self, password), fields(base_url = %self.base_url))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        let response = self
            .client
            .post(self.url("/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let session: AuthSession = Self::read(response).await?;
        info!(user_id = %session.user.id, "Logged in");
        Ok(session)
    }

    /// Registers a new account and logs it in.
    #[instrument(skip(self, password), fields(base_url = %self.base_url))]
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ApiError> {
        let response = self
            .client
            .post(self.url("/signIn"))
            .json(&json!({ "username": username, "email": email, "password": password }))
            .send()
            .await?;
        let session: AuthSession = Self::read(response).await?;
        info!(user_id = %session.user.id, "Signed up");
        Ok(session)
    }

    /// Resolves a token to its user.
    #[instrument(skip(self, token), fields(base_url = %self.base_url))]
    pub async fn current_user(&self, token: &str) -> Result<User, ApiError> {
        let response = self
            .client
            .get(self.url("/auth/me"))
            .bearer_auth(token)
            .send()
            .await?;
        let user = match Self::read::<MeResponse>(response).await? {
            MeResponse::Wrapped { user } | MeResponse::Bare(user) => user,
        };
        debug!(user_id = %user.id, "Resolved current user");
        Ok(user)
    }
}

#[async_trait]
impl RoomApi for RestApi {
    #[instrument(skip(self, token), fields(base_url = %self.base_url))]
    async fn get_rooms(&self, token: &str) -> Result<Vec<RoomSummary>, ApiError> {
        let response = self
            .client
            .get(self.url("/rooms"))
            .bearer_auth(token)
            .send()
            .await?;
        let rooms: Vec<RoomSummary> = Self::read(response).await?;
        debug!(count = rooms.len(), "Fetched rooms");
        Ok(rooms)
    }

    #[instrument(skip(self, token), fields(base_url = %self.base_url))]
    async fn create_room(&self, name: &str, token: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url("/rooms"))
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
            .await?;
        Self::check(response).await?;
        info!("Room created");
        Ok(())
    }

    #[instrument(skip(self, token), fields(base_url = %self.base_url))]
    async fn join_random_room(&self, token: &str) -> Result<RoomId, ApiError> {
        let response = self
            .client
            .post(self.url("/rooms/random/join"))
            .bearer_auth(token)
            .send()
            .await?;
        let RandomJoin { room_id } = Self::read(response).await?;
        info!(%room_id, "Server picked a room");
        Ok(room_id)
    }
}
