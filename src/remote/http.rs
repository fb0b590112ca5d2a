use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, header::AUTHORIZATION};
use serde::Deserialize;

use super::{
    error::{DeleteFailure, RemoteError},
    oauth::OAuth1Signer,
    traits::{RemoteDeleter, RemoteId},
};
use crate::config::{RemoteAuth, RemoteConfig};

/// Longest response body kept in a failure reason.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Deletes records through the v2 HTTP API (`DELETE /2/tweets/{id}`).
pub struct HttpDeleter {
    client: Client,
    base_url: String,
    auth: Authorization,
}

enum Authorization {
    OAuth1(OAuth1Signer),
    Bearer(String),
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    data: DeleteData,
}

#[derive(Debug, Deserialize)]
struct DeleteData {
    deleted: bool,
}

impl HttpDeleter {
    /// Build a client from configuration.
    ///
    /// Fails when `remote.auth` is absent or any of its credentials is blank.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let auth = match &config.auth {
            Some(auth) if auth.has_blank_credentials() => {
                return Err(RemoteError::MissingCredentials);
            }
            Some(RemoteAuth::OAuth1 {
                api_key,
                api_secret,
                access_token,
                access_token_secret,
            }) => Authorization::OAuth1(OAuth1Signer::new(
                api_key.trim(),
                api_secret.trim(),
                access_token.trim(),
                access_token_secret.trim(),
            )?),
            Some(RemoteAuth::Bearer { token }) => {
                Authorization::Bearer(token.trim().to_string())
            }
            None => return Err(RemoteError::MissingCredentials),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn endpoint(&self, id: &str) -> String {
        format!("{}/2/tweets/{}", self.base_url, id)
    }
}

#[async_trait]
impl RemoteDeleter for HttpDeleter {
    async fn delete_by_id(&self, id: &str) -> Result<RemoteId, DeleteFailure> {
        let url = self.endpoint(id);
        let request = self.client.delete(&url);
        let request = match &self.auth {
            Authorization::OAuth1(signer) => {
                request.header(AUTHORIZATION, signer.authorize("DELETE", &url))
            }
            Authorization::Bearer(token) => request.bearer_auth(token),
        };
        let response = request
            .send()
            .await
            .map_err(|e| DeleteFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: DeleteResponse = response
                .json()
                .await
                .map_err(|e| DeleteFailure::InvalidResponse(e.to_string()))?;
            return if body.data.deleted {
                Ok(RemoteId(id.to_string()))
            } else {
                Err(DeleteFailure::NotConfirmed)
            };
        }

        match status {
            StatusCode::NOT_FOUND => Err(DeleteFailure::NotFound),
            StatusCode::TOO_MANY_REQUESTS => Err(DeleteFailure::RateLimited {
                reset: rate_limit_reset(response.headers()),
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(DeleteFailure::Unauthorized(error_body(response).await))
            }
            _ => Err(DeleteFailure::Status {
                status: status.as_u16(),
                body: error_body(response).await,
            }),
        }
    }
}

/// Parse the `x-rate-limit-reset` header (epoch seconds).
fn rate_limit_reset(headers: &reqwest::header::HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get("x-rate-limit-reset")?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

async fn error_body(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) => text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        Err(e) => format!("<unreadable body: {}>", e),
    }
}
