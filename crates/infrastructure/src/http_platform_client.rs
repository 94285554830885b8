use async_trait::async_trait;
use chrono::Duration;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use url::form_urlencoded;

use ecumene_application::PlatformClient;
use ecumene_core::{AppError, AppResult};
use ecumene_domain::TokenGrant;


const TOKEN_PATH: &str = "Platform/App/OAuth/Token/";

/// Application credentials registered with the external platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformApplication {
    /// Platform base URL, e.g. `https://www.bungie.net`.
    pub endpoint: String,
    /// Value sent in the `X-API-Key` header.
    pub api_key: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Value sent in the `User-Agent` header.
    pub user_agent: String,
}

/// Platform client exchanging refresh tokens over the OAuth token endpoint.
#[derive(Clone)]
pub struct HttpPlatformClient {
    http_client: reqwest::Client,
    application: PlatformApplication,
    token_url: String,
}

impl HttpPlatformClient {
    /// Creates a client for one registered platform application.
    #[must_use]
    pub fn new(http_client: reqwest::Client, application: PlatformApplication) -> Self {
        let token_url = format!(
            "{}/{TOKEN_PATH}",
            application.endpoint.trim_end_matches('/')
        );

        Self {
            http_client,
            application,
            token_url,
        }
    }

    fn refresh_body(&self, refresh_token: &str) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", self.application.client_id.as_str())
            .append_pair("client_secret", self.application.client_secret.as_str())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: String,
    refresh_expires_in: i64,
}

impl TryFrom<TokenResponse> for TokenGrant {
    type Error = AppError;

    fn try_from(value: TokenResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            access_token: value.access_token,
            access_ttl: lifetime("expires_in", value.expires_in)?,
            refresh_token: value.refresh_token,
            refresh_ttl: lifetime("refresh_expires_in", value.refresh_expires_in)?,
        })
    }
}

fn lifetime(field: &str, seconds: i64) -> AppResult<Duration> {
    if seconds < 0 {
        return Err(AppError::Internal(format!(
            "invalid platform token response: negative {field} {seconds}"
        )));
    }

    Duration::try_seconds(seconds).ok_or_else(|| {
        AppError::Internal(format!(
            "invalid platform token response: {field} {seconds} is out of range"
        ))
    })
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "ErrorStatus")]
    error_status: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

fn parse_token_response(body: &str) -> AppResult<TokenGrant> {
    serde_json::from_str::<TokenResponse>(body)
        .map_err(|error| AppError::Internal(format!("invalid platform token response: {error}")))?
        .try_into()
}

fn provider_error(status: u16, body: &str) -> AppError {
    let response = serde_json::from_str::<ErrorResponse>(body).unwrap_or_default();
    let description = response
        .error_status
        .or(response.error_description)
        .or(response.error)
        .unwrap_or_else(|| format!("platform returned status {status}"));

    AppError::Provider {
        status,
        description,
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn refresh_credential(&self, refresh_token: &str) -> AppResult<TokenGrant> {
        tracing::debug!(url = %self.token_url, "requesting platform token refresh");

        let response = self
            .http_client
            .post(self.token_url.as_str())
            .header("X-API-Key", self.application.api_key.as_str())
            .header(USER_AGENT, self.application.user_agent.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.refresh_body(refresh_token))
            .send()
            .await
            .map_err(|error| AppError::Provider {
                status: 0,
                description: format!("platform token request failed: {error}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| AppError::Provider {
            status: status.as_u16(),
            description: format!("failed to read platform token response: {error}"),
        })?;

        if !status.is_success() {
            return Err(provider_error(status.as_u16(), body.as_str()));
        }

        parse_token_response(body.as_str())
    }
}
