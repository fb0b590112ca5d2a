use serde::{Deserialize, Serialize};

/// Remote deletion API settings.
///
/// Credentials are opaque and normally injected from the environment:
///
/// ```toml
/// [remote.auth]
/// type = "oauth1"
/// api_key = "${TWITTER_API_KEY}"
/// api_secret = "${TWITTER_API_SECRET_KEY}"
/// access_token = "${TWITTER_ACCESS_TOKEN}"
/// access_token_secret = "${TWITTER_ACCESS_TOKEN_SECRET}"
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// API base URL, without a trailing path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// How requests are authenticated. Required unless running dry.
    #[serde(default)]
    pub auth: Option<RemoteAuth>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth: None,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Request authentication.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
pub enum RemoteAuth {
    /// OAuth 1.0a user context, HMAC-SHA1 signed per request.
    #[serde(rename = "oauth1")]
    OAuth1 {
        /// Consumer key of the app.
        api_key: String,
        /// Consumer secret of the app.
        api_secret: String,
        /// User access token.
        access_token: String,
        /// User access token secret.
        access_token_secret: String,
    },

    /// OAuth 2.0 user access token with the `tweet.write` scope.
    Bearer { token: String },
}

impl RemoteAuth {
    /// True when any credential is blank.
    pub fn has_blank_credentials(&self) -> bool {
        let blank = |s: &String| s.trim().is_empty();
        match self {
            RemoteAuth::OAuth1 {
                api_key,
                api_secret,
                access_token,
                access_token_secret,
            } => [api_key, api_secret, access_token, access_token_secret]
                .into_iter()
                .any(blank),
            RemoteAuth::Bearer { token } => blank(token),
        }
    }
}

// Secrets never reach debug logs; only the scheme and the consumer key do
impl std::fmt::Debug for RemoteAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteAuth::OAuth1 { api_key, .. } => f
                .debug_struct("OAuth1")
                .field("api_key", api_key)
                .field("api_secret", &"<redacted>")
                .field("access_token", &"<redacted>")
                .field("access_token_secret", &"<redacted>")
                .finish(),
            RemoteAuth::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.twitter.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("reaper/", env!("CARGO_PKG_VERSION")).to_string()
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<(), String> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!(
                "remote.base_url must be an http(s) URL, got '{}'",
                self.base_url
            ));
        }
        if self.timeout_secs == 0 {
            return Err("remote.timeout_secs must be greater than zero".into());
        }
        Ok(())
    }
}
