//! OAuth 1.0a request signing (HMAC-SHA1).

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::{Rng, distributions::Alphanumeric};
use sha1::Sha1;

use super::error::RemoteError;

type HmacSha1 = Hmac<Sha1>;

/// Everything but the RFC 3986 unreserved characters.
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const NONCE_LEN: usize = 32;

fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE).to_string()
}

/// Signs requests on behalf of one user of one app.
pub(crate) struct OAuth1Signer {
    consumer_key: String,
    token: String,
    /// Keyed with `consumer_secret&token_secret`; cloned per request.
    mac: HmacSha1,
}

impl OAuth1Signer {
    pub(crate) fn new(
        consumer_key: &str,
        consumer_secret: &str,
        token: &str,
        token_secret: &str,
    ) -> Result<Self, RemoteError> {
        let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
        let mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| RemoteError::InvalidCredentials(e.to_string()))?;
        Ok(Self {
            consumer_key: consumer_key.to_string(),
            token: token.to_string(),
            mac,
        })
    }

    /// `Authorization` header value for a request with no query or form
    /// parameters, using a fresh nonce and the current time.
    pub(crate) fn authorize(&self, method: &str, url: &str) -> String {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp();
        self.header(method, url, &[], &nonce, timestamp)
    }

    /// Build the header for fixed inputs.
    ///
    /// `url` must be the base URL without query string; query and form
    /// parameters go in `params`.
    pub(crate) fn header(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> String {
        let timestamp = timestamp.to_string();
        let oauth_params = [
            ("oauth_consumer_key", self.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut encoded: Vec<(String, String)> = oauth_params
            .iter()
            .map(|(k, v)| (encode(k), encode(v)))
            .collect();
        encoded.extend(params.iter().map(|(k, v)| (encode(k), encode(v))));
        encoded.sort();
        let param_string = encoded
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");

        let base = format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            encode(url),
            encode(&param_string)
        );
        let mut mac = self.mac.clone();
        mac.update(base.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        let mut fields: Vec<(&str, &str)> = oauth_params.to_vec();
        fields.insert(2, ("oauth_signature", signature.as_str()));
        let fields = fields
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("OAuth {fields}")
    }
}
