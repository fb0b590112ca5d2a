//! Remote deletion API.
//!
//! The pipeline only depends on [`RemoteDeleter`]; [`HttpDeleter`] is the
//! production implementation over the v2 HTTP API, authenticated
//! with an OAuth 1.0a signature or a bearer token.

mod error;
mod http;
mod oauth;
mod traits;

pub use error::{DeleteFailure, RemoteError};
pub use http::HttpDeleter;
pub use traits::{DisabledDeleter, RemoteDeleter, RemoteId};
