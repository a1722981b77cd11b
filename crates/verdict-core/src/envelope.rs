//! Envelope unwrapping for non-streaming service calls.
//!
//! Every JSON endpoint returns a status code plus a possibly-absent decoded
//! body. `unwrap_envelope` turns that pair into a typed body or a typed
//! error, so call sites report failures uniformly ("suiteRunStatus failed
//! with status code 500") instead of leaking raw transport errors.

use thiserror::Error;
use tracing::debug;

/// A decoded HTTP response: status code and body, if one could be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<T> {
    pub status_code: u16,
    pub body: Option<T>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401 from the service. Not retried; the key is wrong, waiting won't fix it.
    #[error("invalid API key (unable to authenticate)")]
    Auth,

    #[error("{api_name} failed with status code {status_code}")]
    Http { api_name: String, status_code: u16 },

    /// The request never produced an envelope (connect/read failure).
    /// Raised by the transport, never by `unwrap_envelope`.
    #[error("{api_name} transport failure: {detail}")]
    Transport { api_name: String, detail: String },
}

/// Unwrap a response envelope into its body.
///
/// Pure: same envelope in, same result out. 401 maps to [`ApiError::Auth`];
/// any other non-2xx status, or a 2xx with no decodable body, maps to
/// [`ApiError::Http`] tagged with the endpoint name.
pub fn unwrap_envelope<T>(envelope: Envelope<T>, api_name: &str) -> Result<T, ApiError> {
    debug!(api = api_name, status = envelope.status_code, "service response");

    if envelope.status_code == 401 {
        return Err(ApiError::Auth);
    }

    if !(200..300).contains(&envelope.status_code) {
        return Err(ApiError::Http {
            api_name: api_name.to_string(),
            status_code: envelope.status_code,
        });
    }

    envelope.body.ok_or_else(|| ApiError::Http {
        api_name: api_name.to_string(),
        status_code: envelope.status_code,
    })
}
