//! Caller identification.
//!
//! The API sits behind a gateway that authenticates users and forwards
//! the caller identity in a header. This extractor accepts that header,
//! a bearer token, or a `token` query parameter (for audio elements
//! that cannot set headers), in that order.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::ApiError;

/// Identity of the authenticated caller, as forwarded by the gateway.
#[derive(Debug, Clone)]
pub struct CallerId(pub String);

impl CallerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Maximum accepted caller id length.
const MAX_CALLER_ID_LENGTH: usize = 128;

fn is_valid_caller_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_CALLER_ID_LENGTH
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '.')
}

fn from_parts_sync(parts: &Parts) -> Result<CallerId, ApiError> {
    // Gateway-forwarded header
    if let Some(id) = parts
        .headers
        .get("X-Caller-Id")
        .and_then(|v| v.to_str().ok())
    {
        if is_valid_caller_id(id) {
            return Ok(CallerId(id.to_string()));
        }
        return Err(ApiError::unauthorized("Malformed caller id"));
    }

    // Bearer token
    if let Some(token) = parts
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        if is_valid_caller_id(token) {
            return Ok(CallerId(token.to_string()));
        }
        return Err(ApiError::unauthorized("Malformed bearer token"));
    }

    // Query parameter fallback for media elements
    if let Some(query) = parts.uri.query() {
        for pair in query.split('&') {
            if let Some(token) = pair.strip_prefix("token=") {
                if is_valid_caller_id(token) {
                    return Ok(CallerId(token.to_string()));
                }
                return Err(ApiError::unauthorized("Malformed token parameter"));
            }
        }
    }

    Err(ApiError::unauthorized("Missing caller identity"))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        from_parts_sync(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_for(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_header_takes_precedence() {
        let parts = parts_for(
            "/api/tracks/t1/stream?token=query-user",
            &[("X-Caller-Id", "header-user"), ("Authorization", "Bearer bearer-user")],
        );
        assert_eq!(from_parts_sync(&parts).unwrap().as_str(), "header-user");
    }

    #[test]
    fn test_bearer_token_accepted() {
        let parts = parts_for("/api/tracks/t1/stream", &[("Authorization", "Bearer user-42")]);
        assert_eq!(from_parts_sync(&parts).unwrap().as_str(), "user-42");
    }

    #[test]
    fn test_query_token_accepted() {
        let parts = parts_for("/api/tracks/t1/stream?foo=1&token=listener", &[]);
        assert_eq!(from_parts_sync(&parts).unwrap().as_str(), "listener");
    }

    #[test]
    fn test_missing_identity_rejected() {
        let parts = parts_for("/api/tracks/t1/stream", &[]);
        assert!(matches!(
            from_parts_sync(&parts),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_malformed_caller_id_rejected() {
        let parts = parts_for("/api/tracks/t1/stream", &[("X-Caller-Id", "bad caller id")]);
        assert!(matches!(
            from_parts_sync(&parts),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
