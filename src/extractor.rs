use axum::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::gate;

const FUNCTION_KEY_HEADER: &str = "x-functions-key";

/// Admission guard for the rotation triggers. The presented key is
/// compared constant-time against the configured function key.
pub struct FunctionKey;

#[async_trait]
impl<S> FromRequestParts<S> for FunctionKey
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(FUNCTION_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        if gate::keys_match(presented, crate::config::FUNCTION_KEY.as_str()) {
            Ok(FunctionKey)
        } else {
            Err((
                StatusCode::UNAUTHORIZED,
                "Missing or invalid function key".into(),
            ))
        }
    }
}
