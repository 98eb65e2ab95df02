use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config;

pub const AUTHORIZED_PAYLOAD: &str = "Bears, beets, battlestar galactica!";
pub const UNAUTHORIZED_MESSAGE: &str = "Not authorized to query data";

const SUBSCRIPTION_KEY_HEADER: &str = "SUBSCRIPTION-KEY";

/// Outcome of one gate evaluation. Constructed and dropped within the
/// request; nothing is mutated anywhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub authorized: bool,
    pub payload: String,
}

/// Exact, case-sensitive match against the configured secret. An absent
/// header behaves as a non-matching empty string.
pub fn authorize(presented: Option<&str>, secret: &str) -> Verdict {
    if keys_match(presented.unwrap_or(""), secret) {
        Verdict {
            authorized: true,
            payload: AUTHORIZED_PAYLOAD.to_string(),
        }
    } else {
        Verdict {
            authorized: false,
            payload: UNAUTHORIZED_MESSAGE.to_string(),
        }
    }
}

/// Compares fixed-width digests with an XOR fold so neither the content
/// nor the length of the secret leaks through timing.
pub(crate) fn keys_match(presented: &str, secret: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(secret.as_bytes());
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[derive(Serialize)]
pub struct DataResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Anonymous endpoint. The verdict decides the payload, never the status
/// code; the gate itself cannot fail.
pub async fn get_data(headers: HeaderMap) -> Json<DataResponse> {
    let presented = headers
        .get(SUBSCRIPTION_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    let verdict = authorize(presented, config::BACKEND_SUBSCRIPTION_KEY.as_str());
    if verdict.authorized {
        Json(DataResponse {
            status: "Authorized to query data".into(),
            data: Some(verdict.payload),
        })
    } else {
        Json(DataResponse {
            status: verdict.payload,
            data: None,
        })
    }
}
