use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{backend_api, gate, rotation};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/keys/regenerate", post(rotation::regenerate_keys))
        .route("/api/keys", patch(rotation::set_keys))
        .route("/api/data", get(gate::get_data))
        .route("/api/backend", get(backend_api::call_backend))
}
