mod backend_api;
mod config;
mod error;
mod extractor;
mod gate;
mod identity;
mod management;
mod rotation;
mod routes;

use crate::rotation::RotationCoordinator;
use crate::routes::api_routes;

use axum::{routing::get, Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

async fn root() -> &'static str {
    "Subscription Key Rotation API"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    // Fail fast if identity, gateway, or gate configuration is missing
    let _ = config::AZURE_CLIENT_ID.as_str();
    let _ = config::AZURE_CLIENT_SECRET.as_str();
    let _ = config::AZURE_TENANT.as_str();
    let _ = config::APIM_AZURE_SUBSCRIPTION_ID.as_str();
    let _ = config::APIM_RESOURCE_GROUP.as_str();
    let _ = config::APIM_SERVICE_NAME.as_str();
    let _ = config::APIM_SUBSCRIPTION_ID.as_str();
    let _ = config::BACKEND_SUBSCRIPTION_KEY.as_str();
    let _ = config::FUNCTION_KEY.as_str();

    let coordinator = Arc::new(RotationCoordinator::from_env()?);

    let (prometheus_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let app = Router::new()
        .route("/", get(root))
        .route(
            "/metrics",
            get(move || async move { metrics_handle.render() }),
        )
        .merge(api_routes())
        .layer(prometheus_layer)
        .layer(Extension(coordinator));

    let addr: SocketAddr = format!("{}:{}", config::BIND_ADDRESS.as_str(), *config::BIND_PORT)
        .parse()
        .map_err(|error| Box::new(error) as Box<dyn std::error::Error>)?;
    tracing::info!(%addr, "Listening for incoming connections");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
