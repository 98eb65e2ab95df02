use once_cell::sync::Lazy;
use std::fs;

/// Application (client) id of the service principal used for the
/// client-credentials grant. Must be set via the `AZURE_CLIENT_ID` env
/// variable.
pub static AZURE_CLIENT_ID: Lazy<String> =
    Lazy::new(|| std::env::var("AZURE_CLIENT_ID").expect("AZURE_CLIENT_ID must be set"));

/// Client secret of the service principal. Set via `AZURE_CLIENT_SECRET`,
/// or point `AZURE_CLIENT_SECRET_FILE` at a mounted secret file.
pub static AZURE_CLIENT_SECRET: Lazy<String> = Lazy::new(|| {
    read_secret_env("AZURE_CLIENT_SECRET", "AZURE_CLIENT_SECRET_FILE")
        .expect("AZURE_CLIENT_SECRET must be set")
});

/// Identity authority instance. Defaults to the public Microsoft authority.
pub static AZURE_AUTHORITY_INSTANCE: Lazy<String> = Lazy::new(|| {
    std::env::var("AZURE_AUTHORITY_INSTANCE")
        .unwrap_or_else(|_| "https://login.microsoftonline.com".to_string())
});

/// Directory (tenant) the service principal authenticates against.
pub static AZURE_TENANT: Lazy<String> =
    Lazy::new(|| std::env::var("AZURE_TENANT").expect("AZURE_TENANT must be set"));

/// Base URL of the key-management plane. Defaults to the public Azure
/// management endpoint; integration tests point this at a local server.
pub static MANAGEMENT_BASE_URL: Lazy<String> = Lazy::new(|| {
    std::env::var("MANAGEMENT_BASE_URL")
        .unwrap_or_else(|_| "https://management.azure.com".to_string())
});

/// Per-call timeout for outbound management and identity requests, in
/// seconds. Defaults to `30`.
pub static MANAGEMENT_TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| {
    std::env::var("MANAGEMENT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(30)
});

/// Azure subscription owning the API Management service.
pub static APIM_AZURE_SUBSCRIPTION_ID: Lazy<String> = Lazy::new(|| {
    std::env::var("APIM_AZURE_SUBSCRIPTION_ID").expect("APIM_AZURE_SUBSCRIPTION_ID must be set")
});

/// Resource group containing the API Management service.
pub static APIM_RESOURCE_GROUP: Lazy<String> =
    Lazy::new(|| std::env::var("APIM_RESOURCE_GROUP").expect("APIM_RESOURCE_GROUP must be set"));

/// Name of the API Management service instance.
pub static APIM_SERVICE_NAME: Lazy<String> =
    Lazy::new(|| std::env::var("APIM_SERVICE_NAME").expect("APIM_SERVICE_NAME must be set"));

/// Id of the gateway subscription whose keys are rotated.
pub static APIM_SUBSCRIPTION_ID: Lazy<String> =
    Lazy::new(|| std::env::var("APIM_SUBSCRIPTION_ID").expect("APIM_SUBSCRIPTION_ID must be set"));

/// Shared subscription secret checked by the data endpoint.
pub static BACKEND_SUBSCRIPTION_KEY: Lazy<String> = Lazy::new(|| {
    std::env::var("BACKEND_SUBSCRIPTION_KEY").expect("BACKEND_SUBSCRIPTION_KEY must be set")
});

/// Upstream backend called by the proxy endpoint. Optional; the proxy
/// responds with an error when unset.
pub static BACKEND_API_URI: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("BACKEND_API_URI"));

/// Key required on the rotation triggers via the `x-functions-key` header.
pub static FUNCTION_KEY: Lazy<String> =
    Lazy::new(|| std::env::var("FUNCTION_KEY").expect("FUNCTION_KEY must be set"));

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_secret_env(value_key: &str, file_key: &str) -> Option<String> {
    if let Some(path) = read_optional_env(file_key) {
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let trimmed = contents.trim().to_string();
                if !trimmed.is_empty() {
                    return Some(trimmed);
                }
            }
            Err(err) => panic!("failed to read {file_key} from {path}: {err}"),
        }
    }

    read_optional_env(value_key)
}
