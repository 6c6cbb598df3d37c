use std::fs;

use serde::Deserialize;

use crate::DEFAULT_PAGE_LIMIT;

/// Backend endpoints and credentials, passed explicitly into the transport
/// constructors. There is no process-wide configuration state.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub endpoint: String,
    pub auth_endpoint: String,
    pub region: Option<String>,
    pub api_key: Option<String>,
    pub page_limit: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8443/graphql".into(),
            auth_endpoint: "http://127.0.0.1:8443/auth".into(),
            region: None,
            api_key: None,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    endpoint: Option<String>,
    auth_endpoint: Option<String>,
    region: Option<String>,
    api_key: Option<String>,
    page_limit: Option<u32>,
}

/// Loads defaults, then `albums.toml` when present, then env overrides.
pub fn load_config() -> ApiConfig {
    let mut config = ApiConfig::default();

    if let Ok(raw) = fs::read_to_string("albums.toml") {
        if let Ok(file_cfg) = toml::from_str::<FileConfig>(&raw) {
            if let Some(v) = file_cfg.endpoint {
                config.endpoint = v;
            }
            if let Some(v) = file_cfg.auth_endpoint {
                config.auth_endpoint = v;
            }
            if let Some(v) = file_cfg.region {
                config.region = Some(v);
            }
            if let Some(v) = file_cfg.api_key {
                config.api_key = Some(v);
            }
            if let Some(v) = file_cfg.page_limit {
                config.page_limit = v;
            }
        }
    }

    if let Ok(v) = std::env::var("ALBUMS_ENDPOINT") {
        config.endpoint = v;
    }
    if let Ok(v) = std::env::var("ALBUMS_AUTH_ENDPOINT") {
        config.auth_endpoint = v;
    }
    if let Ok(v) = std::env::var("ALBUMS_REGION") {
        config.region = Some(v);
    }
    if let Ok(v) = std::env::var("ALBUMS_API_KEY") {
        config.api_key = Some(v);
    }

    config
}
