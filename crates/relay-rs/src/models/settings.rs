use serde::{Deserialize, Serialize};

/// Runtime settings, resolved from the environment at startup.
///
/// The route/upstream/consumer snapshot lives in a separate JSON file
/// (`config_path`); everything here is process-level wiring.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    /// Bind address for the HTTP server.
    pub host: String,
    /// Bind port for the HTTP server.
    pub port: u16,
    /// Path to the JSON config-store snapshot.
    pub config_path: String,
    /// Shared cache URL (`redis://…`). Absent means a process-local cache.
    pub cache_url: Option<String>,
    /// Secret used to verify admin Bearer tokens.
    pub jwt_secret: String,
    /// Auth-server base URL. Informational: names the expected token
    /// audience, the gateway never calls it.
    pub auth_server: Option<String>,
    /// Origins exempt from the request-rate firewall.
    pub ddos_whitelist: Vec<String>,
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("bind host must not be empty".to_string());
        }
        if self.config_path.is_empty() {
            return Err("config path must not be empty".to_string());
        }
        if self.jwt_secret.is_empty() {
            return Err("jwt secret must not be empty".to_string());
        }
        if let Some(url) = &self.cache_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(format!("unsupported cache url: {url}"));
            }
        }
        Ok(())
    }
}
