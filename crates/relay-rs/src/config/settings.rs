use std::fs;
use std::path::Path;

use log::debug;

use crate::models::settings::Settings;
use crate::store::StoreSnapshot;

const MAX_SNAPSHOT_SIZE: u64 = 10 * 1024 * 1024;

/// Resolve runtime settings from the environment.
///
/// # Environment Variables
///
/// - `RELAY_HOST` / `RELAY_PORT`: bind address (default `0.0.0.0:5900`)
/// - `RELAY_CONFIG_PATH`: store snapshot path (default `./config.json`)
/// - `RELAY_CACHE_URL`: shared cache URL; unset means in-process cache
/// - `RELAY_JWT_SECRET`: admin-token verification secret
/// - `RELAY_AUTH_SERVER`: auth-server base URL (informational)
/// - `RELAY_DDOS_WHITELIST`: comma-separated origins exempt from
///   throttling (default `192.168.0.1`)
pub fn load_settings() -> Result<Settings, Box<dyn std::error::Error>> {
    let host = std::env::var("RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("RELAY_PORT")
        .unwrap_or_else(|_| "5900".to_string())
        .parse::<u16>()
        .map_err(|e| format!("invalid RELAY_PORT: {e}"))?;
    let config_path =
        std::env::var("RELAY_CONFIG_PATH").unwrap_or_else(|_| "./config.json".to_string());
    let cache_url = std::env::var("RELAY_CACHE_URL").ok().filter(|v| !v.is_empty());
    let jwt_secret = std::env::var("RELAY_JWT_SECRET").unwrap_or_default();
    let auth_server = std::env::var("RELAY_AUTH_SERVER").ok().filter(|v| !v.is_empty());
    let ddos_whitelist = std::env::var("RELAY_DDOS_WHITELIST")
        .unwrap_or_else(|_| "192.168.0.1".to_string())
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect();

    Ok(Settings {
        host,
        port,
        config_path,
        cache_url,
        jwt_secret,
        auth_server,
        ddos_whitelist,
    })
}

/// Load the config-store snapshot from disk.
///
/// The file must resolve inside the working directory and stay under
/// 10 MB, so a misconfigured path cannot pull in arbitrary or oversized
/// files.
pub fn load_snapshot(config_path: &str) -> Result<StoreSnapshot, Box<dyn std::error::Error>> {
    debug!("Loading store snapshot from: {config_path}");

    let path = Path::new(config_path);
    if !path.exists() {
        return Err(format!("Cannot resolve snapshot path '{config_path}'").into());
    }

    let canonical_path = path
        .canonicalize()
        .map_err(|e| format!("Cannot resolve snapshot path '{config_path}': {e}"))?;
    let current_dir =
        std::env::current_dir().map_err(|e| format!("Cannot get current directory: {e}"))?;
    if !canonical_path.starts_with(&current_dir) {
        return Err("Snapshot path outside working directory".into());
    }

    let metadata = fs::metadata(&canonical_path)
        .map_err(|e| format!("Cannot read snapshot metadata: {e}"))?;
    if metadata.len() > MAX_SNAPSHOT_SIZE {
        return Err(format!(
            "Snapshot file too large: {} bytes (max: {} bytes)",
            metadata.len(),
            MAX_SNAPSHOT_SIZE
        )
        .into());
    }

    let raw = fs::read_to_string(&canonical_path)
        .map_err(|e| format!("Cannot read snapshot file: {e}"))?;
    let snapshot: StoreSnapshot =
        serde_json::from_str(&raw).map_err(|e| format!("Invalid JSON: {e}"))?;

    debug!(
        "Loaded snapshot: {} upstreams, {} targets, {} routes, {} consumers",
        snapshot.upstreams.len(),
        snapshot.targets.len(),
        snapshot.apis.len(),
        snapshot.consumers.len()
    );
    Ok(snapshot)
}
