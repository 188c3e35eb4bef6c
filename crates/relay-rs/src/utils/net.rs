use std::net::SocketAddr;

use actix_web::http::header::HeaderMap;

/// Requesting origin: the peer's IP, or the first `X-Forwarded-For` entry
/// when the connection came through another proxy. `None` when neither is
/// available.
pub fn client_origin(peer: Option<SocketAddr>, headers: &HeaderMap) -> Option<String> {
    if let Some(addr) = peer {
        return Some(addr.ip().to_string());
    }
    headers
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
}
