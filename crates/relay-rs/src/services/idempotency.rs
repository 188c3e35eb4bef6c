//! Idempotency guard: at-most-once forwarding for keyed requests.
//!
//! A request carrying `Idempotency-Key` is fingerprinted over principal,
//! full path, method, content type, body and the client key. The guard
//! then walks the key through `absent → in_progress → cached`:
//! an atomic set-if-absent claims the key, the upstream response replaces
//! the marker on success, and an upstream failure releases the claim so
//! the client may retry. Concurrent arrivals with the same fingerprint see
//! exactly one winner; the rest get a conflict.

use std::time::Duration;

use blake2::{Blake2b512, Digest};
use log::warn;
use serde::{Deserialize, Serialize};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::cache::{Cache, DynCache};
use crate::models::error::GatewayError;
use crate::services::route_cache::{DAY, MINUTE};

pub const IN_PROGRESS: &str = "in_progress";

/// How long a successful response replays.
const RESPONSE_TTL: Duration = Duration::from_secs(15 * DAY);
/// Upper bound on how long a crashed forward can wedge its key.
const GUARD_TTL: Duration = Duration::from_secs(5 * MINUTE);

/// Response blob persisted for replay: only what translation needs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub status: u16,
    pub content_type: Option<String>,
    body: String,
}

impl StoredResponse {
    pub fn new(status: u16, content_type: Option<String>, body: &[u8]) -> Self {
        Self {
            status,
            content_type,
            body: BASE64.encode(body),
        }
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        BASE64.decode(&self.body).unwrap_or_default()
    }
}

/// Fingerprint of a keyed request. Two requests share a fingerprint only
/// when principal, path, method, content type, body and client key all
/// agree.
pub fn fingerprint(
    authorization: Option<&str>,
    full_path: &str,
    method: &str,
    content_type: &str,
    body: &[u8],
    client_key: &str,
) -> String {
    let mut hasher = Blake2b512::new();
    hasher.update(authorization.unwrap_or("Anon").as_bytes());
    hasher.update(b":");
    hasher.update(full_path.as_bytes());
    hasher.update(b":");
    hasher.update(method.as_bytes());
    hasher.update(b":");
    hasher.update(content_type.as_bytes());
    hasher.update(b":");
    hasher.update(body);
    hasher.update(b":");
    hasher.update(client_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// What `begin` decided for this request.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// The key is ours; forward upstream, then `complete` or `release`.
    Claimed,
    /// A previous request finished; replay its response.
    Replay(StoredResponse),
}

#[derive(Clone)]
pub struct IdempotencyGuard {
    cache: DynCache,
}

impl IdempotencyGuard {
    pub fn new(cache: DynCache) -> Self {
        Self { cache }
    }

    /// Resolve the key's state. `Err(Conflict)` means another request is
    /// mid-flight with the same fingerprint.
    pub async fn begin(&self, key: &str) -> Result<GuardDecision, GatewayError> {
        match self.cache.get(key).await? {
            Some(value) if value == IN_PROGRESS => Err(GatewayError::Conflict),
            Some(value) => match serde_json::from_str::<StoredResponse>(&value) {
                Ok(stored) => Ok(GuardDecision::Replay(stored)),
                Err(_) => {
                    // unreadable blob; drop it and race for the claim
                    self.cache.delete(key).await?;
                    self.claim(key).await
                }
            },
            None => self.claim(key).await,
        }
    }

    async fn claim(&self, key: &str) -> Result<GuardDecision, GatewayError> {
        if self.cache.add(key, IN_PROGRESS, Some(GUARD_TTL)).await? {
            Ok(GuardDecision::Claimed)
        } else {
            Err(GatewayError::Conflict)
        }
    }

    /// Replace the in-progress marker with the response to replay.
    pub async fn complete(&self, key: &str, response: &StoredResponse) -> Result<(), GatewayError> {
        let blob = serde_json::to_string(response)
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        self.cache.set(key, &blob, Some(RESPONSE_TTL)).await?;
        Ok(())
    }

    /// Drop the claim after an upstream failure so the next attempt may
    /// proceed. Release failures only cost latency (the marker lingers
    /// until its TTL), so they are logged and swallowed.
    pub async fn release(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!("failed to release idempotency marker {key}: {e}");
        }
    }
}

/// Cancellation backstop for a claimed key. A client disconnect drops the
/// handler future mid-forward, so the explicit release never runs; this
/// guard spawns it from `Drop` instead. Disarm once the forward has been
/// settled through `complete` or an explicit `release`.
pub struct ReleaseGuard {
    guard: IdempotencyGuard,
    key: Option<String>,
}

impl ReleaseGuard {
    pub fn new(guard: IdempotencyGuard, key: String) -> Self {
        Self {
            guard,
            key: Some(key),
        }
    }

    pub fn disarm(mut self) {
        self.key = None;
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else { return };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let guard = self.guard.clone();
            handle.spawn(async move { guard.release(&key).await });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_sensitivity() {
        let base = fingerprint(
            Some("Bearer t"),
            "/api/orders",
            "POST",
            "application/json",
            br#"{"v":1}"#,
            "k1",
        );
        let same = fingerprint(
            Some("Bearer t"),
            "/api/orders",
            "POST",
            "application/json",
            br#"{"v":1}"#,
            "k1",
        );
        assert_eq!(base, same);

        let other_body = fingerprint(
            Some("Bearer t"),
            "/api/orders",
            "POST",
            "application/json",
            br#"{"v":2}"#,
            "k1",
        );
        assert_ne!(base, other_body);

        let other_principal = fingerprint(
            None,
            "/api/orders",
            "POST",
            "application/json",
            br#"{"v":1}"#,
            "k1",
        );
        assert_ne!(base, other_principal);

        let other_key = fingerprint(
            Some("Bearer t"),
            "/api/orders",
            "POST",
            "application/json",
            br#"{"v":1}"#,
            "k2",
        );
        assert_ne!(base, other_key);
    }

    #[test]
    fn test_stored_response_round_trip() {
        let stored = StoredResponse::new(201, Some("application/json".to_string()), br#"{"id":7}"#);
        let raw = serde_json::to_string(&stored).unwrap();
        let back: StoredResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, stored);
        assert_eq!(back.body_bytes(), br#"{"id":7}"#);
    }
}
