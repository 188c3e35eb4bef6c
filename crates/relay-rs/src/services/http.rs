//! Request orchestration: the dataplane's hot path.
//!
//! For every inbound request the handler runs
//! `path validate → route lookup → plugin check → idempotency guard →
//! load-balanced forward → response translation`, recording one access-log
//! entry on the way out. The DDoS middleware has already run by the time a
//! request reaches this code.

use std::sync::Arc;
use std::time::Duration;

use actix_web::error::ResponseError;
use actix_web::{
    http::{header as actix_header, Method as ActixMethod, StatusCode},
    web, Error as ActixError, HttpRequest, HttpResponse,
};
use log::{debug, warn};
use reqwest::{
    header::HeaderMap as ReqwestHeaderMap, header::HeaderName, header::HeaderValue, Client,
    Method as ReqwestMethod,
};
use tokio::time::timeout;

use crate::cache::DynCache;
use crate::models::error::GatewayError;
use crate::models::gateway::ResolvedRoute;
use crate::plugins::{JwtVerifier, Plugin};
use crate::services::access_log::{AccessLogger, AccessRecord};
use crate::services::idempotency::{
    fingerprint, GuardDecision, IdempotencyGuard, ReleaseGuard, StoredResponse,
};
use crate::services::load_balancer::LoadBalancer;
use crate::services::route_cache::RouteCache;
use crate::store::ConfigStore;
use crate::utils::net::client_origin;
use crate::utils::path::{build_upstream_url, validate_path};

/// Upstream reply reduced to what translation (and replay) needs.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ProxyResponse {
    fn from_stored(stored: StoredResponse) -> Self {
        Self {
            status: stored.status,
            content_type: stored.content_type.clone(),
            body: stored.body_bytes(),
        }
    }
}

#[derive(Clone)]
pub struct RouteHandler {
    client: Client,
    route_cache: RouteCache,
    balancer: LoadBalancer,
    guard: IdempotencyGuard,
    verifier: JwtVerifier,
    access_log: AccessLogger,
}

impl RouteHandler {
    pub fn new(
        cache: DynCache,
        store: Arc<ConfigStore>,
        verifier: JwtVerifier,
        access_log: AccessLogger,
    ) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            route_cache: RouteCache::new(cache.clone(), store),
            balancer: LoadBalancer::new(cache.clone()),
            guard: IdempotencyGuard::new(cache),
            verifier,
            access_log,
        }
    }

    pub fn route_cache(&self) -> &RouteCache {
        &self.route_cache
    }

    /// Entry point wired under the catch-all route.
    pub async fn handle_request(
        &self,
        req: HttpRequest,
        body: web::Bytes,
    ) -> Result<HttpResponse, ActixError> {
        let outcome = self.process(&req, &body).await;
        let status = match &outcome {
            Ok(response) => response.status,
            Err(err) => err.status_code().as_u16(),
        };
        self.access_log.record(AccessRecord::new(
            self.verifier.peek_user_id(header_str(&req, "Authorization")),
            client_origin(req.peer_addr(), req.headers()),
            req.path(),
            req.method().as_str(),
            status,
        ));
        match outcome {
            Ok(response) => Ok(translate(response)),
            Err(err) => Err(err.into()),
        }
    }

    async fn process(
        &self,
        req: &HttpRequest,
        body: &web::Bytes,
    ) -> Result<ProxyResponse, GatewayError> {
        validate_path(req.path())?;
        let full_path = if req.query_string().is_empty() {
            req.path().to_string()
        } else {
            format!("{}?{}", req.path(), req.query_string())
        };

        let route = self.route_cache.lookup(req.path()).await?;
        let plugin =
            Plugin::from_code(route.api.plugin).ok_or(GatewayError::NotImplemented {
                code: route.api.plugin,
            })?;
        plugin.check(&route.api, req, &self.verifier)?;

        match self.idempotency_key(req, &full_path, body) {
            Some(key) => match self.guard.begin(&key).await? {
                GuardDecision::Replay(stored) => {
                    debug!("idempotency replay for {} {}", req.method(), full_path);
                    Ok(ProxyResponse::from_stored(stored))
                }
                GuardDecision::Claimed => {
                    let backstop = ReleaseGuard::new(self.guard.clone(), key.clone());
                    let result = self.forward(req, body, &route, &full_path).await;
                    backstop.disarm();
                    match result {
                        Ok(response) => {
                            let stored = StoredResponse::new(
                                response.status,
                                response.content_type.clone(),
                                &response.body,
                            );
                            if let Err(err) = self.guard.complete(&key, &stored).await {
                                warn!("failed to persist idempotent response: {err}");
                            }
                            Ok(response)
                        }
                        Err(err) => {
                            self.guard.release(&key).await;
                            Err(err)
                        }
                    }
                }
            },
            None => self.forward(req, body, &route, &full_path).await,
        }
    }

    /// Fingerprint for keyed requests, `None` when the client sent no
    /// `Idempotency-Key`.
    fn idempotency_key(
        &self,
        req: &HttpRequest,
        full_path: &str,
        body: &web::Bytes,
    ) -> Option<String> {
        let client_key = header_str(req, "Idempotency-Key")?;
        let content_type = header_str(req, "Content-Type").unwrap_or("application/json");
        Some(fingerprint(
            header_str(req, "Authorization"),
            full_path,
            req.method().as_str(),
            content_type,
            body.as_ref(),
            client_key,
        ))
    }

    async fn forward(
        &self,
        req: &HttpRequest,
        body: &web::Bytes,
        route: &ResolvedRoute,
        full_path: &str,
    ) -> Result<ProxyResponse, GatewayError> {
        self.balancer.incr_connections(route.upstream.id).await;
        let result = self.try_forward(req, body, route, full_path).await;
        self.balancer.decr_connections(route.upstream.id).await;
        result
    }

    /// Load-balanced send with retries. Every attempt re-runs selection,
    /// so a retry may land on a different node; transport errors and
    /// per-attempt timeouts are swallowed until the budget is spent.
    async fn try_forward(
        &self,
        req: &HttpRequest,
        body: &web::Bytes,
        route: &ResolvedRoute,
        full_path: &str,
    ) -> Result<ProxyResponse, GatewayError> {
        let trailing = route.api.trailing_path(full_path);
        let method = convert_method(req.method());
        let headers = forward_headers(req);
        let attempts = route.upstream.retries + 1;

        for attempt in 1..=attempts {
            let node = self
                .balancer
                .select(&route.upstream, &route.targets)
                .await?;
            let url = build_upstream_url(&node.full_path(), &route.api.wrapped_path, &trailing);
            debug!("forwarding {method} {url} (attempt {attempt}/{attempts})");

            let send = self
                .client
                .request(method.clone(), &url)
                .headers(headers.clone())
                .body(body.to_vec())
                .send();
            match timeout(Duration::from_secs(route.upstream.timeout_sec), send).await {
                Ok(Ok(response)) => {
                    let status = response.status().as_u16();
                    let content_type = response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);
                    match response.bytes().await {
                        Ok(bytes) => {
                            return Ok(ProxyResponse {
                                status,
                                content_type,
                                body: bytes.to_vec(),
                            });
                        }
                        Err(err) => warn!("failed reading upstream body from {url}: {err}"),
                    }
                }
                Ok(Err(err)) => warn!("upstream error from {url}: {err}"),
                Err(_) => warn!(
                    "upstream {url} timed out after {}s",
                    route.upstream.timeout_sec
                ),
            }
        }
        Err(GatewayError::Timeout { attempts })
    }
}

/// Upstream reply to client response: status and body verbatim, 204 with
/// an empty body, `Content-Type` the only header carried over.
pub fn translate(response: ProxyResponse) -> HttpResponse {
    if response.status == StatusCode::NO_CONTENT.as_u16() {
        return HttpResponse::NoContent().finish();
    }
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);
    if let Some(content_type) = &response.content_type {
        builder.insert_header((actix_header::CONTENT_TYPE, content_type.clone()));
    }
    builder.body(response.body)
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Headers carried upstream: forwarding metadata plus the caller's
/// credentials. `Content-Type` rides along only for JSON bodies; the
/// `Idempotency-Key` header is consumed by the guard and never forwarded.
fn forward_headers(req: &HttpRequest) -> ReqwestHeaderMap {
    let mut headers = ReqwestHeaderMap::new();
    for name in ["X-Forwarded-For", "Host", "Authorization"] {
        if let Some(value) = req.headers().get(name) {
            if let (Ok(header_name), Ok(header_value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value.as_bytes()),
            ) {
                headers.insert(header_name, header_value);
            }
        }
    }
    let is_json = header_str(req, "Content-Type")
        .is_some_and(|ct| ct.to_lowercase() == "application/json");
    if is_json {
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
    }
    headers
}

fn convert_method(method: &ActixMethod) -> ReqwestMethod {
    match *method {
        ActixMethod::GET => ReqwestMethod::GET,
        ActixMethod::POST => ReqwestMethod::POST,
        ActixMethod::PUT => ReqwestMethod::PUT,
        ActixMethod::PATCH => ReqwestMethod::PATCH,
        ActixMethod::DELETE => ReqwestMethod::DELETE,
        ActixMethod::HEAD => ReqwestMethod::HEAD,
        ActixMethod::OPTIONS => ReqwestMethod::OPTIONS,
        _ => ReqwestMethod::GET,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_forward_headers_filters() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "10.0.0.9"))
            .insert_header(("Host", "gateway.example.com"))
            .insert_header(("Authorization", "Bearer t"))
            .insert_header(("Content-Type", "application/json"))
            .insert_header(("Idempotency-Key", "k1"))
            .insert_header(("Cookie", "session=1"))
            .to_http_request();

        let headers = forward_headers(&req);
        assert_eq!(headers.get("X-Forwarded-For").unwrap(), "10.0.0.9");
        assert_eq!(headers.get("Host").unwrap(), "gateway.example.com");
        assert_eq!(headers.get("Authorization").unwrap(), "Bearer t");
        assert_eq!(headers.get("Content-Type").unwrap(), "application/json");
        assert!(headers.get("Idempotency-Key").is_none());
        assert!(headers.get("Cookie").is_none());
    }

    #[test]
    fn test_forward_headers_drops_non_json_content_type() {
        let req = TestRequest::default()
            .insert_header(("Content-Type", "multipart/form-data; boundary=x"))
            .to_http_request();
        let headers = forward_headers(&req);
        assert!(headers.get("Content-Type").is_none());
    }

    #[test]
    fn test_translate_no_content() {
        let response = ProxyResponse {
            status: 204,
            content_type: Some("application/json".to_string()),
            body: b"ignored".to_vec(),
        };
        let http = translate(response);
        assert_eq!(http.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn test_translate_copies_status_and_content_type() {
        let response = ProxyResponse {
            status: 201,
            content_type: Some("application/json".to_string()),
            body: br#"{"id":7}"#.to_vec(),
        };
        let http = translate(response);
        assert_eq!(http.status(), StatusCode::CREATED);
        assert_eq!(
            http.headers().get(actix_header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
