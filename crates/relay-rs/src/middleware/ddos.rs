//! Request-rate firewall.
//!
//! Counts non-GET requests per origin in a sliding one-second window
//! through the shared cache; an origin exceeding the ceiling is blocked
//! for twenty seconds. Because both the counter and the block marker live
//! in the cache, the limit holds across every gateway instance. The
//! middleware fails open: an unreachable cache never takes the gateway
//! down with it.

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ResponseError,
    http::Method,
    Error,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::warn;

use crate::cache::{Cache, DynCache};
use crate::models::error::GatewayError;
use crate::utils::net::client_origin;

/// Requests an origin may send per window before it gets blocked.
pub const MAX_REQUESTS_PER_SECOND: i64 = 25;
/// How long an abusive origin stays blocked.
pub const BLOCK_DURATION: Duration = Duration::from_secs(20);
/// Width of the counting window.
pub const COUNTER_WINDOW: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct DdosBlocker {
    cache: DynCache,
    whitelist: Arc<HashSet<String>>,
}

impl DdosBlocker {
    pub fn new(cache: DynCache, whitelist: Vec<String>) -> Self {
        Self {
            cache,
            whitelist: Arc::new(whitelist.into_iter().collect()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for DdosBlocker
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = DdosBlockerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(DdosBlockerMiddleware {
            service: Rc::new(service),
            cache: self.cache.clone(),
            whitelist: self.whitelist.clone(),
        })
    }
}

pub struct DdosBlockerMiddleware<S> {
    service: Rc<S>,
    cache: DynCache,
    whitelist: Arc<HashSet<String>>,
}

impl<S, B> Service<ServiceRequest> for DdosBlockerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let cache = self.cache.clone();
        let whitelist = self.whitelist.clone();

        Box::pin(async move {
            if req.method() == Method::GET {
                let res = service.call(req).await?;
                return Ok(res.map_into_boxed_body());
            }
            let origin = client_origin(req.peer_addr(), req.headers());
            let origin = match origin {
                Some(origin) if !whitelist.contains(&origin) => origin,
                // exempt, or no resolvable origin to count against
                _ => {
                    let res = service.call(req).await?;
                    return Ok(res.map_into_boxed_body());
                }
            };

            if is_blocked(&cache, &origin).await {
                return Ok(req.into_response(GatewayError::RateLimited.error_response()));
            }
            let res = service.call(req).await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

/// Count this request against `origin` and report whether it should be
/// refused, either because the origin is already blocked or because this
/// request pushed it over the ceiling.
async fn is_blocked(cache: &DynCache, origin: &str) -> bool {
    let block_key = format!("BLOCK:ORIGIN:{origin}");
    match cache.get(&block_key).await {
        Ok(Some(_)) => return true,
        Ok(None) => {}
        Err(err) => {
            warn!("ddos blocker cache unavailable, admitting {origin}: {err}");
            return false;
        }
    }

    let counted = async {
        let request_key = format!("REQ:ORIGIN:{origin}");
        cache
            .add(&request_key, "0", Some(COUNTER_WINDOW))
            .await?;
        cache.incr(&request_key, 1).await
    };
    match counted.await {
        Ok(count) if count > MAX_REQUESTS_PER_SECOND => {
            if let Err(err) = cache.add(&block_key, "1", Some(BLOCK_DURATION)).await {
                warn!("failed to record block for {origin}: {err}");
            }
            true
        }
        Ok(_) => false,
        Err(err) => {
            warn!("ddos counter unavailable, admitting {origin}: {err}");
            false
        }
    }
}
