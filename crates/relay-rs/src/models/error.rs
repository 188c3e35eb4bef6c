use actix_web::{http::StatusCode, HttpResponse};
use serde_json::json;

/// Gateway error taxonomy.
///
/// Every failure the dataplane can surface to a client maps onto one of
/// these variants. The [`actix_web::error::ResponseError`] implementation
/// turns them into structured JSON responses, so handlers can simply
/// propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no route matched path: {path}")]
    RouteNotFound { path: String },
    #[error("{message}")]
    Unauthorized { message: String },
    #[error("{message}")]
    Forbidden { message: String },
    #[error("token expired")]
    TokenExpired,
    #[error("duplicate request already in progress")]
    Conflict,
    #[error("upstream unreachable after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("too many requests")]
    RateLimited,
    #[error("plugin {code} not implemented")]
    NotImplemented { code: u8 },
    #[error("{0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        GatewayError::Unauthorized {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        GatewayError::Forbidden {
            message: message.into(),
        }
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden { .. } => StatusCode::FORBIDDEN,
            GatewayError::TokenExpired => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Conflict => StatusCode::CONFLICT,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            GatewayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            GatewayError::RouteNotFound { .. } => {
                json!({"error": {"not_found": ["no api found"]}})
            }
            GatewayError::Unauthorized { message } | GatewayError::Forbidden { message } => {
                json!({"error": [message]})
            }
            GatewayError::TokenExpired => json!({"error": {"token": ["token expired"]}}),
            GatewayError::Conflict => {
                json!({"error": {"duplicated": ["already in progress"]}})
            }
            GatewayError::Timeout { .. } => {
                json!({"error": {"timeout": ["upstream unreachable, try again"]}})
            }
            GatewayError::RateLimited => {
                json!({"error": {"throttled": ["too many requests"]}})
            }
            GatewayError::NotImplemented { code } => {
                json!({"error": {"not_implemented": [format!("plugin {code} not implemented")]}})
            }
            GatewayError::Unavailable(reason) => {
                json!({"error": {"unavailable": [reason]}})
            }
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<crate::cache::CacheError> for GatewayError {
    fn from(err: crate::cache::CacheError) -> Self {
        GatewayError::Unavailable(err.to_string())
    }
}
