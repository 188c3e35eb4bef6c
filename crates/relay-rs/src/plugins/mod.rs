//! Per-route authentication plugins.
//!
//! Each route carries an integer plugin code; the code selects exactly one
//! check that runs after route lookup and before the idempotency guard.
//! Plugin failures surface immediately with their own status and are never
//! retried.

use actix_web::HttpRequest;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::error::GatewayError;
use crate::models::gateway::Api;

const MSG_NOT_ALLOWED: &str = "permission not allowed";
const MSG_NO_CREDENTIALS: &str = "Authentication credentials were not provided";
const MSG_APIKEY_NEED: &str = "apikey need";

/// Claims carried by gateway-issued access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub exp: usize,
    #[serde(default)]
    pub iat: Option<usize>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub role: Option<Vec<String>>,
}

impl Claims {
    pub fn is_staff(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|roles| roles.iter().any(|r| r == "staff"))
    }
}

/// Verifies Bearer tokens against the auth server's shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Decode and verify a token. Expiry maps to its own error so the
    /// plugin can answer 422 instead of a generic 401.
    pub fn decode(&self, token: &str) -> Result<Claims, GatewayError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => GatewayError::TokenExpired,
                _ => GatewayError::unauthorized(MSG_NOT_ALLOWED),
            })
    }

    /// Best-effort user id from an `Authorization` header, for access
    /// logging. Never fails.
    pub fn peek_user_id(&self, authorization: Option<&str>) -> Option<i64> {
        let token = bearer_token(authorization?)?;
        self.decode(token).ok().and_then(|claims| claims.user_id)
    }
}

/// Strip the `Bearer ` prefix off an Authorization header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some("Bearer"), Some(token)) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// Username from an HTTP Basic Authorization header value.
fn basic_username(header: &str) -> Option<String> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, _password) = credentials.split_once(':')?;
    if username.is_empty() {
        return None;
    }
    Some(username.to_string())
}

fn header_str<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// The authentication plugin selected by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plugin {
    NoAuth,
    BasicAuth,
    KeyAuth,
    AdminOnly,
}

impl Plugin {
    /// Map a route's integer plugin code. Unknown codes are a
    /// configuration error the caller turns into `NotImplemented`.
    pub fn from_code(code: u8) -> Option<Plugin> {
        match code {
            0 => Some(Plugin::NoAuth),
            1 => Some(Plugin::BasicAuth),
            2 => Some(Plugin::KeyAuth),
            3 => Some(Plugin::AdminOnly),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Plugin::NoAuth => 0,
            Plugin::BasicAuth => 1,
            Plugin::KeyAuth => 2,
            Plugin::AdminOnly => 3,
        }
    }

    /// Run the check for `api` against the inbound request.
    pub fn check(
        &self,
        api: &Api,
        req: &HttpRequest,
        verifier: &JwtVerifier,
    ) -> Result<(), GatewayError> {
        match self {
            Plugin::NoAuth => Ok(()),
            Plugin::BasicAuth => Self::check_basic(api, req),
            Plugin::KeyAuth => Self::check_key(api, req),
            Plugin::AdminOnly => Self::check_admin(req, verifier),
        }
    }

    fn check_basic(api: &Api, req: &HttpRequest) -> Result<(), GatewayError> {
        let username = header_str(req, "Authorization")
            .and_then(basic_username)
            .ok_or_else(|| GatewayError::unauthorized(MSG_NO_CREDENTIALS))?;
        if api.consumers.iter().any(|c| c.identifier == username) {
            Ok(())
        } else {
            Err(GatewayError::forbidden(MSG_NOT_ALLOWED))
        }
    }

    fn check_key(api: &Api, req: &HttpRequest) -> Result<(), GatewayError> {
        let apikey = header_str(req, "apikey").unwrap_or_default();
        if !apikey.is_empty() && api.consumers.iter().any(|c| c.apikey == apikey) {
            Ok(())
        } else {
            Err(GatewayError::unauthorized(MSG_APIKEY_NEED))
        }
    }

    fn check_admin(req: &HttpRequest, verifier: &JwtVerifier) -> Result<(), GatewayError> {
        let token = header_str(req, "Authorization")
            .and_then(bearer_token)
            .ok_or_else(|| GatewayError::unauthorized(MSG_NOT_ALLOWED))?;
        let claims = verifier.decode(token)?;
        if claims.is_staff() {
            Ok(())
        } else {
            Err(GatewayError::forbidden(MSG_NOT_ALLOWED))
        }
    }
}

/// Helper to mint tokens in tests and fixtures.
pub fn create_test_token(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}
