use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::time::{SystemTime, UNIX_EPOCH};

use relay_rs::models::error::GatewayError;
use relay_rs::models::gateway::{Api, Consumer};
use relay_rs::plugins::{create_test_token, Claims, JwtVerifier, Plugin};

fn api_with_consumer(plugin: Plugin) -> Api {
    Api {
        id: 1,
        name: "orders".to_string(),
        request_path: "/orders".to_string(),
        wrapped_path: "/v1/orders".to_string(),
        upstream_id: 1,
        plugin: plugin.code(),
        consumers: vec![Consumer {
            id: 1,
            user_id: 68,
            identifier: "alice".to_string(),
            apikey: "abc".to_string(),
        }],
    }
}

fn verifier() -> JwtVerifier {
    JwtVerifier::new("test-secret")
}

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize
}

fn staff_claims(exp: usize) -> Claims {
    Claims {
        exp,
        iat: Some(now()),
        jti: None,
        user_id: Some(68),
        username: Some("admin".to_string()),
        nickname: None,
        token_type: Some("access".to_string()),
        role: Some(vec!["staff".to_string()]),
    }
}

async fn error_body(err: &GatewayError) -> serde_json::Value {
    let resp = err.error_response();
    let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[actix_web::test]
async fn test_no_auth_always_allows() {
    let api = api_with_consumer(Plugin::NoAuth);
    let req = TestRequest::default().to_http_request();
    assert!(Plugin::NoAuth.check(&api, &req, &verifier()).is_ok());
}

#[actix_web::test]
async fn test_key_auth_wrong_key_is_401_with_message() {
    let api = api_with_consumer(Plugin::KeyAuth);
    let req = TestRequest::default()
        .insert_header(("apikey", "wrong"))
        .to_http_request();

    let err = Plugin::KeyAuth.check(&api, &req, &verifier()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        error_body(&err).await,
        serde_json::json!({"error": ["apikey need"]})
    );
}

#[actix_web::test]
async fn test_key_auth_matching_key_allows() {
    let api = api_with_consumer(Plugin::KeyAuth);
    let req = TestRequest::default()
        .insert_header(("apikey", "abc"))
        .to_http_request();
    assert!(Plugin::KeyAuth.check(&api, &req, &verifier()).is_ok());
}

#[actix_web::test]
async fn test_key_auth_missing_header_is_401() {
    let api = api_with_consumer(Plugin::KeyAuth);
    let req = TestRequest::default().to_http_request();
    let err = Plugin::KeyAuth.check(&api, &req, &verifier()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_basic_auth_unparseable_header_is_401() {
    let api = api_with_consumer(Plugin::BasicAuth);
    for header in ["Basic zzz-not-base64", "Bearer abc", "Basic "] {
        let req = TestRequest::default()
            .insert_header(("Authorization", header))
            .to_http_request();
        let err = Plugin::BasicAuth.check(&api, &req, &verifier()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            error_body(&err).await,
            serde_json::json!({"error": ["Authentication credentials were not provided"]})
        );
    }
}

#[actix_web::test]
async fn test_basic_auth_unknown_user_is_403() {
    let api = api_with_consumer(Plugin::BasicAuth);
    let header = format!("Basic {}", BASE64.encode("mallory:pw"));
    let req = TestRequest::default()
        .insert_header(("Authorization", header))
        .to_http_request();

    let err = Plugin::BasicAuth.check(&api, &req, &verifier()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(
        error_body(&err).await,
        serde_json::json!({"error": ["permission not allowed"]})
    );
}

#[actix_web::test]
async fn test_basic_auth_route_consumer_allows() {
    let api = api_with_consumer(Plugin::BasicAuth);
    let header = format!("Basic {}", BASE64.encode("alice:pw"));
    let req = TestRequest::default()
        .insert_header(("Authorization", header))
        .to_http_request();
    assert!(Plugin::BasicAuth.check(&api, &req, &verifier()).is_ok());
}

#[actix_web::test]
async fn test_admin_only_staff_token_allows() {
    let api = api_with_consumer(Plugin::AdminOnly);
    let token = create_test_token(&staff_claims(now() + 3600), "test-secret").unwrap();
    let req = TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_http_request();
    assert!(Plugin::AdminOnly.check(&api, &req, &verifier()).is_ok());
}

#[actix_web::test]
async fn test_admin_only_non_staff_is_403() {
    let api = api_with_consumer(Plugin::AdminOnly);
    let mut claims = staff_claims(now() + 3600);
    claims.role = Some(vec!["creator".to_string()]);
    let token = create_test_token(&claims, "test-secret").unwrap();
    let req = TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_http_request();

    let err = Plugin::AdminOnly.check(&api, &req, &verifier()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_admin_only_expired_token_is_422() {
    let api = api_with_consumer(Plugin::AdminOnly);
    let token = create_test_token(&staff_claims(now() - 3600), "test-secret").unwrap();
    let req = TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_http_request();

    let err = Plugin::AdminOnly.check(&api, &req, &verifier()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn test_admin_only_garbage_or_missing_token_is_401() {
    let api = api_with_consumer(Plugin::AdminOnly);

    let garbage = TestRequest::default()
        .insert_header(("Authorization", "Bearer dawdawdw"))
        .to_http_request();
    let err = Plugin::AdminOnly
        .check(&api, &garbage, &verifier())
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

    let missing = TestRequest::default().to_http_request();
    let err = Plugin::AdminOnly
        .check(&api, &missing, &verifier())
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_admin_only_wrong_signature_is_401() {
    let api = api_with_consumer(Plugin::AdminOnly);
    let token = create_test_token(&staff_claims(now() + 3600), "forged-secret").unwrap();
    let req = TestRequest::default()
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_http_request();

    let err = Plugin::AdminOnly.check(&api, &req, &verifier()).unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
}
