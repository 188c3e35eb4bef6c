use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{test, web, App, HttpResponse};
use relay_rs::cache::{DynCache, MemoryCache};
use relay_rs::middleware::ddos::{DdosBlocker, MAX_REQUESTS_PER_SECOND};

async fn ok_handler() -> HttpResponse {
    HttpResponse::Ok().finish()
}

fn addr(origin: &str) -> SocketAddr {
    format!("{origin}:40000").parse().unwrap()
}

macro_rules! blocked_app {
    ($cache:expr, $whitelist:expr) => {
        test::init_service(
            App::new()
                .wrap(DdosBlocker::new($cache, $whitelist))
                .route("/x/y", web::post().to(ok_handler))
                .route("/x/y", web::get().to(ok_handler)),
        )
        .await
    };
}

#[actix_web::test]
async fn test_burst_is_admitted_up_to_the_ceiling_then_blocked() {
    let cache: DynCache = Arc::new(MemoryCache::new());
    let app = blocked_app!(cache, vec![]);

    for i in 1..=MAX_REQUESTS_PER_SECOND {
        let req = test::TestRequest::post()
            .uri("/x/y")
            .peer_addr(addr("1.2.3.4"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200, "request {i} should be admitted");
    }

    // requests 26..30 are refused
    for _ in 0..5 {
        let req = test::TestRequest::post()
            .uri("/x/y")
            .peer_addr(addr("1.2.3.4"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 429);
    }
}

#[actix_web::test]
async fn test_block_outlives_the_counter_window() {
    let cache: DynCache = Arc::new(MemoryCache::new());
    let app = blocked_app!(cache, vec![]);

    for _ in 0..=MAX_REQUESTS_PER_SECOND {
        let req = test::TestRequest::post()
            .uri("/x/y")
            .peer_addr(addr("1.2.3.4"))
            .to_request();
        test::call_service(&app, req).await;
    }

    // the one-second counter window has reset, the twenty-second block
    // has not
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    let req = test::TestRequest::post()
        .uri("/x/y")
        .peer_addr(addr("1.2.3.4"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 429);
}

#[actix_web::test]
async fn test_get_requests_are_exempt() {
    let cache: DynCache = Arc::new(MemoryCache::new());
    let app = blocked_app!(cache, vec![]);

    for _ in 0..(MAX_REQUESTS_PER_SECOND * 2) {
        let req = test::TestRequest::get()
            .uri("/x/y")
            .peer_addr(addr("1.2.3.4"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }
}

#[actix_web::test]
async fn test_whitelisted_origins_are_exempt() {
    let cache: DynCache = Arc::new(MemoryCache::new());
    let app = blocked_app!(cache, vec!["192.168.0.1".to_string()]);

    for _ in 0..(MAX_REQUESTS_PER_SECOND * 2) {
        let req = test::TestRequest::post()
            .uri("/x/y")
            .peer_addr(addr("192.168.0.1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }
}

#[actix_web::test]
async fn test_block_is_per_origin() {
    let cache: DynCache = Arc::new(MemoryCache::new());
    let app = blocked_app!(cache, vec![]);

    for _ in 0..=MAX_REQUESTS_PER_SECOND {
        let req = test::TestRequest::post()
            .uri("/x/y")
            .peer_addr(addr("1.2.3.4"))
            .to_request();
        test::call_service(&app, req).await;
    }

    // a different origin is unaffected
    let req = test::TestRequest::post()
        .uri("/x/y")
        .peer_addr(addr("5.6.7.8"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}
