use actix_web::{web, HttpRequest};

use crate::services::http::RouteHandler;

/// Wire the catch-all proxy route. Requests are buffered (10 MB cap)
/// before the handler runs, so the body can be fingerprinted and re-sent
/// on retries.
pub fn configure_route(cfg: &mut web::ServiceConfig, handler: RouteHandler) {
    cfg.app_data(web::PayloadConfig::new(1024 * 1024 * 10))
        .service(
            web::resource("/{tail:.*}").to(move |req: HttpRequest, body: web::Bytes| {
                let handler = handler.clone();
                async move { handler.handle_request(req, body).await }
            }),
        );
}
