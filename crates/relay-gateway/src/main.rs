//! Relay API Gateway Server
//!
//! Server entry point: loads settings and the config-store snapshot,
//! connects the shared cache, warms the route cache, and starts the HTTP
//! server with the firewall and proxy pipeline wired in.

use std::sync::Arc;

use actix_web::{middleware::Logger, App, HttpServer};
use log::{error, info, warn};
use tokio::signal;

use relay_rs::cache;
use relay_rs::config::settings::{load_settings, load_snapshot};
use relay_rs::logs::logger::configure_logger;
use relay_rs::middleware::ddos::DdosBlocker;
use relay_rs::middleware::security::security_headers;
use relay_rs::plugins::JwtVerifier;
use relay_rs::routes::{health, http};
use relay_rs::services::access_log::AccessLogger;
use relay_rs::services::http::RouteHandler;
use relay_rs::store::ConfigStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let settings = load_settings().expect("Failed to load settings");
    if let Err(err) = settings.validate() {
        error!("Settings validation failed: {err}");
        std::process::exit(1);
    }

    info!(
        "Starting relay-rs API Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    let snapshot = load_snapshot(&settings.config_path).unwrap_or_else(|err| {
        error!("Failed to load store snapshot: {err}");
        std::process::exit(1);
    });
    let store = Arc::new(ConfigStore::from_snapshot(snapshot).unwrap_or_else(|err| {
        error!("Invalid store snapshot: {err}");
        std::process::exit(1);
    }));
    info!("Config store loaded with {} routes", store.apis().len());

    let cache = cache::from_url(settings.cache_url.as_deref())
        .await
        .unwrap_or_else(|err| {
            error!("Failed to connect cache: {err}");
            std::process::exit(1);
        });
    match &settings.cache_url {
        Some(url) => info!("Using shared cache at {url}"),
        None => info!("Using in-process cache (single-instance mode)"),
    }

    let verifier = JwtVerifier::new(&settings.jwt_secret);
    let access_log = AccessLogger::spawn();
    let handler = RouteHandler::new(cache.clone(), store, verifier, access_log);

    // Warm the route cache off the startup path; requests served before
    // it finishes just take the store-lookup miss.
    let warm_cache = handler.route_cache().clone();
    tokio::spawn(async move {
        if let Err(err) = warm_cache.warm_up().await {
            warn!("Route cache warm-up failed: {err}");
        }
    });

    let ddos = DdosBlocker::new(cache, settings.ddos_whitelist.clone());

    info!("Starting server on {}:{}", settings.host, settings.port);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T"#,
            ))
            .wrap(security_headers())
            .wrap(ddos.clone())
            .configure(health::configure_health)
            .configure(|cfg| http::configure_route(cfg, handler.clone()))
    })
    .bind((settings.host.as_str(), settings.port))?
    .run();

    info!("Server started successfully");

    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("Server stopped gracefully"),
                Err(err) => error!("Server error: {err}"),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server...");
        }
    }

    Ok(())
}
