use std::sync::Arc;

use relay_rs::cache::{Cache, DynCache, MemoryCache};
use relay_rs::models::error::GatewayError;
use relay_rs::models::gateway::{LoadBalancing, Scheme};
use relay_rs::services::route_cache::RouteCache;
use relay_rs::store::{ApiSpec, ConfigStore, StoreSnapshot};

fn upstream_spec(id: i64, alias: &str, host: &str) -> relay_rs::models::gateway::Upstream {
    relay_rs::models::gateway::Upstream {
        id,
        alias: alias.to_string(),
        scheme: Scheme::Http,
        host: host.to_string(),
        weight: 100,
        load_balance: LoadBalancing::RoundRobin,
        retries: 0,
        timeout_sec: 10,
    }
}

fn api_spec(id: i64, request_path: &str, upstream_id: i64) -> ApiSpec {
    ApiSpec {
        id,
        name: format!("route-{id}"),
        request_path: request_path.to_string(),
        wrapped_path: "/internal".to_string(),
        upstream_id,
        plugin: 0,
        consumer_ids: vec![],
    }
}

fn build_store(apis: Vec<ApiSpec>, upstream_ids: &[(i64, &str)]) -> Arc<ConfigStore> {
    let snapshot = StoreSnapshot {
        version: 1,
        upstreams: upstream_ids
            .iter()
            .map(|(id, host)| upstream_spec(*id, &format!("up-{id}"), host))
            .collect(),
        targets: vec![],
        apis,
        consumers: vec![],
    };
    Arc::new(ConfigStore::from_snapshot(snapshot).expect("valid snapshot"))
}

fn route_cache(store: Arc<ConfigStore>) -> (RouteCache, DynCache) {
    let cache: DynCache = Arc::new(MemoryCache::new());
    (RouteCache::new(cache.clone(), store), cache)
}

#[tokio::test]
async fn test_lookup_miss_populates_cache() {
    let store = build_store(vec![api_spec(1, "/users", 1)], &[(1, "users.internal")]);
    let (routes, cache) = route_cache(store);

    let route = routes.lookup("/users/1").await.unwrap();
    assert_eq!(route.api.id, 1);
    assert_eq!(route.upstream.host, "users.internal");

    let keys = cache.keys("0/api:*:end").await.unwrap();
    assert_eq!(keys, vec!["0/api:path=/users:upstream=1:end".to_string()]);

    // second lookup is served from the cache
    let again = routes.lookup("/users/2").await.unwrap();
    assert_eq!(again.api.id, 1);
    assert_eq!(routes.hits().await, 1);
}

#[tokio::test]
async fn test_longest_prefix_wins() {
    let store = build_store(
        vec![api_spec(1, "/x", 1), api_spec(2, "/x/y", 2)],
        &[(1, "one"), (2, "two")],
    );
    let (routes, _cache) = route_cache(store.clone());

    // warm both entries, then resolve through the cache scan path
    routes.warm_up().await.unwrap();
    assert_eq!(routes.lookup("/x/z").await.unwrap().api.id, 1);
    assert_eq!(routes.lookup("/x/y/z").await.unwrap().api.id, 2);
}

#[tokio::test]
async fn test_prefix_change_moves_the_match() {
    // /x alone serves everything under /x
    let short = build_store(vec![api_spec(1, "/x", 1)], &[(1, "one")]);
    let (routes, _) = route_cache(short);
    assert_eq!(routes.lookup("/x/y/z").await.unwrap().api.id, 1);

    // a longer prefix takes the traffic over
    let long = build_store(
        vec![api_spec(1, "/x", 1), api_spec(2, "/x/y", 1)],
        &[(1, "one")],
    );
    let (routes, _) = route_cache(long);
    assert_eq!(routes.lookup("/x/y/z").await.unwrap().api.id, 2);

    // removing it restores the previous winner
    let restored = build_store(vec![api_spec(1, "/x", 1)], &[(1, "one")]);
    let (routes, _) = route_cache(restored);
    assert_eq!(routes.lookup("/x/y/z").await.unwrap().api.id, 1);
}

#[tokio::test]
async fn test_cached_tie_breaks_on_lowest_upstream_id() {
    let store = build_store(
        vec![api_spec(7, "/x", 2), api_spec(8, "/x", 1)],
        &[(1, "one"), (2, "two")],
    );
    let (routes, cache) = route_cache(store.clone());

    // seed both cache entries directly: same path, different upstreams
    for api in store.apis() {
        let resolved = store.resolve(api).unwrap();
        let key = RouteCache::entry_key(&api.request_path, api.upstream_id);
        cache
            .set(&key, &serde_json::to_string(&resolved).unwrap(), None)
            .await
            .unwrap();
    }

    let route = routes.lookup("/x/z").await.unwrap();
    assert_eq!(route.upstream.id, 1);
}

#[tokio::test]
async fn test_invalidate_purges_only_matching_upstream() {
    let store = build_store(
        vec![
            api_spec(1, "/a", 1),
            api_spec(2, "/b", 1),
            api_spec(3, "/c", 2),
        ],
        &[(1, "one"), (2, "two")],
    );
    let (routes, cache) = route_cache(store);
    routes.warm_up().await.unwrap();
    assert_eq!(cache.keys("0/api:*:end").await.unwrap().len(), 3);

    let purged = routes.invalidate(1).await.unwrap();
    assert_eq!(purged, 2);

    let remaining = cache.keys("0/api:*:end").await.unwrap();
    assert_eq!(remaining, vec!["0/api:path=/c:upstream=2:end".to_string()]);
}

#[tokio::test]
async fn test_warm_up_sentinel_blocks_repeat_runs() {
    let store = build_store(
        vec![api_spec(1, "/a", 1), api_spec(2, "/b", 1)],
        &[(1, "one")],
    );
    let (routes, cache) = route_cache(store);

    assert_eq!(routes.warm_up().await.unwrap(), 2);
    // a second warm-up inside the sentinel window is a no-op
    assert_eq!(routes.warm_up().await.unwrap(), 0);

    // sentinel expiry (or deletion) re-enables the warm-up
    cache.delete("warm_up").await.unwrap();
    assert_eq!(routes.warm_up().await.unwrap(), 2);
}

#[tokio::test]
async fn test_no_route_is_not_found() {
    let store = build_store(vec![api_spec(1, "/users", 1)], &[(1, "one")]);
    let (routes, _) = route_cache(store);

    match routes.lookup("/orders/5").await {
        Err(GatewayError::RouteNotFound { path }) => assert_eq!(path, "/orders/5"),
        other => panic!("expected RouteNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_purging_never_breaks_lookup() {
    let store = build_store(vec![api_spec(1, "/users", 1)], &[(1, "one")]);
    let (routes, cache) = route_cache(store);

    routes.warm_up().await.unwrap();
    routes.invalidate(1).await.unwrap();
    assert!(cache.keys("0/api:*:end").await.unwrap().is_empty());

    // the store still answers; the cache refills
    let route = routes.lookup("/users/1").await.unwrap();
    assert_eq!(route.api.id, 1);
    assert_eq!(cache.keys("0/api:*:end").await.unwrap().len(), 1);
}
