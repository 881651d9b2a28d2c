//! End-to-end request routing through the proxy listener.

use std::sync::Arc;
use std::time::Duration;
use axum::http::StatusCode;
use lb_router::config::HealthCheckConfig;
use lb_router::health::HealthScheduler;
use lb_router::lifecycle::Shutdown;
use lb_router::{Registry, RouterConfig};

mod common;
use common::{
    ScriptedProbe, base_url, client, closed_port, eventually, start_mock_backend,
    start_programmable_backend, start_proxy, start_proxy_with,
};

/// Mark every registered backend healthy through a scripted pass.
async fn mark_all_healthy(registry: &Arc<Registry>) {
    HealthScheduler::with_prober(registry.clone(), &HealthCheckConfig::default(), ScriptedProbe::always(true))
        .check_all()
        .await;
}

#[tokio::test]
async fn test_empty_registry_returns_503() {
    let shutdown = Shutdown::new();
    let registry = Arc::new(Registry::new());
    let proxy = start_proxy(registry, &shutdown).await;

    let res = client().get(base_url(proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "no backends registered");

    shutdown.trigger();
}

#[tokio::test]
async fn test_all_unhealthy_returns_503() {
    let shutdown = Shutdown::new();
    let registry = Arc::new(Registry::new());
    let backend = start_mock_backend(200, "ok").await;
    registry.add_backend(&base_url(backend)).unwrap();
    let proxy = start_proxy(registry.clone(), &shutdown).await;

    let res = client().get(base_url(proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "no healthy backends available");
    assert_eq!(registry.snapshot()[0].active_connections, 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_forwards_path_query_and_headers() {
    let shutdown = Shutdown::new();
    let registry = Arc::new(Registry::new());
    let backend = start_programmable_backend(|head| async move { (200, head) }).await;
    registry.add_backend(&format!("http://{}/api", backend)).unwrap();
    mark_all_healthy(&registry).await;
    let proxy = start_proxy(registry.clone(), &shutdown).await;

    let res = client()
        .get(format!("{}/users?page=2", base_url(proxy)))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "req-42");

    let head = res.text().await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("get /api/users?page=2 http/1.1\r\n"), "got {head}");
    assert!(head.contains(&format!("host: {}\r\n", backend)));
    assert!(head.contains("x-request-id: req-42\r\n"));
    assert!(head.contains("x-forwarded-for: 127.0.0.1\r\n"));

    let r = registry.clone();
    assert!(eventually(Duration::from_secs(1), || r.snapshot()[0].active_connections == 0).await);

    shutdown.trigger();
}

#[tokio::test]
async fn test_generates_request_id() {
    let shutdown = Shutdown::new();
    let registry = Arc::new(Registry::new());
    let backend = start_programmable_backend(|head| async move { (200, head) }).await;
    registry.add_backend(&base_url(backend)).unwrap();
    mark_all_healthy(&registry).await;
    let proxy = start_proxy(registry, &shutdown).await;

    let res = client().get(base_url(proxy)).send().await.unwrap();
    let id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    let head = res.text().await.unwrap().to_ascii_lowercase();
    assert!(head.contains(&format!("x-request-id: {}\r\n", id.to_ascii_lowercase())));

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_failure_returns_502_and_releases() {
    let shutdown = Shutdown::new();
    let registry = Arc::new(Registry::new());
    let dead = closed_port().await;
    registry.add_backend(&base_url(dead)).unwrap();
    mark_all_healthy(&registry).await;
    let proxy = start_proxy(registry.clone(), &shutdown).await;

    let res = client().get(base_url(proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(registry.snapshot()[0].active_connections, 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_in_flight_request_steers_next_one() {
    let shutdown = Shutdown::new();
    let registry = Arc::new(Registry::new());
    let slow = start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, "slow".to_string())
    })
    .await;
    let fast = start_mock_backend(200, "fast").await;
    registry.add_backend(&base_url(slow)).unwrap();
    registry.add_backend(&base_url(fast)).unwrap();
    mark_all_healthy(&registry).await;
    let proxy = start_proxy(registry.clone(), &shutdown).await;

    // Tie at zero: the first request goes to the first backend.
    let url = base_url(proxy);
    let first = tokio::spawn({
        let url = url.clone();
        async move { client().get(url).send().await.unwrap().text().await.unwrap() }
    });

    let r = registry.clone();
    assert!(eventually(Duration::from_secs(1), || r.snapshot()[0].active_connections == 1).await);

    let second = client().get(&url).send().await.unwrap().text().await.unwrap();
    assert_eq!(second, "fast");
    assert_eq!(first.await.unwrap(), "slow");

    let r = registry.clone();
    assert!(
        eventually(Duration::from_secs(1), || {
            r.snapshot().iter().all(|v| v.active_connections == 0)
        })
        .await
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_removed_backend_not_selected_while_request_in_flight() {
    let shutdown = Shutdown::new();
    let registry = Arc::new(Registry::new());
    let slow = start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(400)).await;
        (200, "a".to_string())
    })
    .await;
    let other = start_mock_backend(200, "b").await;
    let a = registry.add_backend(&base_url(slow)).unwrap();
    registry.add_backend(&base_url(other)).unwrap();
    mark_all_healthy(&registry).await;
    let proxy = start_proxy(registry.clone(), &shutdown).await;

    let url = base_url(proxy);
    let in_flight = tokio::spawn({
        let url = url.clone();
        async move { client().get(url).send().await.unwrap().text().await.unwrap() }
    });
    assert!(eventually(Duration::from_secs(1), || a.active_connections() == 1).await);

    registry.remove_backend(a.address()).unwrap();
    for _ in 0..5 {
        let body = client().get(&url).send().await.unwrap().text().await.unwrap();
        assert_eq!(body, "b");
    }

    assert_eq!(in_flight.await.unwrap(), "a");
    assert!(eventually(Duration::from_secs(1), || a.active_connections() == 0).await);

    shutdown.trigger();
}

#[tokio::test]
async fn test_slow_upstream_returns_504_and_releases() {
    let shutdown = Shutdown::new();
    let registry = Arc::new(Registry::new());
    let stuck = start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        (200, "late".to_string())
    })
    .await;
    registry.add_backend(&base_url(stuck)).unwrap();
    mark_all_healthy(&registry).await;

    let mut config = RouterConfig::default();
    config.timeouts.request_secs = 1;
    let proxy = start_proxy_with(&config, registry.clone(), &shutdown).await;

    let res = client().get(base_url(proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);

    let r = registry.clone();
    assert!(eventually(Duration::from_secs(1), || r.snapshot()[0].active_connections == 0).await);

    shutdown.trigger();
}
