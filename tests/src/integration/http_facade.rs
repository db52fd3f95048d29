//! # HTTP Facade
//!
//! The wired node served through its router: each `GET /` is one exchange
//! with the responder.

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use relay_node::{router, NodeConfig, NodeRuntime};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.rpc.reply_timeout_ms = 300;
        config.rpc.processing_delay_ms = 20;
        config
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_sequential_requests_numbered_from_one() {
        let mut runtime = NodeRuntime::new(config()).unwrap();
        runtime.start().await.unwrap();
        let app = router(runtime.facade_state());

        for n in 1..=3 {
            let (status, body) = get(&app, "/").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(
                body,
                json!({
                    "message": "Hello, World!",
                    "response": {"request_number": n},
                })
            );
        }

        let (_, stats) = get(&app, "/stats").await;
        assert_eq!(stats["correlator"]["completed"], 3);
        assert_eq!(stats["responder"]["received"], 3);

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_requests_get_their_own_replies() {
        let mut runtime = NodeRuntime::new(config()).unwrap();
        runtime.start().await.unwrap();
        let app = router(runtime.facade_state());

        let calls = (0..10).map(|_| get(&app, "/"));
        let results = futures::future::join_all(calls).await;

        let mut numbers: Vec<u64> = results
            .iter()
            .map(|(status, body)| {
                assert_eq!(*status, StatusCode::OK);
                body["response"]["request_number"].as_u64().unwrap()
            })
            .collect();
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());

        runtime.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_health_follows_worker_lifecycle() {
        let mut runtime = NodeRuntime::new(config()).unwrap();
        let app = router(runtime.facade_state());

        let (_, body) = get(&app, "/health").await;
        assert_eq!(body, json!({"status": "degraded", "worker": "idle"}));

        runtime.start().await.unwrap();
        let (_, body) = get(&app, "/health").await;
        assert_eq!(body, json!({"status": "ok", "worker": "listening"}));

        runtime.shutdown().await.unwrap();
        let (_, body) = get(&app, "/health").await;
        assert_eq!(body, json!({"status": "degraded", "worker": "terminated"}));
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_time_out() {
        let mut runtime = NodeRuntime::new(config()).unwrap();
        runtime.start().await.unwrap();
        let app = router(runtime.facade_state());
        runtime.shutdown().await.unwrap();

        let (status, body) = get(&app, "/").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"], "No reply on 'myreplychannel1' within 300ms");

        let (_, stats) = get(&app, "/stats").await;
        assert_eq!(stats["correlator"]["unheard"], 1);
        assert_eq!(stats["transport"]["active_subscriptions"], 0);
    }
}
