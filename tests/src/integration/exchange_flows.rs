//! # Request/Reply Flows
//!
//! A requester and the responder worker talking over one in-memory bus.
//!
//! ## Flow Tested
//!
//! 1. Requester subscribes to `myreplychannel<n>`
//! 2. Requester publishes `{"response": ..., "response_channel": ...}` on `mychannel`
//! 3. Responder waits its processing delay, then publishes `response` back
//! 4. Requester returns the reply and releases its subscription

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use relay_bus::{InMemoryPubSub, MessageBody, PubSubTransport};
    use relay_rpc::{
        new_reply_channel, ReplyChannelNamer, ReplyCorrelator, RequestEnvelope, ResponderConfig,
        ResponderWorker, WorkerState,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::watch;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    struct Harness {
        bus: Arc<InMemoryPubSub>,
        correlator: ReplyCorrelator,
        namer: ReplyChannelNamer,
        shutdown: watch::Sender<bool>,
        worker: tokio::task::JoinHandle<Result<relay_rpc::ResponderSnapshot, relay_rpc::RpcError>>,
    }

    async fn harness(processing_delay: Duration) -> Harness {
        let bus = Arc::new(InMemoryPubSub::new());
        let transport: Arc<dyn PubSubTransport> = bus.clone();

        let worker = ResponderWorker::new(
            Arc::clone(&transport),
            ResponderConfig {
                processing_delay,
                ..ResponderConfig::default()
            },
        );
        let mut state = worker.state();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(worker.run(shutdown_rx));
        state
            .wait_for(|s| *s == WorkerState::Listening)
            .await
            .unwrap();

        Harness {
            bus,
            correlator: ReplyCorrelator::new(transport, Duration::from_secs(5)),
            namer: ReplyChannelNamer::new("myreplychannel"),
            shutdown,
            worker,
        }
    }

    // =========================================================================
    // SINGLE EXCHANGE
    // =========================================================================

    #[tokio::test]
    async fn test_first_request_round_trip() {
        let h = harness(Duration::from_millis(50)).await;

        let ticket = h.namer.next_ticket();
        assert_eq!(ticket.request_number, 1);
        assert_eq!(ticket.channel.as_str(), "myreplychannel1");

        let request = RequestEnvelope::new(
            json!({"request_number": ticket.request_number}),
            ticket.channel.clone(),
        );
        let reply = h
            .correlator
            .request_reply(request.to_body(), "mychannel", &ticket.channel, None)
            .await
            .unwrap();

        assert_eq!(reply, MessageBody::Structured(json!({"request_number": 1})));
        assert_eq!(h.bus.subscriber_count("myreplychannel1"), 0);
        assert_eq!(h.bus.subscriber_count("mychannel"), 1);

        let stats = h.correlator.stats().snapshot();
        assert_eq!(stats.started, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.unheard, 0);
    }

    #[tokio::test]
    async fn test_reply_honors_processing_delay() {
        let h = harness(Duration::from_millis(200)).await;
        let ticket = h.namer.next_ticket();
        let request = RequestEnvelope::new(json!("hi"), ticket.channel.clone());

        let started = Instant::now();
        let reply = h
            .correlator
            .request_reply(request.to_body(), "mychannel", &ticket.channel, None)
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(reply, MessageBody::Structured(json!("hi")));
    }

    #[tokio::test]
    async fn test_non_json_reply_returned_raw() {
        let bus = Arc::new(InMemoryPubSub::new());
        let transport: Arc<dyn PubSubTransport> = bus.clone();
        let correlator = ReplyCorrelator::new(Arc::clone(&transport), Duration::from_secs(1));

        // A hand-rolled responder that answers in plain text.
        let mut requests = transport.subscribe("mychannel").await.unwrap();
        let replier = Arc::clone(&transport);
        tokio::spawn(async move {
            let text = requests.recv().await.unwrap();
            let request = RequestEnvelope::from_body(&MessageBody::decode(&text)).unwrap();
            replier
                .publish(request.response_channel.as_str(), "plain text".into())
                .await
                .unwrap();
        });

        let reply_channel = new_reply_channel("raw");
        let request = RequestEnvelope::new(json!(null), reply_channel.clone());
        let reply = correlator
            .request_reply(request.to_body(), "mychannel", &reply_channel, None)
            .await
            .unwrap();

        assert_eq!(reply, MessageBody::Raw("plain text".into()));
    }

    // =========================================================================
    // CONCURRENT EXCHANGES
    // =========================================================================

    #[tokio::test]
    async fn test_concurrent_exchanges_are_isolated() {
        let h = harness(Duration::from_millis(100)).await;

        let exchanges = (0..20).map(|_| {
            let ticket = h.namer.next_ticket();
            let correlator = &h.correlator;
            async move {
                let request = RequestEnvelope::new(
                    json!({"request_number": ticket.request_number}),
                    ticket.channel.clone(),
                );
                let reply = correlator
                    .request_reply(request.to_body(), "mychannel", &ticket.channel, None)
                    .await
                    .unwrap();
                (ticket.request_number, reply)
            }
        });

        let started = Instant::now();
        let results = join_all(exchanges).await;

        // Delays overlap rather than queue behind each other.
        assert!(started.elapsed() < Duration::from_millis(1_000));
        for (number, reply) in results {
            assert_eq!(
                reply,
                MessageBody::Structured(json!({"request_number": number}))
            );
        }
        assert_eq!(h.correlator.stats().snapshot().completed, 20);
        assert_eq!(h.bus.active_subscriptions(), 1);
    }

    #[tokio::test]
    async fn test_unique_reply_channels_across_tasks() {
        let namer = Arc::new(ReplyChannelNamer::new("myreplychannel"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let namer = Arc::clone(&namer);
                tokio::spawn(async move {
                    (0..100)
                        .map(|_| namer.next_ticket().channel)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            for channel in handle.await.unwrap() {
                assert!(seen.insert(channel));
            }
        }
        assert_eq!(seen.len(), 800);
    }

    // =========================================================================
    // RESPONDER RESILIENCE
    // =========================================================================

    #[tokio::test]
    async fn test_malformed_requests_do_not_stop_responder() {
        let h = harness(Duration::ZERO).await;

        for junk in ["not json", "[1, 2, 3]", r#"{"response": 1}"#, "42"] {
            h.bus.publish("mychannel", junk.to_string()).await.unwrap();
        }

        let ticket = h.namer.next_ticket();
        let request = RequestEnvelope::new(json!({"ok": true}), ticket.channel.clone());
        let reply = h
            .correlator
            .request_reply(request.to_body(), "mychannel", &ticket.channel, None)
            .await
            .unwrap();
        assert_eq!(reply, MessageBody::Structured(json!({"ok": true})));

        h.shutdown.send_replace(true);
        let snapshot = h.worker.await.unwrap().unwrap();
        assert_eq!(snapshot.received, 5);
        assert_eq!(snapshot.malformed, 4);
        assert_eq!(snapshot.replied, 1);
        assert_eq!(h.bus.active_subscriptions(), 0);
    }
}
