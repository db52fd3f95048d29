//! # Failure Modes
//!
//! What a requester sees when the other side is missing, slow, gone, or
//! when the requester itself gives up. In every case the reply subscription
//! must be released.

#[cfg(test)]
mod tests {
    use relay_bus::{InMemoryPubSub, PubSubTransport, TransportError};
    use relay_rpc::{
        ChannelId, ReplyCorrelator, RequestEnvelope, ResponderConfig, ResponderWorker, RpcError,
        WorkerState,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::watch;

    fn bus() -> (Arc<InMemoryPubSub>, Arc<dyn PubSubTransport>) {
        let bus = Arc::new(InMemoryPubSub::new());
        let transport: Arc<dyn PubSubTransport> = bus.clone();
        (bus, transport)
    }

    fn request(channel: &ChannelId) -> relay_bus::MessageBody {
        RequestEnvelope::new(json!({"request_number": 1}), channel.clone()).to_body()
    }

    #[tokio::test]
    async fn test_no_responder_times_out() {
        let (bus, transport) = bus();
        let correlator = ReplyCorrelator::new(transport, Duration::from_secs(5));
        let channel = ChannelId::new("myreplychannel1");

        let started = Instant::now();
        let err = correlator
            .request_reply(
                request(&channel),
                "mychannel",
                &channel,
                Some(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(
            err,
            RpcError::Timeout {
                channel: "myreplychannel1".into(),
                timeout: Duration::from_millis(100),
            }
        );
        assert_eq!(bus.active_subscriptions(), 0);

        let stats = correlator.stats().snapshot();
        assert_eq!(stats.unheard, 1);
        assert_eq!(stats.timeouts, 1);
    }

    #[tokio::test]
    async fn test_slow_responder_times_out_and_late_reply_is_dropped() {
        let (bus, transport) = bus();
        let worker = ResponderWorker::new(
            Arc::clone(&transport),
            ResponderConfig {
                processing_delay: Duration::from_millis(300),
                ..ResponderConfig::default()
            },
        );
        let stats = worker.stats();
        let mut state = worker.state();
        let (_shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(worker.run(shutdown_rx));
        state
            .wait_for(|s| *s == WorkerState::Listening)
            .await
            .unwrap();

        let correlator = ReplyCorrelator::new(transport, Duration::from_millis(100));
        let channel = ChannelId::new("myreplychannel1");
        let err = correlator
            .request_reply(request(&channel), "mychannel", &channel, None)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(bus.subscriber_count("myreplychannel1"), 0);

        // The late reply finds nobody listening.
        tokio::time::sleep(Duration::from_millis(400)).await;
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.replied, 1);
        assert_eq!(snapshot.undelivered, 1);
    }

    #[tokio::test]
    async fn test_responder_shutdown_leaves_in_flight_request_to_time_out() {
        let (bus, transport) = bus();
        let worker = ResponderWorker::new(
            Arc::clone(&transport),
            ResponderConfig {
                processing_delay: Duration::from_millis(500),
                ..ResponderConfig::default()
            },
        );
        let mut state = worker.state();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));
        state
            .wait_for(|s| *s == WorkerState::Listening)
            .await
            .unwrap();

        let correlator = ReplyCorrelator::new(transport, Duration::from_millis(300));
        let channel = ChannelId::new("myreplychannel1");
        let exchange = correlator.request_reply(request(&channel), "mychannel", &channel, None);

        let stopper = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.send_replace(true);
        };
        let (result, ()) = tokio::join!(exchange, stopper);

        assert!(result.unwrap_err().is_timeout());
        let snapshot = handle.await.unwrap().unwrap();
        assert_eq!(snapshot.received, 1);
        assert_eq!(snapshot.replied, 0);
        assert_eq!(bus.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_exchange_releases_subscription() {
        let (bus, transport) = bus();
        let correlator = ReplyCorrelator::new(transport, Duration::from_secs(5));
        let channel = ChannelId::new("myreplychannel1");
        let (cancel, cancel_rx) = watch::channel(false);

        let exchange = correlator.request_reply_cancellable(
            request(&channel),
            "mychannel",
            &channel,
            None,
            cancel_rx,
        );
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.send_replace(true);
        };
        let (result, ()) = tokio::join!(exchange, canceller);

        assert_eq!(
            result,
            Err(RpcError::Cancelled {
                channel: "myreplychannel1".into()
            })
        );
        assert_eq!(bus.active_subscriptions(), 0);
        assert_eq!(correlator.stats().snapshot().cancelled, 1);
    }

    #[tokio::test]
    async fn test_dropped_exchange_releases_subscription() {
        let (bus, transport) = bus();
        let correlator = ReplyCorrelator::new(transport, Duration::from_secs(5));
        let channel = ChannelId::new("myreplychannel1");

        let outer = tokio::time::timeout(
            Duration::from_millis(50),
            correlator.request_reply(request(&channel), "mychannel", &channel, None),
        )
        .await;

        assert!(outer.is_err());
        assert_eq!(bus.active_subscriptions(), 0);
        assert_eq!(bus.subscriptions_released(), 1);
    }

    #[tokio::test]
    async fn test_transport_closed_mid_exchange() {
        let (bus, transport) = bus();
        let correlator = ReplyCorrelator::new(transport, Duration::from_secs(5));
        let channel = ChannelId::new("myreplychannel1");

        let exchange = correlator.request_reply(request(&channel), "mychannel", &channel, None);
        let closer = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            bus.close();
        };
        let (result, ()) = tokio::join!(exchange, closer);

        assert_eq!(
            result,
            Err(RpcError::Transport(TransportError::ConnectionClosed))
        );
        assert_eq!(correlator.stats().snapshot().transport_errors, 1);
    }
}
