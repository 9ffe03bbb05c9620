//! Tests for publishing, subscription and the consumer loop

#[cfg(test)]
mod tests {
    use crate::core::error_handling::ContextualError;
    use crate::core::fatal::CollectingFatalHandler;
    use crate::events::api::{DomainEvent, Listener};
    use crate::stream::api::{BrokerError, ConsumerSession, MemoryBroker, StreamError};
    use crate::stream::tests::common::{
        collection_error, file_ready, stream, wait_until, Recorder, GROUP, TOPIC,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn test_events_are_keyed_by_type_on_host_topic() {
        let broker = MemoryBroker::new(1);
        let stream = stream(&broker, Arc::new(CollectingFatalHandler::new()));

        let position = stream.queue_event(file_ready("a.csv")).await.unwrap();

        assert_eq!(stream.client_id(), GROUP);
        assert_eq!(position.topic, TOPIC);
        assert_eq!(position.offset, 0);
        let session = broker.open_session("inspector", TOPIC, true).unwrap();
        let batches = session.poll_batches().unwrap();
        let message = &batches[0].messages[0];
        assert_eq!(message.key.as_deref(), Some(&b"FileReady"[..]));
        let value: serde_json::Value =
            serde_json::from_slice(message.value.as_deref().unwrap()).unwrap();
        assert_eq!(value["eventType"], "FileReady");
        assert_eq!(value["filename"], "a.csv");
    }

    #[tokio::test]
    async fn test_published_events_reach_listeners_and_get_committed() {
        let broker = MemoryBroker::new(2);
        let fatal = Arc::new(CollectingFatalHandler::new());
        let stream = stream(&broker, fatal.clone());
        let recorder = Arc::new(Recorder::default());
        assert!(stream.add_listener(recorder.clone()).await.unwrap());

        stream.queue_event(file_ready("a.csv")).await.unwrap();
        stream.queue_event(collection_error("timeout")).await.unwrap();
        stream
            .queue_event(DomainEvent::file_system_size_stats(50, 200))
            .await
            .unwrap();

        wait_until(|| broker.is_fully_committed(GROUP, TOPIC)).await;
        let mut seen = recorder.seen();
        seen.sort();
        assert_eq!(
            seen,
            vec!["CollectionError", "FileReady", "FileSystemSizeStats"]
        );
        assert!(!fatal.is_triggered());

        stream.shutdown().await;
        assert!(!broker.sessions()[0].is_running());
    }

    #[tokio::test]
    async fn test_first_listener_subscribes_once() {
        let broker = MemoryBroker::new(1);
        let stream = stream(&broker, Arc::new(CollectingFatalHandler::new()));
        let listener: Arc<dyn Listener<DomainEvent>> = Arc::new(Recorder::default());

        assert!(stream.add_listener(listener.clone()).await.unwrap());
        assert!(!stream.add_listener(listener).await.unwrap());
        assert!(stream.add_listener(Arc::new(Recorder::default())).await.unwrap());

        assert_eq!(broker.sessions().len(), 1);
        assert_eq!(broker.sessions()[0].group_id(), GROUP);
        assert_eq!(stream.dispatcher().listener_count(), 2);
        stream.shutdown().await;
    }

    #[tokio::test]
    async fn test_events_published_before_subscribing_are_consumed() {
        let broker = MemoryBroker::new(1);
        let stream = stream(&broker, Arc::new(CollectingFatalHandler::new()));
        stream.queue_event(file_ready("early.csv")).await.unwrap();

        let recorder = Arc::new(Recorder::default());
        stream.add_listener(recorder.clone()).await.unwrap();

        wait_until(|| recorder.seen().len() == 1).await;
        wait_until(|| broker.committed(GROUP, TOPIC, 0) == Some(1)).await;
        stream.shutdown().await;
    }

    #[tokio::test]
    async fn test_unavailable_broker_surfaces_to_caller() {
        let broker = MemoryBroker::new(1);
        let stream = stream(&broker, Arc::new(CollectingFatalHandler::new()));
        broker.set_available(false);

        let sent = stream.queue_event(file_ready("a.csv")).await;
        assert!(matches!(
            sent,
            Err(StreamError::Broker(BrokerError::Send { .. }))
        ));

        let error = stream
            .add_listener(Arc::new(Recorder::default()))
            .await
            .unwrap_err();
        assert!(error.is_user_actionable());
        assert!(broker.sessions().is_empty());

        broker.set_available(true);
        assert!(stream.add_listener(Arc::new(Recorder::default())).await.unwrap());
        assert_eq!(broker.sessions().len(), 1);
        stream.shutdown().await;
    }
}
