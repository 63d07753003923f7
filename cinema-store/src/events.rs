use async_trait::async_trait;
use cinema_core::{EventPublisher, StoreError};
use cinema_shared::BookingEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::info;

fn encode(event: &BookingEvent) -> Result<String, StoreError> {
    serde_json::to_string(event).map_err(|e| StoreError::Corrupt(format!("event encoding: {}", e)))
}

/// Writes every event to the log; used when no broker is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: &BookingEvent) -> Result<(), StoreError> {
        let payload = encode(event)?;
        info!(topic = event.topic(), key = %event.key(), payload = %payload, "Domain event");
        Ok(())
    }
}

/// Keeps published events in memory for inspection
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<BookingEvent>>,
    failing: AtomicBool,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<BookingEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.events().iter().map(BookingEvent::topic).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &BookingEvent) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("event sink offline".to_string()));
        }
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaEventPublisher;

#[cfg(feature = "kafka")]
mod kafka {
    use super::*;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::error;

    /// Publishes each event to the topic named by the event, keyed by booking
    #[derive(Clone)]
    pub struct KafkaEventPublisher {
        producer: FutureProducer,
    }

    impl KafkaEventPublisher {
        pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self { producer })
        }
    }

    #[async_trait]
    impl EventPublisher for KafkaEventPublisher {
        async fn publish(&self, event: &BookingEvent) -> Result<(), StoreError> {
            let payload = encode(event)?;
            let key = event.key();
            let topic = event.topic();
            let record = FutureRecord::to(topic).key(&key).payload(&payload);

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!(
                        topic,
                        key = %key,
                        partition = delivery.partition,
                        offset = delivery.offset,
                        "Event delivered"
                    );
                    Ok(())
                }
                Err((e, _msg)) => {
                    error!(topic, error = %e, "Failed to deliver event");
                    Err(StoreError::Unavailable(format!("kafka: {}", e)))
                }
            }
        }
    }
}
