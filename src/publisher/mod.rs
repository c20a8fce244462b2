//! Event Publisher
//!
//! Wraps a [`QuotaSnapshot`] in its [`Event`] envelope, serializes it and
//! writes it to the bus under the `k8s_quota` key.
//!
//! Serialization failures are returned immediately. Sink write failures the
//! sink reports as retryable are retried with bounded backoff; anything else
//! is returned on the first attempt.

pub mod retry;
pub mod sink;

pub use retry::RetryConfig;
pub use sink::{parse_brokers, EventSink, KafkaSink, LogSink};

use tracing::{debug, info, warn};

use crate::error::{PublishError, SinkError};
use crate::event::{Event, QuotaSnapshot};
use crate::metrics;
use retry::retry_with_backoff;

/// Publishes quota events to an [`EventSink`]
pub struct Publisher<S> {
    sink: S,
    retry: RetryConfig,
}

impl<S: EventSink> Publisher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Publish one quota snapshot
    ///
    /// # Errors
    ///
    /// - [`PublishError::Serialize`] if the event cannot be encoded
    /// - [`PublishError::Write`] once every write attempt has failed
    pub async fn publish(&self, snapshot: QuotaSnapshot) -> Result<(), PublishError> {
        let event = Event::quota_update(snapshot);
        let payload = event.to_bytes()?;
        let key = event.key();
        let workspace = event.data.workspace.as_str();
        let cluster = event.data.cluster.as_str();

        retry_with_backoff(
            &self.retry,
            SinkError::is_retryable,
            |attempt, e| {
                metrics::PUBLISH_RETRIES_TOTAL.inc();
                warn!(%workspace, %cluster, attempt, error = %e, "bus write failed, retrying");
            },
            || self.sink.write(key, payload.clone()),
        )
        .await
        .map_err(|exhausted| PublishError::Write {
            attempts: exhausted.attempts,
            source: exhausted.last_error,
        })?;

        metrics::EVENTS_PUBLISHED_TOTAL.inc();
        info!(%workspace, %cluster, destination = %self.sink.describe(), "quota event published");
        debug!(message = %String::from_utf8_lossy(&payload), "published message");
        Ok(())
    }
}
