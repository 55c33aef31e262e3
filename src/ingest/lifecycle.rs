//! Connectivity check and idempotent index reset performed before every ingestion run.

use super::types::LifecycleError;
use crate::config::ConnectPolicy;
use crate::elastic::{ElasticService, document_schema};
use backoff::{ExponentialBackoff, backoff::Backoff};
use tokio_util::sync::CancellationToken;

/// Brings the index into a known, empty, correctly-mapped state.
pub struct IndexLifecycle<'a> {
    elastic: &'a ElasticService,
    policy: ConnectPolicy,
}

impl<'a> IndexLifecycle<'a> {
    /// Create a lifecycle manager for the index behind `elastic`.
    pub fn new(elastic: &'a ElasticService, policy: ConnectPolicy) -> Self {
        Self { elastic, policy }
    }

    /// Wait for the engine, then reset the index.
    pub async fn prepare(&self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
        self.wait_for_engine(cancel).await?;
        self.reset().await
    }

    /// Probe cluster health until it answers, the retry policy runs out, or `cancel` fires.
    ///
    /// Each health request is bounded by the client's request timeout, and both it and the
    /// backoff sleep give way to `cancel`. Nothing destructive happens here, so cancelling
    /// leaves the index untouched.
    pub async fn wait_for_engine(&self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.policy.initial_backoff,
            max_interval: self.policy.initial_backoff.max(std::time::Duration::from_secs(10)),
            max_elapsed_time: Some(self.policy.max_elapsed),
            ..Default::default()
        };
        backoff.reset();

        let mut attempts = 0;
        loop {
            if cancel.is_cancelled() {
                tracing::warn!(attempts, "Connectivity check cancelled");
                return Err(LifecycleError::Cancelled);
            }

            attempts += 1;
            tracing::info!(attempt = attempts, "Connecting to Elasticsearch");
            let health = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(attempts, "Connectivity check cancelled during health request");
                    return Err(LifecycleError::Cancelled);
                }
                health = self.elastic.cluster_health() => health,
            };
            let error = match health {
                Ok(health) => {
                    tracing::info!(
                        cluster = %health.cluster_name,
                        status = %health.status,
                        nodes = health.number_of_nodes,
                        "Elasticsearch reachable"
                    );
                    return Ok(());
                }
                Err(error) => error,
            };

            if attempts >= self.policy.max_attempts {
                tracing::error!(attempts, error = %error, "Max connection attempts exceeded");
                return Err(LifecycleError::Unreachable {
                    attempts,
                    source: error,
                });
            }
            let Some(delay) = backoff.next_backoff() else {
                tracing::error!(attempts, error = %error, "Connection backoff exhausted");
                return Err(LifecycleError::Unreachable {
                    attempts,
                    source: error,
                });
            };

            tracing::warn!(
                error = %error,
                retry_in_ms = delay.as_millis() as u64,
                "Connection failed, retrying"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(attempts, "Connectivity check cancelled");
                    return Err(LifecycleError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Drop the index if present, recreate it and apply the document mapping.
    ///
    /// Safe to run repeatedly; each run leaves an empty index with the same mapping.
    pub async fn reset(&self) -> Result<(), LifecycleError> {
        let index = self.elastic.index_name();
        if self.elastic.index_exists().await? {
            tracing::info!(index, "Deleting existing index");
            self.elastic.delete_index().await?;
        }

        self.elastic.create_index().await?;
        self.elastic.put_mapping(&document_schema()).await?;
        tracing::info!(index, "Index reset with paragraph mapping");
        Ok(())
    }
}
