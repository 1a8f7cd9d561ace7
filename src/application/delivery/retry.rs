//! Bounded retries with linear backoff around a [`DeliveryClient`].
//!
//! After attempt `n` fails the policy sleeps `n × interval`, including after
//! the last attempt, before retrying or giving up. There is no delay before
//! the first attempt. With the defaults (5 attempts, 2 s) an always-failing
//! device costs 2 + 4 + 6 + 8 + 10 = 30 s.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use metrics::counter;
use tracing::{info, warn};

use crate::application::render::RenderedDocument;

use super::{client::DeliveryClient, error::DeliveryError};

const METRIC_DELIVERY_ATTEMPTS: &str = "scoreprint_delivery_attempts_total";

pub const DEFAULT_MAX_ATTEMPTS: NonZeroU32 = NonZeroU32::MIN.saturating_add(4);
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: NonZeroU32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: NonZeroU32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Pause after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.interval.saturating_mul(attempt)
    }
}

pub struct RetryingDelivery {
    client: Arc<dyn DeliveryClient>,
    policy: RetryPolicy,
}

impl RetryingDelivery {
    pub fn new(client: Arc<dyn DeliveryClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Delivers the document, returning the number of attempts used on success.
    pub async fn deliver(&self, document: &RenderedDocument) -> Result<u32, DeliveryError> {
        let max_attempts = self.policy.max_attempts.get();
        let mut attempt = 1;

        loop {
            match self.client.attempt(document).await {
                Ok(()) => {
                    counter!(METRIC_DELIVERY_ATTEMPTS, "outcome" => "success").increment(1);
                    info!(
                        target = "application::delivery::RetryingDelivery",
                        document = %document.name,
                        attempt,
                        "document delivered"
                    );
                    return Ok(attempt);
                }
                Err(err) => {
                    counter!(METRIC_DELIVERY_ATTEMPTS, "outcome" => err.outcome_label())
                        .increment(1);

                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        target = "application::delivery::RetryingDelivery",
                        document = %document.name,
                        attempt,
                        max_attempts,
                        backoff = ?delay,
                        error = %err,
                        "delivery attempt failed"
                    );
                    tokio::time::sleep(delay).await;

                    if attempt >= max_attempts {
                        warn!(
                            target = "application::delivery::RetryingDelivery",
                            document = %document.name,
                            attempts = attempt,
                            error = %err,
                            "delivery attempts exhausted"
                        );
                        return Err(DeliveryError::Exhausted {
                            attempts: attempt,
                            last_error: err.to_string(),
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }
}
