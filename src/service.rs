use tracing::debug;

use crate::cache::Cache;
use crate::error::ApiError;
use crate::metrics::{REQUEST_TOTAL, THROTTLED_TOTAL};
use crate::rate_limit::{AccessDecision, RateLimiter};
use crate::store::Store;

/// Admission control in front of the cache.
///
/// Every call, read or write, spends one slot of the client's quota.
/// Without a limiter every request is admitted.
pub struct ApiService<S: Store> {
    limiter: Option<RateLimiter>,
    cache: Cache<S>,
}

impl<S: Store> ApiService<S> {
    pub fn new(cache: Cache<S>, limiter: Option<RateLimiter>) -> Self {
        Self { limiter, cache }
    }

    pub fn cache(&self) -> &Cache<S> {
        &self.cache
    }

    pub fn limiter(&self) -> Option<&RateLimiter> {
        self.limiter.as_ref()
    }

    pub async fn get_resource(&self, client: &str, id: &str) -> Result<S::Value, ApiError> {
        self.admit(client)?;
        Ok(self.cache.get_resource(id).await?)
    }

    pub async fn add_or_update_resource(
        &self,
        client: &str,
        id: &str,
        value: S::Value,
    ) -> Result<(), ApiError> {
        self.admit(client)?;
        Ok(self.cache.add_or_update_resource(id, value).await?)
    }

    fn admit(&self, client: &str) -> Result<(), ApiError> {
        REQUEST_TOTAL.inc();
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        match limiter.request_access(client) {
            AccessDecision::Admitted => Ok(()),
            AccessDecision::Blocked { until } => {
                THROTTLED_TOTAL.inc();
                debug!(client, %until, "request throttled");
                Err(ApiError::TooManyRequests {
                    blocked_until: until,
                })
            }
        }
    }
}
