use axum::{
    Json,
    extract::{ConnectInfo, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::error::ApiError;
use crate::metrics::REQUEST_LATENCY;
use crate::state::AppState;

// GET /resources/{id}; the peer IP is the client key
pub async fn get_resource_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let start_time = Instant::now();
    let client = addr.ip().to_string();

    let result = state.service.get_resource(&client, &id).await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    result.map(Json)
}

// PUT /resources/{id}
pub async fn put_resource_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let start_time = Instant::now();
    let client = addr.ip().to_string();

    let result = state
        .service
        .add_or_update_resource(&client, &id, payload)
        .await;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    result.map(|()| StatusCode::NO_CONTENT)
}

// whole seconds until `until`, rounded up
fn retry_after_secs(until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = until.signed_duration_since(now).num_milliseconds().max(0);
    (millis + 999) / 1000
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error_type() as u16)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self {
            ApiError::TooManyRequests { blocked_until } => {
                let retry_after = retry_after_secs(blocked_until, Utc::now());
                let body = serde_json::json!({
                    "error": "Rate limit exceeded. Try again later.",
                    "blocked_until": blocked_until.to_rfc3339(),
                });
                (
                    status,
                    [(header::RETRY_AFTER, retry_after.to_string())],
                    Json(body),
                )
                    .into_response()
            }
            other => {
                let body = serde_json::json!({ "error": other.to_string() });
                (status, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use crate::clock::ManualClock;
    use crate::rate_limit::{RateLimiter, ThrottleSettings};
    use crate::service::ApiService;
    use crate::store::{JsonStore, MemoryStore};
    use chrono::TimeDelta;
    use std::time::Duration;

    fn app_state(max_requests: u32) -> Arc<AppState> {
        let settings = ThrottleSettings {
            max_requests_per_interval: max_requests,
            interval: Duration::from_secs(60),
            ban_timeout: Duration::from_secs(60),
        };
        let limiter = RateLimiter::new(&settings, Arc::new(ManualClock::default())).unwrap();
        let store: JsonStore = Box::new(MemoryStore::<Value>::new());
        Arc::new(AppState {
            service: ApiService::new(Cache::new(store), Some(limiter)),
        })
    }

    fn peer() -> ConnectInfo<SocketAddr> {
        ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000)))
    }

    #[test]
    fn retry_after_rounds_up() {
        let now = DateTime::<Utc>::UNIX_EPOCH;
        assert_eq!(retry_after_secs(now + TimeDelta::milliseconds(1500), now), 2);
        assert_eq!(retry_after_secs(now + TimeDelta::seconds(60), now), 60);
        assert_eq!(retry_after_secs(now, now + TimeDelta::seconds(5)), 0);
    }

    #[tokio::test]
    async fn put_then_get() {
        let state = app_state(10);
        let status = put_resource_handler(
            State(state.clone()),
            peer(),
            Path("id1".to_string()),
            Json(serde_json::json!({ "name": "first" })),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(value) = get_resource_handler(State(state), peer(), Path("id1".to_string()))
            .await
            .unwrap();
        assert_eq!(value["name"], "first");
    }

    #[tokio::test]
    async fn unknown_resource_is_404() {
        let state = app_state(10);
        let err = get_resource_handler(State(state), peer(), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn throttled_request_is_429_with_retry_after() {
        let state = app_state(1);
        let _ = get_resource_handler(State(state.clone()), peer(), Path("id1".to_string())).await;

        let err = get_resource_handler(State(state), peer(), Path("id1".to_string()))
            .await
            .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }
}
