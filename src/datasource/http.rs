//! Paged event feed over HTTP.

use super::{EventSource, EventSourceError};
use crate::domain::{ChainEvent, EventCursor};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Pulls events from an indexer feed that answers `POST {base}/events`.
///
/// Request: `{"after": {"block", "log_index"} | null, "limit": n}`.
/// Response: a JSON array of events in canonical order.
#[derive(Debug, Clone)]
pub struct HttpEventSource {
    client: Client,
    base_url: String,
}

impl HttpEventSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post_events(
        &self,
        payload: serde_json::Value,
    ) -> Result<Vec<ChainEvent>, EventSourceError> {
        let url = format!("{}/events", self.base_url.trim_end_matches('/'));
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(EventSourceError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(EventSourceError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(EventSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(EventSourceError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response.json::<Vec<ChainEvent>>().await.map_err(|e| {
                backoff::Error::permanent(EventSourceError::ParseError(e.to_string()))
            })
        })
        .await
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn fetch_events(
        &self,
        after: Option<EventCursor>,
        limit: usize,
    ) -> Result<Vec<ChainEvent>, EventSourceError> {
        debug!(after = ?after, limit, "fetching events");
        let payload = serde_json::json!({
            "after": after,
            "limit": limit,
        });
        let mut events = self.post_events(payload).await?;
        // The feed is trusted for order, not for the cursor bound.
        if let Some(cursor) = after {
            events.retain(|e| cursor.precedes(e));
        }
        events.truncate(limit);
        Ok(events)
    }
}
