//! Access to the backing event table.
//!
//! The [`EventGateway`] trait is the seam between the catalog UI and whatever
//! serves the records. [`HttpGateway`] talks to the functions API;
//! [`MemoryGateway`] keeps records in-process.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::record::EventRecord;

/// Path of the list endpoint, relative to the base URL.
pub const LIST_EVENTS_PATH: &str = "getEvents";

/// Path of the update endpoint, relative to the base URL.
pub const UPDATE_EVENT_PATH: &str = "updateEvent";

/// Header carrying the API access token.
pub const API_KEY_HEADER: &str = "x-functions-key";

/// Read and update access to the event catalog.
///
/// Both operations are idempotent: listing is a pure read and saving is an
/// upsert keyed on the event name, so either can be retried safely.
#[async_trait]
pub trait EventGateway: Send + Sync {
    /// Fetch every record in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the request fails or the response cannot
    /// be decoded, and [`Error::Server`] on a non-success status.
    async fn list_events(&self) -> Result<Vec<EventRecord>>;

    /// Store the given record under its name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the record has no name, before any
    /// request is made. Otherwise fails like [`EventGateway::list_events`].
    async fn save_event(&self, record: &EventRecord) -> Result<()>;
}

/// Gateway backed by the HTTP functions API.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Create a gateway for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to create HTTP client: {e}")))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Using event API at {}", base_url);

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Create a gateway from the `[api]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api.base_url, config.api.token.clone(), config.timeout())
    }

    /// The base URL with trailing slashes removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-success response into a server error carrying its body.
    async fn server_error(operation: &'static str, response: Response) -> Error {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        warn!(operation, status = status.as_u16(), "Request rejected by server");
        Error::server(operation, status.as_u16(), body)
    }
}

#[async_trait]
impl EventGateway for HttpGateway {
    async fn list_events(&self) -> Result<Vec<EventRecord>> {
        let url = self.url(LIST_EVENTS_PATH);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| Error::transport(LIST_EVENTS_PATH, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::server_error(LIST_EVENTS_PATH, response).await);
        }

        let records: Vec<EventRecord> = response
            .json()
            .await
            .map_err(|e| Error::transport(LIST_EVENTS_PATH, format!("malformed response: {e}")))?;

        debug!("Fetched {} events", records.len());
        Ok(records)
    }

    async fn save_event(&self, record: &EventRecord) -> Result<()> {
        record.ensure_named()?;

        let url = self.url(UPDATE_EVENT_PATH);
        debug!(event = %record.event_name, "POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.token)
            .json(record)
            .send()
            .await
            .map_err(|e| Error::transport(UPDATE_EVENT_PATH, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::server_error(UPDATE_EVENT_PATH, response).await);
        }

        info!(event = %record.event_name, "Event saved");
        Ok(())
    }
}

/// Gateway holding records in memory.
///
/// Useful for tests and demos. Call counters and injectable failures make it
/// possible to observe caching and retry behavior.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    records: Mutex<BTreeMap<String, EventRecord>>,
    list_calls: AtomicUsize,
    save_calls: AtomicUsize,
    failing_lists: AtomicUsize,
    failing_saves: AtomicUsize,
}

impl MemoryGateway {
    /// Create a gateway seeded with the given records.
    #[must_use]
    pub fn new(records: impl IntoIterator<Item = EventRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.event_name.clone(), r))
            .collect();
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    /// A snapshot of the stored records, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the record lock is poisoned.
    pub fn records(&self) -> Result<Vec<EventRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::internal("memory gateway lock poisoned"))?;
        Ok(records.values().cloned().collect())
    }

    /// Number of `list_events` calls that reached the gateway.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `save_event` calls that passed validation.
    #[must_use]
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Make the next `count` list calls fail with a 503.
    pub fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` save calls fail with a 500.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EventGateway for MemoryGateway {
    async fn list_events(&self) -> Result<Vec<EventRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_lists) {
            return Err(Error::server(LIST_EVENTS_PATH, 503, "Service Unavailable"));
        }
        self.records()
    }

    async fn save_event(&self, record: &EventRecord) -> Result<()> {
        record.ensure_named()?;
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_saves) {
            return Err(Error::server(UPDATE_EVENT_PATH, 500, "Internal Server Error"));
        }

        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::internal("memory gateway lock poisoned"))?;
        match records.get_mut(&record.event_name) {
            Some(existing) => *existing = record.clone(),
            // Updates never create rows
            None => warn!(event = %record.event_name, "Save matched no stored event"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryGateway {
        MemoryGateway::new([
            EventRecord::new("b_event").with_tags(r#"["x"]"#),
            EventRecord::new("a_event").with_description("d"),
        ])
    }

    #[tokio::test]
    async fn test_memory_list_is_ordered_and_counted() {
        let gateway = seeded();
        let records = gateway.list_events().await.unwrap();

        let names: Vec<_> = records.iter().map(|r| r.event_name.as_str()).collect();
        assert_eq!(names, vec!["a_event", "b_event"]);
        assert_eq!(gateway.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_memory_save_replaces_existing() {
        let gateway = seeded();
        let updated = EventRecord::new("b_event").with_description("now documented");

        gateway.save_event(&updated).await.unwrap();

        let records = gateway.records().unwrap();
        let saved = records.iter().find(|r| r.event_name == "b_event").unwrap();
        assert_eq!(saved, &updated);
        assert_eq!(gateway.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_memory_save_unknown_name_creates_nothing() {
        let gateway = seeded();
        gateway.save_event(&EventRecord::new("c_event")).await.unwrap();
        assert_eq!(gateway.records().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_save_rejects_empty_name() {
        let gateway = seeded();
        let err = gateway.save_event(&EventRecord::new("")).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(gateway.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_memory_injected_failures_are_consumed() {
        let gateway = seeded();
        gateway.fail_next_lists(1);

        let err = gateway.list_events().await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert!(gateway.list_events().await.is_ok());
        assert_eq!(gateway.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_memory_injected_save_failure_keeps_record() {
        let gateway = seeded();
        gateway.fail_next_saves(1);

        let updated = EventRecord::new("a_event").with_description("changed");
        assert!(gateway.save_event(&updated).await.is_err());

        let records = gateway.records().unwrap();
        assert_eq!(records[0].description.as_deref(), Some("d"));
    }

    #[test]
    fn test_http_gateway_trims_base_url() {
        let gateway =
            HttpGateway::new("http://localhost:7071/api///", "t", Duration::from_secs(1)).unwrap();
        assert_eq!(gateway.base_url(), "http://localhost:7071/api");
        assert_eq!(gateway.url(LIST_EVENTS_PATH), "http://localhost:7071/api/getEvents");
    }

    #[test]
    fn test_http_gateway_debug_hides_token() {
        let gateway =
            HttpGateway::new("http://localhost:7071/api", "secret-token", Duration::from_secs(1))
                .unwrap();
        let debug_str = format!("{gateway:?}");
        assert!(debug_str.contains("localhost"));
        assert!(!debug_str.contains("secret-token"));
    }

    #[tokio::test]
    async fn test_http_save_rejects_empty_name_without_request() {
        // Nothing listens on this port; validation must fail first.
        let gateway = HttpGateway::new("http://127.0.0.1:9", "t", Duration::from_secs(1)).unwrap();
        let err = gateway.save_event(&EventRecord::new("")).await.unwrap_err();
        assert!(err.is_validation());
    }
}
