//! Delivery of error events to the tracker.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;

use super::dsn::Dsn;
use super::event::ErrorEvent;

/// Client identifier sent with every event.
pub const CLIENT_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracker rejected event with status {0}")]
    Rejected(u16),
    #[error("invalid auth header: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, event: &ErrorEvent) -> Result<(), TransportError>;
}

/// POSTs events to the store endpoint derived from the DSN.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    dsn: Dsn,
    store_url: String,
}

impl HttpTransport {
    pub fn new(dsn: Dsn, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let store_url = dsn.store_url();
        Ok(Self {
            client,
            dsn,
            store_url,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, event: &ErrorEvent) -> Result<(), TransportError> {
        let auth = HeaderValue::from_str(&self.dsn.auth_header(CLIENT_NAME))?;
        let response = self
            .client
            .post(&self.store_url)
            .header("X-Sentry-Auth", auth)
            .json(event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Used when no DSN is configured: the event is only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, event: &ErrorEvent) -> Result<(), TransportError> {
        tracing::warn!(
            event_id = %event.event_id.simple(),
            kind = event.kind().unwrap_or("unknown"),
            message = %event.message,
            breadcrumbs = event.breadcrumbs.values.len(),
            "Error reporting disabled (no DSN); event not sent"
        );
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    events: Arc<Mutex<Vec<ErrorEvent>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every event delivered so far.
    pub fn events(&self) -> Vec<ErrorEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, event: &ErrorEvent) -> Result<(), TransportError> {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
        Ok(())
    }
}
