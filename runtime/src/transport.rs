//! Transport abstraction.
//!
//! A [`Transport`] sends [`WireRequest`]s and exposes responses grouped by
//! [`Category`]. Every response echoes the request that caused it, so the
//! correlator can map it back to its action config.
//!
//! # Implementations
//!
//! - [`HttpTransport`](crate::http::HttpTransport) - `reqwest` based, for production
//! - `InMemoryTransport` in `record-relay-testing` - records requests and answers
//!   through a responder function
//!
//! # Dyn Compatibility
//!
//! `send` returns `Pin<Box<dyn Future>>` instead of being an `async fn` so the
//! runtime can hold the transport as `Arc<dyn Transport>`.

use futures::Stream;
use record_relay_core::correlate::Response;
use record_relay_core::interpret::{Category, WireRequest};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors a transport can report for a send.
///
/// Failed exchanges (network errors, non-2xx) are not errors; they are delivered
/// as responses. These cover requests that could not be attempted at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be built
    #[error("Invalid request for {action_type}: {reason}")]
    InvalidRequest {
        /// Type of the offending request
        action_type: String,
        /// What was wrong
        reason: String,
    },

    /// The transport no longer accepts requests
    #[error("Transport closed")]
    Closed,
}

/// Stream of responses for one category.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Response> + Send>>;

/// Sends wire requests and delivers responses by category.
pub trait Transport: Send + Sync {
    /// Send a request. The response arrives later on the request's category.
    ///
    /// # Errors
    ///
    /// [`TransportError`] if the request could not be attempted.
    fn send(
        &self,
        request: &WireRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>>;

    /// Responses for `category` received from now on.
    fn select(&self, category: &Category) -> ResponseStream;
}

/// Per-category response fan-out shared by transport implementations.
///
/// Subscribers only see responses published after they subscribed.
#[derive(Clone, Debug)]
pub struct ResponseHub {
    channels: Arc<RwLock<HashMap<Category, broadcast::Sender<Response>>>>,
    capacity: usize,
}

impl ResponseHub {
    /// Default per-category buffer.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Create a hub with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a hub buffering up to `capacity` responses per category.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, category: &Category) -> broadcast::Sender<Response> {
        if let Some(sender) = self
            .channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
        {
            return sender.clone();
        }
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(category.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Deliver a response to the subscribers of `category`. Returns how many
    /// subscribers received it.
    pub fn publish(&self, category: &Category, response: Response) -> usize {
        match self.sender(category).send(response) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!(category = %category, "Response published with no subscribers");
                0
            },
        }
    }

    /// Subscribe to `category`.
    #[must_use]
    pub fn subscribe(&self, category: &Category) -> ResponseStream {
        let mut rx = self.sender(category).subscribe();
        let category = category.clone();
        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(response) => yield response,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(category = %category, skipped, "Response subscriber lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for ResponseHub {
    fn default() -> Self {
        Self::new()
    }
}
