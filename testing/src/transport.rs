//! In-memory transport for fast, deterministic pipeline tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity

use record_relay_core::correlate::Response;
use record_relay_core::interpret::{Category, WireRequest};
use record_relay_runtime::transport::{ResponseHub, ResponseStream, Transport, TransportError};
use serde_json::{Value, json};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

/// Builds the response a request receives.
pub type Responder = Arc<dyn Fn(&WireRequest) -> Response + Send + Sync>;

/// Transport that records every request and answers it with a [`Responder`].
///
/// Responses are published on the request's category as soon as the request is
/// sent, so subscribe with [`Transport::select`] first.
///
/// # Example
///
/// ```
/// use record_relay_testing::InMemoryTransport;
///
/// let transport = InMemoryTransport::new();
/// assert!(transport.is_empty());
/// ```
#[derive(Clone)]
pub struct InMemoryTransport {
    sent: Arc<RwLock<Vec<WireRequest>>>,
    responder: Responder,
    hub: ResponseHub,
}

impl InMemoryTransport {
    /// A transport answering every request with `200` and `data: []`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_responder(|request| ok_response(request, json!([])))
    }

    /// A transport answering with `responder`.
    #[must_use]
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&WireRequest) -> Response + Send + Sync + 'static,
    {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
            responder: Arc::new(responder),
            hub: ResponseHub::new(),
        }
    }

    /// A transport failing every request with `500 Internal Server Error`.
    #[must_use]
    pub fn failing() -> Self {
        Self::with_responder(|request| error_response(request, 500, "Internal Server Error"))
    }

    /// Requests sent so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<WireRequest> {
        self.sent.read().unwrap().clone()
    }

    /// Number of requests sent.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    /// Whether nothing was sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.read().unwrap().is_empty()
    }

    /// Forget recorded requests (for test isolation).
    pub fn clear(&self) {
        self.sent.write().unwrap().clear();
    }

    /// Publish a response nobody asked for.
    pub fn publish(&self, category: &Category, response: Response) -> usize {
        self.hub.publish(category, response)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("sent", &self.len())
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

impl Transport for InMemoryTransport {
    fn send(
        &self,
        request: &WireRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        let request = request.clone();
        Box::pin(async move {
            let response = (self.responder)(&request);
            self.sent.write().unwrap().push(request.clone());
            self.hub.publish(&request.category, response);
            Ok(())
        })
    }

    fn select(&self, category: &Category) -> ResponseStream {
        self.hub.subscribe(category)
    }
}

/// `200` echoing `request`, with `data`.
#[must_use]
pub fn ok_response(request: &WireRequest, data: Value) -> Response {
    Response::new(200, request.echo()).with_field("data", data)
}

/// `status` echoing `request`, with `message`.
#[must_use]
pub fn error_response(request: &WireRequest, status: u16, message: &str) -> Response {
    Response::new(status, request.echo()).with_field("message", Value::String(message.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use futures::StreamExt;
    use record_relay_core::interpret::WirePayload;
    use record_relay_core::naming::HttpMethod;

    fn request() -> WireRequest {
        WireRequest {
            url: "http://localhost:8080/api/cities".into(),
            method: HttpMethod::Get,
            category: Category::all(),
            action_type: "sample/cities/FETCH_REQUEST".into(),
            payload: WirePayload::Filters(json!({"user": "123"})),
        }
    }

    #[tokio::test]
    async fn records_and_answers_requests() {
        let transport = InMemoryTransport::new();
        let mut responses = transport.select(&Category::all());

        transport.send(&request()).await.unwrap();

        assert_eq!(transport.len(), 1);
        let response = responses.next().await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.request_type(), Some("sample/cities/FETCH_REQUEST"));
        assert_eq!(response.fields["data"], json!([]));

        transport.clear();
        assert!(transport.is_empty());
    }

    #[tokio::test]
    async fn failing_transport_answers_500() {
        let transport = InMemoryTransport::failing();
        let mut responses = transport.select(&Category::all());

        transport.send(&request()).await.unwrap();

        let response = responses.next().await.unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.fields["message"], json!("Internal Server Error"));
    }
}
