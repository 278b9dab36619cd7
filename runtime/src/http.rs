//! `reqwest` transport.
//!
//! Fetches are sent as `GET {url}?{filters}`; patches as `PATCH {url}` with the
//! JSON body `[{op, path, value}]`. Every exchange produces exactly one response
//! on the request's category:
//!
//! - a received HTTP response: its status, and its JSON body spread into the
//!   response (non-object bodies under `data`)
//! - a network failure: status `0` and the error under `message`

use crate::metrics::TransportMetrics;
use crate::transport::{ResponseHub, ResponseStream, Transport, TransportError};
use record_relay_core::correlate::Response;
use record_relay_core::interpret::{Category, WirePayload, WireRequest};
use reqwest::Client;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

/// HTTP transport backed by a `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    hub: ResponseHub,
}

impl HttpTransport {
    /// Create a transport with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a transport using a preconfigured client (timeouts, TLS, headers).
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            hub: ResponseHub::new(),
        }
    }

    async fn exchange(&self, request: &WireRequest) -> Response {
        let echo = request.echo();
        let builder = match &request.payload {
            WirePayload::Filters(filters) => self.client.get(&request.url).query(&query_pairs(filters)),
            WirePayload::Query(query) => self.client.patch(&request.url).json(&[query]),
        };

        match builder.send().await {
            Ok(http) => {
                let status = http.status().as_u16();
                let body = match http.bytes().await {
                    Ok(bytes) if bytes.is_empty() => Value::Null,
                    Ok(bytes) => serde_json::from_slice(&bytes)
                        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned())),
                    Err(e) => {
                        tracing::warn!(url = %request.url, error = %e, "Failed to read response body");
                        Value::Null
                    },
                };
                let mut response = Response::new(status, echo);
                response.fields = body_fields(body);
                response
            },
            Err(e) => {
                TransportMetrics::record_error();
                tracing::warn!(
                    url = %request.url,
                    action_type = %request.action_type,
                    error = %e,
                    "HTTP request failed"
                );
                Response::new(0, echo).with_field("message", Value::String(e.to_string()))
            },
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        request: &WireRequest,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        let request = request.clone();
        Box::pin(async move {
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                action_type = %request.action_type,
                "Sending request"
            );
            let response = self.exchange(&request).await;
            self.hub.publish(&request.category, response);
            Ok(())
        })
    }

    fn select(&self, category: &Category) -> ResponseStream {
        self.hub.subscribe(category)
    }
}

/// Flatten fetch filters into query pairs; strings are sent raw, anything else as JSON.
fn query_pairs(filters: &Value) -> Vec<(String, String)> {
    match filters {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn body_fields(body: Value) -> Map<String, Value> {
    match body {
        Value::Object(mut fields) => {
            fields.remove("status");
            fields.remove("request");
            fields
        },
        Value::Null => Map::new(),
        other => {
            let mut fields = Map::new();
            fields.insert("data".to_string(), other);
            fields
        },
    }
}
