//! Response correlation.
//!
//! Every response echoes the request that caused it. The echoed `type` selects the
//! owning config from the latest lookup snapshot and the status selects the phase:
//! any 2xx becomes a `SUCCESS` action whose body is the response minus `status` and
//! `request`, anything else a `FAILURE` action carrying the whole response.

use crate::action::{Action, ActionError, creator, json_kind};
use crate::combinators::{StartupGate, with_latest};
use crate::config::ActionConfigLookup;
use crate::naming::{ActionType, Phase};
use crate::scope::Scope;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::ops::RangeInclusive;
use std::sync::Arc;
use thiserror::Error;

/// Statuses routed to `SUCCESS`.
pub const SUCCESS_STATUSES: RangeInclusive<u16> = 200..=299;

/// Errors that make a response impossible to correlate.
///
/// These indicate a wiring mistake between configuration and transport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationError {
    /// The echoed request has no string `type`
    #[error("Response does not echo a request type")]
    MissingRequestType,

    /// No config owns the echoed type
    #[error("No action config for response type {0}")]
    UnknownActionType(ActionType),

    /// The response envelope could not be read
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The success or failure creator failed
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// A transport response: `{status, request, ...fields}`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Response {
    /// HTTP status, `0` when no response was received
    pub status: u16,
    /// The echoed request record
    pub request: Map<String, Value>,
    /// Everything else, e.g. `data` or `message`
    pub fields: Map<String, Value>,
}

impl Response {
    /// A response with no fields.
    #[must_use]
    pub fn new(status: u16, request: Map<String, Value>) -> Self {
        Self {
            status,
            request,
            fields: Map::new(),
        }
    }

    /// Builder-style field insert.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// The echoed request type.
    #[must_use]
    pub fn request_type(&self) -> Option<&str> {
        self.request.get("type").and_then(Value::as_str)
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        SUCCESS_STATUSES.contains(&self.status)
    }

    /// Encode into `{status, request, ...fields}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut out = self.fields.clone();
        out.insert("status".to_string(), Value::from(self.status));
        out.insert("request".to_string(), Value::Object(self.request.clone()));
        Value::Object(out)
    }

    /// Decode from `{status, request, ...fields}`.
    ///
    /// # Errors
    ///
    /// [`CorrelationError::MalformedResponse`] if the value is not an object, or
    /// `status` is not a number in `0..=65535`, or `request` is not an object.
    pub fn from_value(value: Value) -> Result<Self, CorrelationError> {
        let Value::Object(mut fields) = value else {
            return Err(CorrelationError::MalformedResponse(format!(
                "expected an object, got {}",
                json_kind(&value)
            )));
        };
        let status = fields
            .remove("status")
            .and_then(|status| status.as_u64())
            .and_then(|status| u16::try_from(status).ok())
            .ok_or_else(|| CorrelationError::MalformedResponse("missing numeric status".into()))?;
        let request = match fields.remove("request") {
            Some(Value::Object(request)) => request,
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                return Err(CorrelationError::MalformedResponse(format!(
                    "request must be an object, got {}",
                    json_kind(&other)
                )));
            },
        };
        Ok(Self {
            status,
            request,
            fields,
        })
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Response {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::from_value(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

/// Map one response to its `SUCCESS` or `FAILURE` action.
///
/// Creators run without scope; the echoed request already carries it.
///
/// # Errors
///
/// - [`CorrelationError::MissingRequestType`] if the response echoes no type
/// - [`CorrelationError::UnknownActionType`] if no config owns that type
/// - [`CorrelationError::Action`] if a configured body spec rejects the body
pub fn correlate(response: &Response, lookup: &ActionConfigLookup) -> Result<Action, CorrelationError> {
    let ty = response
        .request_type()
        .ok_or(CorrelationError::MissingRequestType)?;
    let config = lookup
        .get(ty)
        .ok_or_else(|| CorrelationError::UnknownActionType(ActionType::new(ty)))?;

    let (phase, body) = if response.is_success() {
        (Phase::Success, Value::Object(response.fields.clone()))
    } else {
        (Phase::Failure, response.to_value())
    };
    tracing::debug!(action_type = ty, status = response.status, phase = %phase, "Correlated response");

    Ok(creator(
        &config.action_type(phase),
        config.ret.spec(phase),
        &Scope::new(),
        body,
    )?)
}

/// Correlate a response stream against the latest config snapshot.
pub fn success_failure_http_intent<SR, SC>(
    responses: SR,
    configs: SC,
    gate: StartupGate,
) -> BoxStream<'static, Result<Action, CorrelationError>>
where
    SR: Stream<Item = Response> + Send + 'static,
    SC: Stream<Item = Arc<ActionConfigLookup>> + Send + 'static,
{
    with_latest(responses, configs, gate)
        .map(|(response, lookup)| correlate(&response, &lookup))
        .boxed()
}
