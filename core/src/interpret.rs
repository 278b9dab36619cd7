//! HTTP interpreters: intent + API configuration → wire request.
//!
//! Both interpreters are pure. A fetch intent becomes a GET-style request to
//! `{base}/{model}` carrying the action's filters; every patch verb becomes one
//! PATCH-shaped request to `{base}` whose JSON-Patch-like `query` holds the
//! `op`/`path`/`value` triple.

use crate::intent::{Intent, IntentPayload};
use crate::naming::{ActionType, HttpMethod, Verb};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::fmt;
use thiserror::Error;

/// Errors raised by the interpreters on intents they cannot describe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpretError {
    /// A fetch interpreter received an intent carrying a value
    #[error("Fetch interpreter needs filters, intent for {0} carries a value")]
    ExpectedFilters(ActionType),

    /// An update interpreter received an intent carrying filters
    #[error("Update interpreter needs a value, intent for {0} carries filters")]
    ExpectedValue(ActionType),

    /// An update interpreter received a non-patch verb
    #[error("Verb {verb} of {action_type} is not a patch verb")]
    NotAPatchVerb {
        /// Offending intent's type
        action_type: ActionType,
        /// Its verb
        verb: Verb,
    },
}

/// Transport channel responses are grouped by.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// The catch-all category.
    pub const ALL: &'static str = "all";

    /// Create a category.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The catch-all category every config uses by default.
    #[must_use]
    pub fn all() -> Self {
        Self(Self::ALL.to_string())
    }

    /// The category name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Where the API lives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// `http` or `https`
    pub protocol: String,
    /// Host name
    pub host: String,
    /// Port
    pub port: u16,
    /// Path prefix, e.g. `/api/`
    pub root: String,
}

impl ApiConfig {
    /// `{protocol}://{host}:{port}{root}` with any trailing `/` of the root removed.
    ///
    /// ```
    /// use record_relay_core::interpret::ApiConfig;
    ///
    /// let api = ApiConfig {
    ///     protocol: "http".into(),
    ///     host: "localhost".into(),
    ///     port: 8080,
    ///     root: "/api/".into(),
    /// };
    /// assert_eq!(api.base_uri(), "http://localhost:8080/api");
    /// ```
    #[must_use]
    pub fn base_uri(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.protocol,
            self.host,
            self.port,
            self.root.trim_end_matches('/')
        )
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 8080,
            root: "/api/".to_string(),
        }
    }
}

/// JSON-Patch-like mutation description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchQuery {
    /// Lower-case verb, e.g. `add`
    pub op: String,
    /// `/{model}`
    pub path: String,
    /// Scoped payload of the request action
    pub value: Value,
}

/// What a wire request carries besides its URL.
#[derive(Clone, Debug, PartialEq)]
pub enum WirePayload {
    /// Fetch filters
    Filters(Value),
    /// Patch description
    Query(PatchQuery),
}

/// Protocol-level request handed to the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct WireRequest {
    /// Absolute URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Response channel
    pub category: Category,
    /// Originating request action type, echoed back in the response
    pub action_type: ActionType,
    /// Filters or patch query
    pub payload: WirePayload,
}

impl WireRequest {
    /// The JSON form handed to the transport.
    ///
    /// Fetch: `{request: {url, category, type, filters}}`.
    /// Patch: `{url, method: "PATCH", type, query: {op, path, value}, category}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match &self.payload {
            WirePayload::Filters(filters) => json!({
                "request": {
                    "url": self.url,
                    "category": self.category,
                    "type": self.action_type,
                    "filters": filters,
                }
            }),
            WirePayload::Query(query) => json!({
                "url": self.url,
                "method": self.method.as_str(),
                "type": self.action_type,
                "query": query,
                "category": self.category,
            }),
        }
    }

    /// The request record a response echoes back: at least `{type, url, method}`.
    #[must_use]
    pub fn echo(&self) -> Map<String, Value> {
        let mut echo = Map::new();
        echo.insert("type".to_string(), Value::String(self.action_type.to_string()));
        echo.insert("url".to_string(), Value::String(self.url.clone()));
        echo.insert(
            "method".to_string(),
            Value::String(self.method.as_str().to_string()),
        );
        echo.insert(
            "category".to_string(),
            Value::String(self.category.to_string()),
        );
        match &self.payload {
            WirePayload::Filters(filters) => {
                echo.insert("filters".to_string(), filters.clone());
            },
            WirePayload::Query(query) => {
                echo.insert("query".to_string(), json!(query));
            },
        }
        echo
    }
}

impl Serialize for WireRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Turn a fetch intent into `{request: {url: base + path, category, type, filters}}`.
///
/// # Errors
///
/// [`InterpretError::ExpectedFilters`] if the intent carries a value.
pub fn fetch_record_http_interpret(
    api: &ApiConfig,
    intent: &Intent,
) -> Result<WireRequest, InterpretError> {
    let IntentPayload::Filters(filters) = &intent.payload else {
        return Err(InterpretError::ExpectedFilters(intent.action_type.clone()));
    };
    Ok(WireRequest {
        url: format!("{}{}", api.base_uri(), intent.path),
        method: HttpMethod::Get,
        category: intent.category.clone(),
        action_type: intent.action_type.clone(),
        payload: WirePayload::Filters(filters.clone()),
    })
}

/// Turn a patch intent into one PATCH request against the base URI.
///
/// # Errors
///
/// [`InterpretError::ExpectedValue`] if the intent carries filters,
/// [`InterpretError::NotAPatchVerb`] for `FETCH` or `TEST`.
pub fn update_record_http_interpret(
    api: &ApiConfig,
    intent: &Intent,
) -> Result<WireRequest, InterpretError> {
    let IntentPayload::Value(value) = &intent.payload else {
        return Err(InterpretError::ExpectedValue(intent.action_type.clone()));
    };
    if !intent.verb.is_patch() {
        return Err(InterpretError::NotAPatchVerb {
            action_type: intent.action_type.clone(),
            verb: intent.verb,
        });
    }
    Ok(WireRequest {
        url: api.base_uri(),
        method: HttpMethod::Patch,
        category: intent.category.clone(),
        action_type: intent.action_type.clone(),
        payload: WirePayload::Query(PatchQuery {
            op: intent.verb.patch_op().to_string(),
            path: intent.path.clone(),
            value: value.clone(),
        }),
    })
}
