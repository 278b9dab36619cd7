//! Sample configuration, action configs and request/response bodies.
//!
//! The sample domain has one root, `sample`, with two models:
//!
//! | model              | verbs           | scope             |
//! |--------------------|-----------------|-------------------|
//! | `cities`           | `FETCH`, `ADD`  | `user`            |
//! | `projectLocations` | `ADD`, `REMOVE` | `user`, `project` |

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Fixtures only panic on broken fixtures

use record_relay_core::action::make_action_creators_for_config;
use record_relay_core::config::{ActionConfig, ActionConfigLookup, make_action_config_lookup};
use record_relay_core::correlate::Response;
use record_relay_core::interpret::{WirePayload, WireRequest};
use record_relay_core::naming::{Phase, Verb};
use record_relay_core::scope::Scope;
use record_relay_runtime::config::RecordsConfig;
use record_relay_runtime::records::{SourceConfig, route_action, routes};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Action root of the sample domain.
pub const ACTION_ROOT: &str = "sample";

/// Cities model.
pub const CITIES: &str = "cities";

/// Project locations model.
pub const PROJECT_LOCATIONS: &str = "projectLocations";

/// Minimal configuration: HTTP driver, API at `http://localhost:8080/api/`.
pub const SAMPLE_CONFIG_TOML: &str = r#"
domain = "localhost"

[cycle.drivers]
api = "HTTP"

[api]
protocol = "http"
host = "localhost"
port = 8080
root = "/api/"
"#;

/// [`SAMPLE_CONFIG_TOML`], parsed.
#[must_use]
pub fn sample_config() -> RecordsConfig {
    RecordsConfig::from_toml_str(SAMPLE_CONFIG_TOML).unwrap()
}

/// The four sample action configs.
#[must_use]
pub fn sample_action_configs() -> Vec<ActionConfig> {
    let user = ["user"];
    let project = ["user", "project"];
    vec![
        ActionConfig::new(ACTION_ROOT, user, CITIES, Verb::Fetch),
        ActionConfig::new(ACTION_ROOT, user, CITIES, Verb::Add),
        ActionConfig::new(ACTION_ROOT, project, PROJECT_LOCATIONS, Verb::Add),
        ActionConfig::new(ACTION_ROOT, project, PROJECT_LOCATIONS, Verb::Remove),
    ]
}

/// Lookup of [`sample_action_configs`].
#[must_use]
pub fn sample_lookup() -> ActionConfigLookup {
    make_action_config_lookup(sample_action_configs())
}

/// [`sample_config`] with [`sample_lookup`].
#[must_use]
pub fn sample_source() -> SourceConfig {
    SourceConfig {
        config: sample_config(),
        action_config: sample_lookup(),
    }
}

/// `{user: "123", project: "456"}`.
#[must_use]
pub fn scope_values() -> Scope {
    Scope::new().with("user", "123").with("project", "456")
}

/// Sample instances keyed by model.
#[must_use]
pub fn sample_objs() -> Map<String, Value> {
    let mut objs = Map::new();
    objs.insert(
        CITIES.to_string(),
        json!([
            {"id": 1, "name": "Paris"},
            {"id": 2, "name": "Oslo"},
        ]),
    );
    objs.insert(
        PROJECT_LOCATIONS.to_string(),
        json!([
            {"id": 10, "name": "Harbour"},
            {"id": 11, "name": "Old Town"},
        ]),
    );
    objs
}

/// The wire request `config`'s request action produces for `objs`.
///
/// `ADD` requests send `objs` without their ids.
#[must_use]
pub fn sample_request(
    records: &RecordsConfig,
    config: &ActionConfig,
    scope: &Scope,
    objs: &Value,
) -> WireRequest {
    let payload = if config.verb == Verb::Add {
        without_ids(objs)
    } else {
        objs.clone()
    };
    let action = make_action_creators_for_config(config, scope)
        .create(&config.action_name(Phase::Request), payload)
        .unwrap();
    let lookup = make_action_config_lookup([config.clone()]);
    route_action(action, records, &lookup, &routes()).unwrap().unwrap()
}

/// Fetch request body: `{request: {url, category, type, filters}}`.
#[must_use]
pub fn sample_fetch_request_body(
    records: &RecordsConfig,
    config: &ActionConfig,
    scope: &Scope,
    objs: &Value,
) -> Value {
    let request = sample_request(records, config, scope, objs);
    debug_assert!(matches!(request.payload, WirePayload::Filters(_)));
    request.to_json()
}

/// Patch request body: `{url, method, type, query: {op, path, value}, category}`.
#[must_use]
pub fn sample_patch_request_body(
    records: &RecordsConfig,
    config: &ActionConfig,
    scope: &Scope,
    objs: &Value,
) -> Value {
    let request = sample_request(records, config, scope, objs);
    debug_assert!(matches!(request.payload, WirePayload::Query(_)));
    request.to_json()
}

/// `200` answer to `request` carrying `objs` under `data`.
#[must_use]
pub fn sample_success_response(request: &WireRequest, objs: &Value) -> Response {
    Response::new(200, request.echo()).with_field("data", objs.clone())
}

/// `500 Internal Server Error` answer to `request`.
#[must_use]
pub fn sample_failure_response(request: &WireRequest) -> Response {
    Response::new(500, request.echo())
        .with_field("message", Value::String("Internal Server Error".to_string()))
}

/// Request, success and failure bodies for every config, keyed by
/// `{actionName}Body` (e.g. `fetchCitiesSuccessBody`).
#[must_use]
pub fn test_bodies(
    records: &RecordsConfig,
    configs: &[ActionConfig],
    scope: &Scope,
    objs: &Map<String, Value>,
) -> BTreeMap<String, Value> {
    let mut bodies = BTreeMap::new();
    for config in configs {
        let model_objs = objs.get(&config.model).cloned().unwrap_or(Value::Null);
        let request = sample_request(records, config, scope, &model_objs);
        let body_name = |phase| format!("{}Body", config.action_name(phase));

        bodies.insert(body_name(Phase::Request), request.to_json());
        bodies.insert(
            body_name(Phase::Success),
            sample_success_response(&request, &model_objs).to_value(),
        );
        bodies.insert(
            body_name(Phase::Failure),
            sample_failure_response(&request).to_value(),
        );
    }
    bodies
}

fn without_ids(objs: &Value) -> Value {
    let strip = |obj: &Value| match obj {
        Value::Object(fields) => {
            let mut fields = fields.clone();
            fields.remove("id");
            Value::Object(fields)
        },
        other => other.clone(),
    };
    match objs {
        Value::Array(items) => Value::Array(items.iter().map(strip).collect()),
        Value::Object(entries) => Value::Array(entries.values().map(strip).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_points_at_local_api() {
        let config = sample_config();
        assert!(config.uses_http_driver());
        assert_eq!(config.api.base_uri(), "http://localhost:8080/api");
    }

    #[test]
    fn add_requests_drop_ids_and_carry_scope() {
        let config = &sample_action_configs()[1];
        let body = sample_patch_request_body(
            &sample_config(),
            config,
            &scope_values(),
            &sample_objs()[CITIES],
        );
        assert_eq!(body["method"], json!("PATCH"));
        assert_eq!(body["query"]["op"], json!("add"));
        assert_eq!(body["query"]["path"], json!("/cities"));
        assert_eq!(
            body["query"]["value"],
            json!([{"name": "Paris", "user": "123"}, {"name": "Oslo", "user": "123"}])
        );
    }
}
