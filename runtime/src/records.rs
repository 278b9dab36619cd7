//! The records orchestrator.
//!
//! [`cycle_records`] joins the action stream and the response stream with the
//! latest `(configuration, lookup)` snapshot and routes every item:
//!
//! - request actions matching a [`Route`] become [`Sink::Http`] wire requests
//! - responses are correlated into [`Sink::Action`] success/failure actions
//!
//! Everything else is dropped.
//!
//! The per-verb stream forms in `record_relay_core`
//! ([`fetch_record_action_intent`](record_relay_core::intent::fetch_record_action_intent),
//! [`update_record_action_intent`](record_relay_core::intent::update_record_action_intent),
//! [`success_failure_http_intent`](record_relay_core::correlate::success_failure_http_intent))
//! are the standalone API for callers that wire one verb at a time. The
//! orchestrator runs the same per-item steps ([`match_action`], the intent
//! builders, the interpreters and [`correlate`]) under a single snapshot join, so
//! it can check the driver against the configuration the action was routed with.

use crate::config::RecordsConfig;
use crate::error::RecordsError;
use crate::metrics::{PipelineMetrics, ResponseMetrics};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use record_relay_core::action::Action;
use record_relay_core::combinators::{StartupGate, combine_latest, with_latest};
use record_relay_core::config::ActionConfigLookup;
use record_relay_core::correlate::{Response, correlate};
use record_relay_core::intent::{
    ActionMatcher, Intent, MatchedAction, fetch_intent, match_action, update_intent,
};
use record_relay_core::interpret::{
    ApiConfig, InterpretError, WireRequest, fetch_record_http_interpret,
    update_record_http_interpret,
};
use std::sync::Arc;

/// Inputs of the orchestrator.
pub struct RecordsSources {
    /// Application configuration snapshots
    pub config: BoxStream<'static, Arc<RecordsConfig>>,
    /// Action config lookup snapshots
    pub action_config: BoxStream<'static, Arc<ActionConfigLookup>>,
    /// Application actions
    pub actions: BoxStream<'static, Action>,
    /// Transport responses
    pub responses: BoxStream<'static, Response>,
    /// Startup ordering policy
    pub gate: StartupGate,
}

impl RecordsSources {
    /// Sources with a single, fixed configuration and lookup.
    #[must_use]
    pub fn fixed(
        source: SourceConfig,
        actions: BoxStream<'static, Action>,
        responses: BoxStream<'static, Response>,
    ) -> Self {
        Self {
            gate: source.config.gate,
            config: stream::iter([Arc::new(source.config)]).boxed(),
            action_config: stream::iter([Arc::new(source.action_config)]).boxed(),
            actions,
            responses,
        }
    }
}

/// A static `(configuration, lookup)` pair, e.g. contributed by one feature area.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceConfig {
    /// Application configuration
    pub config: RecordsConfig,
    /// Action config lookup
    pub action_config: ActionConfigLookup,
}

impl SourceConfig {
    /// Configuration from `other` replaces this one; lookups are shallow-unioned
    /// with `other` winning on overlapping types.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            config: other.config,
            action_config: self.action_config.merge(other.action_config),
        }
    }
}

/// Fold [`SourceConfig::merge`] over `sources`, later sources winning.
#[must_use]
pub fn merge_sources<I>(sources: I) -> Option<SourceConfig>
where
    I: IntoIterator<Item = SourceConfig>,
{
    sources.into_iter().reduce(SourceConfig::merge)
}

/// What the orchestrator emits.
#[derive(Clone, Debug, PartialEq)]
pub enum Sink {
    /// A request for the transport
    Http(WireRequest),
    /// A success or failure action for the application
    Action(Action),
}

/// One row of the routing table: which requests it takes and how they are
/// turned into wire requests.
#[derive(Clone, Debug)]
pub struct Route {
    /// Route name for logs
    pub name: &'static str,
    /// Which configs the route accepts
    pub matcher: ActionMatcher,
    /// Matched action → intent
    pub intent: fn(&MatchedAction) -> Intent,
    /// Intent → wire request
    pub interpret: fn(&ApiConfig, &Intent) -> Result<WireRequest, InterpretError>,
}

/// The routing table: `FETCH` requests and patch verb requests.
#[must_use]
pub fn routes() -> Vec<Route> {
    vec![
        Route {
            name: "fetch",
            matcher: ActionMatcher::fetch_requests(),
            intent: fetch_intent,
            interpret: fetch_record_http_interpret,
        },
        Route {
            name: "update",
            matcher: ActionMatcher::patch_requests(),
            intent: update_intent,
            interpret: update_record_http_interpret,
        },
    ]
}

/// Route one action against a snapshot.
///
/// Returns `Ok(None)` for actions no route takes.
///
/// # Errors
///
/// - [`RecordsError::UnsupportedDriver`] if a routed action meets a non-HTTP driver
/// - [`RecordsError::Interpret`] if the interpreter rejects the intent
pub fn route_action(
    action: Action,
    config: &RecordsConfig,
    lookup: &ActionConfigLookup,
    routes: &[Route],
) -> Result<Option<WireRequest>, RecordsError> {
    let Some(route) = lookup
        .get(action.action_type.as_str())
        .and_then(|entry| routes.iter().find(|route| route.matcher.matches(entry)))
    else {
        return Ok(None);
    };
    if !config.uses_http_driver() {
        return Err(RecordsError::UnsupportedDriver(config.cycle.drivers.api.clone()));
    }

    let Some(matched) = match_action(action, lookup, &route.matcher) else {
        return Ok(None);
    };
    let intent = (route.intent)(&matched);
    let request = (route.interpret)(&config.api, &intent)?;
    tracing::debug!(route = route.name, action_type = %request.action_type, url = %request.url, "Interpreted request");
    Ok(Some(request))
}

#[derive(Clone)]
struct Snapshot {
    config: Arc<RecordsConfig>,
    lookup: Arc<ActionConfigLookup>,
}

enum Input {
    Action(Action),
    Response(Response),
}

fn step(input: Input, snapshot: &Snapshot, routes: &[Route]) -> Option<Result<Sink, RecordsError>> {
    match input {
        Input::Action(action) => {
            match route_action(action, &snapshot.config, &snapshot.lookup, routes) {
                Ok(Some(request)) => {
                    PipelineMetrics::record_interpreted(request.method.as_str());
                    Some(Ok(Sink::Http(request)))
                },
                Ok(None) => {
                    PipelineMetrics::record_dropped();
                    None
                },
                Err(e) => Some(Err(e)),
            }
        },
        Input::Response(response) => {
            if response.is_success() {
                ResponseMetrics::record_success();
            } else {
                ResponseMetrics::record_failure();
            }
            Some(
                correlate(&response, &snapshot.lookup)
                    .map(Sink::Action)
                    .map_err(RecordsError::from),
            )
        },
    }
}

/// Wire actions and responses through the intent filters, interpreters and
/// correlator.
///
/// The output ends when both the action and the response streams end. Errors are
/// fatal: callers should stop at the first `Err`.
pub fn cycle_records(sources: RecordsSources) -> BoxStream<'static, Result<Sink, RecordsError>> {
    let RecordsSources {
        config,
        action_config,
        actions,
        responses,
        gate,
    } = sources;

    let snapshots = combine_latest(config, action_config)
        .map(|(config, lookup)| Snapshot { config, lookup });
    let inputs = stream::select(actions.map(Input::Action), responses.map(Input::Response));
    let routes = routes();

    with_latest(inputs, snapshots, gate)
        .filter_map(move |(input, snapshot)| future::ready(step(input, &snapshot, &routes)))
        .boxed()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use record_relay_core::config::{ActionConfig, make_action_config_lookup};
    use record_relay_core::correlate::success_failure_http_intent;
    use record_relay_core::intent::{fetch_record_action_intent, update_record_action_intent};
    use record_relay_core::naming::Verb;
    use serde_json::json;

    fn source() -> SourceConfig {
        SourceConfig {
            config: RecordsConfig::default(),
            action_config: make_action_config_lookup(vec![
                ActionConfig::new("sample", ["user"], "cities", Verb::Fetch),
                ActionConfig::new("sample", ["user"], "cities", Verb::Add),
            ]),
        }
    }

    #[test]
    fn routes_fetch_and_patch_requests() {
        let source = source();
        let routes = routes();
        let fetch = route_action(
            Action::new("sample/cities/FETCH_REQUEST", json!({"name": "Paris"})),
            &source.config,
            &source.action_config,
            &routes,
        )
        .unwrap()
        .unwrap();
        assert_eq!(fetch.url, "http://localhost:8080/api/cities");

        let add = route_action(
            Action::new("sample/cities/ADD_REQUEST", json!([{"name": "Paris"}])),
            &source.config,
            &source.action_config,
            &routes,
        )
        .unwrap()
        .unwrap();
        assert_eq!(add.url, "http://localhost:8080/api");

        let success = route_action(
            Action::new("sample/cities/ADD_SUCCESS", json!({})),
            &source.config,
            &source.action_config,
            &routes,
        )
        .unwrap();
        assert!(success.is_none());
    }

    #[test]
    fn unsupported_driver_is_an_error() {
        let mut source = source();
        source.config.cycle.drivers.api = "WEBSOCKET".into();
        let err = route_action(
            Action::new("sample/cities/FETCH_REQUEST", json!({})),
            &source.config,
            &source.action_config,
            &routes(),
        )
        .unwrap_err();
        assert!(matches!(err, RecordsError::UnsupportedDriver(driver) if driver == "WEBSOCKET"));
    }

    #[test]
    fn merged_sources_union_lookups() {
        let other = SourceConfig {
            config: RecordsConfig {
                domain: "example.org".into(),
                ..RecordsConfig::default()
            },
            action_config: make_action_config_lookup(vec![ActionConfig::new(
                "foo",
                ["user"],
                "bar",
                Verb::Fetch,
            )]),
        };
        let merged = merge_sources([source(), other]).unwrap();
        assert_eq!(merged.config.domain, "example.org");
        assert_eq!(merged.action_config.len(), 9);
        assert!(merge_sources(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn cycle_emits_requests_and_actions() {
        let response = Response::from_value(json!({
            "status": 200,
            "request": {"type": "sample/cities/FETCH_REQUEST"},
            "data": [],
        }))
        .unwrap();
        let sinks: Vec<_> = cycle_records(RecordsSources::fixed(
            source(),
            stream::iter([Action::new("sample/cities/FETCH_REQUEST", json!({}))]).boxed(),
            stream::iter([response]).boxed(),
        ))
        .collect()
        .await;

        assert_eq!(sinks.len(), 2);
        assert!(sinks.iter().any(|sink| matches!(sink, Ok(Sink::Http(_)))));
        assert!(sinks.iter().any(|sink| matches!(
            sink,
            Ok(Sink::Action(action)) if action.action_type.as_str() == "sample/cities/FETCH_SUCCESS"
        )));
    }

    #[tokio::test]
    async fn cycle_agrees_with_the_per_verb_streams() {
        let actions = vec![
            Action::new("sample/cities/FETCH_REQUEST", json!({"name": "Paris"})),
            Action::new("sample/cities/ADD_REQUEST", json!([{"name": "Paris", "user": "123"}])),
            Action::new("sample/cities/ADD_SUCCESS", json!({})),
        ];
        let responses = vec![
            Response::from_value(json!({
                "status": 200,
                "request": {"type": "sample/cities/FETCH_REQUEST"},
                "data": [],
            }))
            .unwrap(),
            Response::from_value(json!({
                "status": 500,
                "request": {"type": "sample/cities/ADD_REQUEST"},
            }))
            .unwrap(),
        ];
        let source = source();
        let lookup = Arc::new(source.action_config.clone());
        let api = source.config.api.clone();

        let fetches: Vec<_> = fetch_record_action_intent(
            stream::iter(actions.clone()),
            stream::iter([Arc::clone(&lookup)]),
            StartupGate::Drop,
        )
        .map(|intent| fetch_record_http_interpret(&api, &intent).unwrap())
        .collect()
        .await;
        let updates: Vec<_> = update_record_action_intent(
            stream::iter(actions.clone()),
            stream::iter([Arc::clone(&lookup)]),
            StartupGate::Drop,
        )
        .map(|intent| update_record_http_interpret(&api, &intent).unwrap())
        .collect()
        .await;
        let correlated: Vec<_> = success_failure_http_intent(
            stream::iter(responses.clone()),
            stream::iter([lookup]),
            StartupGate::Drop,
        )
        .map(Result::unwrap)
        .collect()
        .await;

        let sinks: Vec<_> = cycle_records(RecordsSources::fixed(
            source,
            stream::iter(actions).boxed(),
            stream::iter(responses).boxed(),
        ))
        .map(Result::unwrap)
        .collect()
        .await;

        let requests: Vec<_> = sinks
            .iter()
            .filter_map(|sink| match sink {
                Sink::Http(request) => Some(request.clone()),
                Sink::Action(_) => None,
            })
            .collect();
        let emitted: Vec<_> = sinks
            .iter()
            .filter_map(|sink| match sink {
                Sink::Action(action) => Some(action.clone()),
                Sink::Http(_) => None,
            })
            .collect();

        assert_eq!(requests, [fetches, updates].concat());
        assert_eq!(emitted, correlated);
    }
}
