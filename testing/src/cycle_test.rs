//! Given-When-Then harness for the records orchestrator.

#![allow(clippy::module_name_repetitions)] // CycleTest is the natural name

use futures::stream::{self, StreamExt};
use record_relay_core::action::Action;
use record_relay_core::correlate::Response;
use record_relay_core::interpret::WireRequest;
use record_relay_runtime::records::{RecordsSources, Sink, SourceConfig, cycle_records};
use record_relay_runtime::RecordsError;

/// Outputs of one orchestrator run.
pub type Outputs = [Result<Sink, RecordsError>];

type OutputAssertion = Box<dyn FnOnce(&Outputs)>;

/// Runs [`cycle_records`] over fixed inputs and checks its outputs.
///
/// Actions and responses are interleaved; assertions should not depend on the
/// relative order of requests and actions.
///
/// # Example
///
/// ```
/// use record_relay_core::action::Action;
/// use record_relay_testing::{CycleTest, fixtures};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// CycleTest::new()
///     .given_source(fixtures::sample_source())
///     .when_action(Action::new("sample/cities/FETCH_REQUEST", json!({"user": "123"})))
///     .then_requests(|requests| {
///         assert_eq!(requests.len(), 1);
///         assert_eq!(requests[0].url, "http://localhost:8080/api/cities");
///     })
///     .run()
///     .await;
/// # });
/// ```
pub struct CycleTest {
    source: Option<SourceConfig>,
    actions: Vec<Action>,
    responses: Vec<Response>,
    assertions: Vec<OutputAssertion>,
}

impl CycleTest {
    /// Create an empty test.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            source: None,
            actions: Vec::new(),
            responses: Vec::new(),
            assertions: Vec::new(),
        }
    }

    /// Set the configuration and lookup (Given)
    #[must_use]
    pub fn given_source(mut self, source: SourceConfig) -> Self {
        self.source = Some(source);
        self
    }

    /// Add an application action (When)
    #[must_use]
    pub fn when_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Add a transport response (When)
    #[must_use]
    pub fn when_response(mut self, response: Response) -> Self {
        self.responses.push(response);
        self
    }

    /// Add an assertion about every output, errors included (Then)
    #[must_use]
    pub fn then_outputs<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&Outputs) + 'static,
    {
        self.assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the emitted wire requests (Then)
    #[must_use]
    pub fn then_requests<F>(self, assertion: F) -> Self
    where
        F: FnOnce(&[WireRequest]) + 'static,
    {
        self.then_outputs(move |outputs| {
            let requests: Vec<WireRequest> = outputs
                .iter()
                .filter_map(|output| match output {
                    Ok(Sink::Http(request)) => Some(request.clone()),
                    _ => None,
                })
                .collect();
            assertion(&requests);
        })
    }

    /// Add an assertion about the emitted success/failure actions (Then)
    #[must_use]
    pub fn then_actions<F>(self, assertion: F) -> Self
    where
        F: FnOnce(&[Action]) + 'static,
    {
        self.then_outputs(move |outputs| {
            let actions: Vec<Action> = outputs
                .iter()
                .filter_map(|output| match output {
                    Ok(Sink::Action(action)) => Some(action.clone()),
                    _ => None,
                })
                .collect();
            assertion(&actions);
        })
    }

    /// Run the orchestrator to completion and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if no source is set, or if any assertion fails.
    #[allow(clippy::expect_used)] // Test code can use expect
    pub async fn run(self) {
        let source = self
            .source
            .expect("Source must be set with given_source()");

        let outputs: Vec<_> = cycle_records(RecordsSources::fixed(
            source,
            stream::iter(self.actions).boxed(),
            stream::iter(self.responses).boxed(),
        ))
        .collect()
        .await;

        for assertion in self.assertions {
            assertion(&outputs);
        }
    }
}

impl Default for CycleTest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use serde_json::json;

    #[tokio::test]
    async fn unrouted_actions_produce_nothing() {
        CycleTest::new()
            .given_source(fixtures::sample_source())
            .when_action(Action::new("sample/cities/FETCH_SUCCESS", json!({})))
            .when_action(Action::new("other/thing/FETCH_REQUEST", json!({})))
            .then_outputs(|outputs| assert!(outputs.is_empty()))
            .run()
            .await;
    }
}
