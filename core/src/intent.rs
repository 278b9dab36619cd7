//! Action intent filters.
//!
//! The shared action stream is joined with the latest [`ActionConfigLookup`]
//! snapshot; each action resolves its config by type and is kept only if every
//! [`Criterion`] of an [`ActionMatcher`] holds. Kept actions are projected into
//! [`Intent`]s for the HTTP interpreters.
//!
//! The `*_record_action_intent` stream forms stand alone, one verb per stream.
//! The runtime orchestrator calls [`match_action`] and the intent builders per
//! item under its own snapshot join instead.

use crate::action::Action;
use crate::combinators::{StartupGate, with_latest};
use crate::config::{ActionConfigLookup, PhasedActionConfig};
use crate::interpret::Category;
use crate::naming::{ActionType, Phase, Verb};
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;

/// One structured condition on a resolved config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Criterion {
    /// The config's verb equals this one
    VerbIs(Verb),
    /// The config's verb is one of these
    VerbIn(Vec<Verb>),
    /// The looked-up phase equals this one
    PhaseIs(Phase),
}

impl Criterion {
    /// Evaluate against a resolved config.
    #[must_use]
    pub fn matches(&self, config: &PhasedActionConfig) -> bool {
        match self {
            Self::VerbIs(verb) => config.verb == *verb,
            Self::VerbIn(verbs) => verbs.contains(&config.verb),
            Self::PhaseIs(phase) => config.phase() == *phase,
        }
    }
}

/// A conjunction of [`Criterion`]s.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionMatcher {
    criteria: Vec<Criterion>,
}

impl ActionMatcher {
    /// Match when every criterion holds.
    #[must_use]
    pub const fn new(criteria: Vec<Criterion>) -> Self {
        Self { criteria }
    }

    /// `FETCH` requests.
    #[must_use]
    pub fn fetch_requests() -> Self {
        Self::new(vec![
            Criterion::VerbIs(Verb::Fetch),
            Criterion::PhaseIs(Phase::Request),
        ])
    }

    /// Requests of any patch verb.
    #[must_use]
    pub fn patch_requests() -> Self {
        Self::new(vec![
            Criterion::VerbIn(Verb::PATCH.to_vec()),
            Criterion::PhaseIs(Phase::Request),
        ])
    }

    /// `SELECT` requests.
    #[must_use]
    pub fn select_requests() -> Self {
        Self::new(vec![
            Criterion::VerbIs(Verb::Select),
            Criterion::PhaseIs(Phase::Request),
        ])
    }

    /// Whether every criterion holds for `config`.
    #[must_use]
    pub fn matches(&self, config: &PhasedActionConfig) -> bool {
        self.criteria.iter().all(|criterion| criterion.matches(config))
    }
}

/// An action together with the config its type resolved to.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchedAction {
    /// The action
    pub action: Action,
    /// Its config and phase
    pub config: PhasedActionConfig,
}

/// Resolve `action` in `lookup` and keep it if `matcher` accepts the config.
///
/// An action whose type has no entry is never matched.
#[must_use]
pub fn match_action(
    action: Action,
    lookup: &ActionConfigLookup,
    matcher: &ActionMatcher,
) -> Option<MatchedAction> {
    let config = lookup.get(action.action_type.as_str())?;
    matcher.matches(config).then(|| MatchedAction {
        config: config.clone(),
        action,
    })
}

/// Filter an action stream against the latest config snapshot.
pub fn action_filter<SA, SC>(
    actions: SA,
    configs: SC,
    matcher: ActionMatcher,
    gate: StartupGate,
) -> BoxStream<'static, MatchedAction>
where
    SA: Stream<Item = Action> + Send + 'static,
    SC: Stream<Item = Arc<ActionConfigLookup>> + Send + 'static,
{
    with_latest(actions, configs, gate)
        .filter_map(move |(action, lookup)| {
            let matched = match_action(action, &lookup, &matcher);
            async move { matched }
        })
        .boxed()
}

/// What an intent carries to its interpreter.
#[derive(Clone, Debug, PartialEq)]
pub enum IntentPayload {
    /// Fetch and select filters
    Filters(Value),
    /// Patch value
    Value(Value),
}

/// A matched action normalized for the HTTP interpreters.
#[derive(Clone, Debug, PartialEq)]
pub struct Intent {
    /// `/{model}`
    pub path: String,
    /// Config verb
    pub verb: Verb,
    /// Type of the request action
    pub action_type: ActionType,
    /// Channel the response is expected on
    pub category: Category,
    /// Action minus its type
    pub payload: IntentPayload,
}

fn intent(matched: &MatchedAction, payload: IntentPayload) -> Intent {
    Intent {
        path: format!("/{}", matched.config.model),
        verb: matched.config.verb,
        action_type: matched.action.action_type.clone(),
        category: matched.config.category.clone(),
        payload,
    }
}

/// Fetch intent: the action minus its type becomes the filters.
#[must_use]
pub fn fetch_intent(matched: &MatchedAction) -> Intent {
    intent(matched, IntentPayload::Filters(matched.action.payload().clone()))
}

/// Patch intent: the action minus its type becomes the value.
#[must_use]
pub fn update_intent(matched: &MatchedAction) -> Intent {
    intent(matched, IntentPayload::Value(matched.action.payload().clone()))
}

/// Select intent: like a fetch, the action minus its type becomes the filters.
#[must_use]
pub fn select_intent(matched: &MatchedAction) -> Intent {
    intent(matched, IntentPayload::Filters(matched.action.payload().clone()))
}

/// `FETCH`/`REQUEST` actions as fetch intents.
pub fn fetch_record_action_intent<SA, SC>(
    actions: SA,
    configs: SC,
    gate: StartupGate,
) -> BoxStream<'static, Intent>
where
    SA: Stream<Item = Action> + Send + 'static,
    SC: Stream<Item = Arc<ActionConfigLookup>> + Send + 'static,
{
    action_filter(actions, configs, ActionMatcher::fetch_requests(), gate)
        .map(|matched| fetch_intent(&matched))
        .boxed()
}

/// Patch verb `REQUEST` actions as update intents.
pub fn update_record_action_intent<SA, SC>(
    actions: SA,
    configs: SC,
    gate: StartupGate,
) -> BoxStream<'static, Intent>
where
    SA: Stream<Item = Action> + Send + 'static,
    SC: Stream<Item = Arc<ActionConfigLookup>> + Send + 'static,
{
    action_filter(actions, configs, ActionMatcher::patch_requests(), gate)
        .map(|matched| update_intent(&matched))
        .boxed()
}

/// `SELECT`/`REQUEST` actions as select intents.
pub fn select_record_action_intent<SA, SC>(
    actions: SA,
    configs: SC,
    gate: StartupGate,
) -> BoxStream<'static, Intent>
where
    SA: Stream<Item = Action> + Send + 'static,
    SC: Stream<Item = Arc<ActionConfigLookup>> + Send + 'static,
{
    action_filter(actions, configs, ActionMatcher::select_requests(), gate)
        .map(|matched| select_intent(&matched))
        .boxed()
}
