//! # Record Relay Core
//!
//! The action/request correlation engine.
//!
//! Callers declare *what concept, what verb, what scope* as an
//! [`ActionConfig`](config::ActionConfig); this crate derives everything else:
//! action types and names, action creators, request intents, wire requests and the
//! success/failure actions built from responses.
//!
//! ## Core Concepts
//!
//! - **Action Type**: `{root}/{model}/{VERB}_{PHASE}`, the correlation key of a request
//!   and its response
//! - **Scope**: identifying context (user, project) merged into request payloads
//! - **Lookup**: immutable `ActionType → (ActionConfig, Phase)` snapshot
//! - **Intent**: a matched request action normalized for an interpreter
//! - **Wire Request**: what the transport sends, echoing the originating type
//!
//! ## Data Flow
//!
//! ```text
//! actions ──► intent filters ──► interpreters ──► wire requests ──► transport
//!                  ▲                                                  │
//!              lookup snapshots                                       ▼
//!                  ▼                                               responses
//! actions ◄── correlator ◄────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use record_relay_core::prelude::*;
//! use serde_json::json;
//!
//! let config = ActionConfig::new("sample", ["user"], "cities", Verb::Fetch);
//! let lookup = make_action_config_lookup(vec![config.clone()]);
//!
//! let scope = Scope::new().with("user", "123").with("project", "456");
//! let creators = make_action_creators_for_config(&config, &scope);
//! let action = creators.create("fetchCitiesRequest", json!({"name": "Paris"})).unwrap();
//!
//! let matched = match_action(action, &lookup, &ActionMatcher::fetch_requests()).unwrap();
//! let request = fetch_record_http_interpret(&ApiConfig::default(), &fetch_intent(&matched)).unwrap();
//! assert_eq!(request.url, "http://localhost:8080/api/cities");
//! ```

pub mod action;
pub mod combinators;
pub mod config;
pub mod correlate;
pub mod intent;
pub mod interpret;
pub mod naming;
pub mod scope;

/// The types and functions most callers need.
pub mod prelude {
    pub use crate::action::{
        Action, ActionCreators, ActionError, AsyncActionCreators, action_creator_name_for_phase,
        async_action_creators, creator, make_action_creators, make_action_creators_for_config,
    };
    pub use crate::combinators::StartupGate;
    pub use crate::config::{
        ActionConfig, ActionConfigLookup, BodySpec, ConfigError, PhaseBodies, PhasedActionConfig,
        make_action_config_lookup, make_action_types_lookup, resolve_action_config,
    };
    pub use crate::correlate::{CorrelationError, Response, correlate, success_failure_http_intent};
    pub use crate::intent::{
        ActionMatcher, Criterion, Intent, IntentPayload, MatchedAction, action_filter,
        fetch_intent, fetch_record_action_intent, match_action, select_intent,
        select_record_action_intent, update_intent, update_record_action_intent,
    };
    pub use crate::interpret::{
        ApiConfig, Category, InterpretError, PatchQuery, WirePayload, WireRequest,
        fetch_record_http_interpret, update_record_http_interpret,
    };
    pub use crate::naming::{
        ActionType, HttpMethod, Phase, Verb, action_name, action_type, async_actions,
        async_actions_phase_keys,
    };
    pub use crate::scope::Scope;
}
