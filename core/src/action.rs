//! Actions and the creators that stamp them.
//!
//! An [`Action`] is an [`ActionType`] plus a JSON body. Creators are built per
//! [`ActionConfig`] and phase; each one resolves its [`BodySpec`] once and applies it
//! to `(scope, payload)` on every call.

use crate::config::{ActionConfig, BodySpec, PhaseBodies};
use crate::naming::{ActionType, Phase, Verb, action_name, action_type};
use crate::scope::Scope;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Key of the action type field in the JSON form of an action.
pub const TYPE_KEY: &str = "type";

/// Key carrying a body that cannot be spread in the JSON form of an action.
pub const PAYLOAD_KEY: &str = "payload";

/// Errors raised while creating or decoding actions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    /// An entity claims a scope value other than the asserted one
    #[error("Scope mismatch on '{key}': entity has {found}, scope asserts {expected}")]
    ScopeMismatch {
        /// Scope key
        key: String,
        /// Value asserted by the scope
        expected: Value,
        /// Value carried by the entity
        found: Value,
    },

    /// The body spec cannot merge scope into this payload
    #[error("{action_type} expects an object payload, got {found}")]
    PayloadNotObject {
        /// Action being created
        action_type: ActionType,
        /// JSON kind of the rejected payload
        found: &'static str,
    },

    /// JSON action without a string `type`
    #[error("Action has no string 'type' field")]
    MissingType,

    /// JSON action that is not an object
    #[error("Action must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// No creator registered under this name
    #[error("Unknown action creator: {0}")]
    UnknownCreator(String),

    /// A custom body function failed
    #[error("Body function failed: {0}")]
    Custom(String),
}

/// A typed application action.
///
/// The JSON form is `{type, ...body}` when the body is an object whose keys
/// cannot be confused with the envelope, and `{type, payload}` otherwise. An
/// object body is wrapped when it has a `type` key or is exactly `{payload}`.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    /// Correlation key
    pub action_type: ActionType,
    /// Everything except the type
    pub body: Value,
}

impl Action {
    /// Create an action.
    #[must_use]
    pub fn new(action_type: impl Into<ActionType>, body: Value) -> Self {
        Self {
            action_type: action_type.into(),
            body,
        }
    }

    /// The action minus its type.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.body
    }

    /// Encode into the JSON form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert(
            TYPE_KEY.to_string(),
            Value::String(self.action_type.as_str().to_string()),
        );
        match &self.body {
            Value::Object(body) if !is_envelope_like(body) => {
                out.extend(body.iter().map(|(k, v)| (k.clone(), v.clone())));
            },
            other => {
                out.insert(PAYLOAD_KEY.to_string(), other.clone());
            },
        }
        Value::Object(out)
    }

    /// Decode from the JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::NotAnObject`] or [`ActionError::MissingType`].
    pub fn from_value(value: Value) -> Result<Self, ActionError> {
        let Value::Object(mut map) = value else {
            return Err(ActionError::NotAnObject(json_kind(&value)));
        };
        let Some(Value::String(ty)) = map.remove(TYPE_KEY) else {
            return Err(ActionError::MissingType);
        };
        let body = if map.len() == 1 && map.contains_key(PAYLOAD_KEY) {
            map.remove(PAYLOAD_KEY).unwrap_or(Value::Null)
        } else {
            Value::Object(map)
        };
        Ok(Self::new(ty, body))
    }
}

/// Object bodies that would not survive being spread next to `type`.
fn is_envelope_like(body: &Map<String, Value>) -> bool {
    body.contains_key(TYPE_KEY) || (body.len() == 1 && body.contains_key(PAYLOAD_KEY))
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::from_value(Value::deserialize(deserializer)?).map_err(D::Error::custom)
    }
}

/// Name of a JSON value's kind, for error messages.
pub(crate) const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Stamp `payload` with `action_type`, building the body per `ret`.
///
/// # Errors
///
/// - [`ActionError::PayloadNotObject`] when `Merge`/`Keyed` receive a non-object payload
/// - [`ActionError::ScopeMismatch`] when `ScopedEntities` finds an entity with a
///   conflicting scope value
/// - whatever a `Custom` body function returns
pub fn creator(
    action_type: &ActionType,
    ret: &BodySpec,
    scope: &Scope,
    payload: Value,
) -> Result<Action, ActionError> {
    let body = match ret {
        BodySpec::Merge => Value::Object(merge_payload(action_type, scope, payload)?),
        BodySpec::Keyed(key) => {
            let mut body = Map::new();
            body.insert(
                key.clone(),
                Value::Object(merge_payload(action_type, scope, payload)?),
            );
            Value::Object(body)
        },
        BodySpec::Custom(f) => f(scope, payload)?,
        BodySpec::Template(template) => Value::Object(scope.merged_under(template)),
        BodySpec::ScopedEntities => scoped_entities(scope, payload)?,
        BodySpec::Passthrough => payload,
    };
    Ok(Action::new(action_type.clone(), body))
}

fn merge_payload(
    action_type: &ActionType,
    scope: &Scope,
    payload: Value,
) -> Result<Map<String, Value>, ActionError> {
    match payload {
        Value::Object(object) => Ok(scope.merged_under(&object)),
        Value::Null => Ok(scope.as_map().clone()),
        other => Err(ActionError::PayloadNotObject {
            action_type: action_type.clone(),
            found: json_kind(&other),
        }),
    }
}

/// Scope the entities of a payload through [`scope_entity`].
///
/// An array is a list of entities. An object whose values are all objects is a
/// keyed collection of entities; any other object (filters, a single record) is
/// one entity. Other payloads are returned as they are.
fn scoped_entities(scope: &Scope, payload: Value) -> Result<Value, ActionError> {
    match payload {
        Value::Array(items) => items
            .into_iter()
            .map(|item| scope_entity(scope, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(entries) if is_entity_collection(&entries) => entries
            .into_iter()
            .map(|(key, item)| scope_entity(scope, item).map(|item| (key, item)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        entity @ Value::Object(_) => scope_entity(scope, entity),
        other => Ok(other),
    }
}

fn is_entity_collection(entries: &Map<String, Value>) -> bool {
    !entries.is_empty() && entries.values().all(Value::is_object)
}

/// Merge the scope over one entity. An entity that already has a truthy `id`
/// must agree with the scope on every scope key it carries.
fn scope_entity(scope: &Scope, entity: Value) -> Result<Value, ActionError> {
    let Value::Object(entity) = entity else {
        return Ok(entity);
    };
    if entity.get("id").is_some_and(is_truthy) {
        for (key, expected) in scope.iter() {
            if let Some(found) = entity.get(key) {
                if found != expected {
                    return Err(ActionError::ScopeMismatch {
                        key: key.clone(),
                        expected: expected.clone(),
                        found: found.clone(),
                    });
                }
            }
        }
    }
    Ok(Value::Object(scope.merged_over(&entity)))
}

/// `null`, `false`, zero and the empty string do not count as an id.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n.abs() > 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// One phase's creator: a type, a phase and a resolved body spec.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionCreator {
    name: String,
    action_type: ActionType,
    phase: Phase,
    spec: BodySpec,
}

impl ActionCreator {
    /// Action name this creator is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type stamped on every created action.
    #[must_use]
    pub const fn action_type(&self) -> &ActionType {
        &self.action_type
    }

    /// Phase of the created actions.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Create an action.
    ///
    /// # Errors
    ///
    /// See [`creator`].
    pub fn create(&self, scope: &Scope, payload: Value) -> Result<Action, ActionError> {
        creator(&self.action_type, &self.spec, scope, payload)
    }
}

/// The three unbound creators of one `(root, model, verb)`, keyed by action name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AsyncActionCreators {
    creators: BTreeMap<String, ActionCreator>,
}

impl AsyncActionCreators {
    /// Look up a creator by action name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ActionCreator> {
        self.creators.get(name)
    }

    /// The creator of a phase.
    #[must_use]
    pub fn for_phase(&self, phase: Phase) -> Option<&ActionCreator> {
        self.creators.values().find(|c| c.phase == phase)
    }

    /// Create an action with the named creator.
    ///
    /// # Errors
    ///
    /// [`ActionError::UnknownCreator`] if `name` is not registered, otherwise see
    /// [`creator`].
    pub fn create(&self, name: &str, scope: &Scope, payload: Value) -> Result<Action, ActionError> {
        self.get(name)
            .ok_or_else(|| ActionError::UnknownCreator(name.to_string()))?
            .create(scope, payload)
    }

    /// Registered action names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.creators.keys().map(String::as_str)
    }

    /// Bind every creator to `scope`.
    #[must_use]
    pub fn bind(self, scope: &Scope) -> ActionCreators {
        ActionCreators {
            creators: self
                .creators
                .into_iter()
                .map(|(name, creator)| {
                    let bound = BoundActionCreator {
                        creator,
                        scope: scope.clone(),
                    };
                    (name, bound)
                })
                .collect(),
        }
    }
}

/// Build the request, success and failure creators for `(root, model, verb)`.
#[must_use]
pub fn async_action_creators(
    root: &str,
    model: &str,
    verb: Verb,
    rets: &PhaseBodies,
) -> AsyncActionCreators {
    let creators = Phase::ALL
        .into_iter()
        .map(|phase| {
            let name = action_name(model, verb, phase);
            let creator = ActionCreator {
                name: name.clone(),
                action_type: action_type(root, model, verb, phase),
                phase,
                spec: rets.spec(phase).clone(),
            };
            (name, creator)
        })
        .collect();
    AsyncActionCreators { creators }
}

/// A creator pre-applied with a scope; callers pass only the payload.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundActionCreator {
    creator: ActionCreator,
    scope: Scope,
}

impl BoundActionCreator {
    /// The unbound creator.
    #[must_use]
    pub const fn creator(&self) -> &ActionCreator {
        &self.creator
    }

    /// The scope bound into this creator.
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Create an action.
    ///
    /// # Errors
    ///
    /// See [`creator`].
    pub fn create(&self, payload: Value) -> Result<Action, ActionError> {
        self.creator.create(&self.scope, payload)
    }
}

/// Scope-bound creators keyed by action name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionCreators {
    creators: BTreeMap<String, BoundActionCreator>,
}

impl ActionCreators {
    /// Look up a creator by action name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoundActionCreator> {
        self.creators.get(name)
    }

    /// Create an action with the named creator.
    ///
    /// # Errors
    ///
    /// [`ActionError::UnknownCreator`] if `name` is not registered, otherwise see
    /// [`creator`].
    pub fn create(&self, name: &str, payload: Value) -> Result<Action, ActionError> {
        self.get(name)
            .ok_or_else(|| ActionError::UnknownCreator(name.to_string()))?
            .create(payload)
    }

    /// Registered action names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.creators.keys().map(String::as_str)
    }

    /// Number of creators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.creators.len()
    }

    /// Whether there are no creators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }

    /// Union with `other`; on overlapping names `other` wins.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.creators.extend(other.creators);
        self
    }
}

/// Creators for one config, bound to the scope keys it declares.
///
/// Keys the ambient scope does not carry are absent from the bound scope.
#[must_use]
pub fn make_action_creators_for_config(config: &ActionConfig, scope: &Scope) -> ActionCreators {
    async_action_creators(&config.root, &config.model, config.verb, &config.ret)
        .bind(&scope.project(&config.scope))
}

/// Creators for every config, each bound to its own projection of `scope`.
#[must_use]
pub fn make_action_creators(configs: &[ActionConfig], scope: &Scope) -> ActionCreators {
    configs
        .iter()
        .map(|config| make_action_creators_for_config(config, scope))
        .fold(ActionCreators::default(), ActionCreators::merge)
}

/// Name of the creator that produces `phase` actions for `config`.
#[must_use]
pub fn action_creator_name_for_phase(config: &ActionConfig, phase: Phase) -> String {
    config.action_name(phase)
}
