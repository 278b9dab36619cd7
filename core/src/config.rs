//! Declarative action configuration and the `configByType` lookup table.
//!
//! An [`ActionConfig`] names one `(root, model, verb)` triple, the scope keys its
//! payloads need, and how each phase builds its action body. A set of configs is
//! compiled once into an [`ActionConfigLookup`], an immutable snapshot keyed by
//! [`ActionType`] that the intent filters and the response correlator share.
//!
//! # Example
//!
//! ```
//! use record_relay_core::config::{ActionConfig, ActionConfigLookup};
//! use record_relay_core::naming::{Phase, Verb};
//!
//! let configs = vec![
//!     ActionConfig::new("sample", ["user"], "cities", Verb::Fetch),
//!     ActionConfig::new("sample", ["user"], "cities", Verb::Add),
//! ];
//! let lookup = ActionConfigLookup::try_from_configs(configs).unwrap();
//!
//! let phased = lookup.get("sample/cities/ADD_SUCCESS").unwrap();
//! assert_eq!(phased.verb, Verb::Add);
//! assert_eq!(phased.phase(), Phase::Success);
//! ```

use crate::action::ActionError;
use crate::interpret::Category;
use crate::naming::{
    ActionType, Phase, Verb, action_name, action_type, async_actions, async_actions_phase_keys,
};
use crate::scope::Scope;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building or checking action configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Two configs derive the same action type
    #[error("Duplicate action type: {0}")]
    DuplicateActionType(ActionType),

    /// A scope does not carry keys a config declares
    #[error("Scope for {model} {verb} is missing keys {keys:?}")]
    MissingScope {
        /// Model of the config
        model: String,
        /// Verb of the config
        verb: Verb,
        /// The absent scope keys
        keys: Vec<String>,
    },
}

/// Signature of a custom body builder: `(scope, payload) -> body`.
pub type BodyFn = Arc<dyn Fn(&Scope, Value) -> Result<Value, ActionError> + Send + Sync>;

/// How an action creator turns `(scope, payload)` into an action body.
///
/// Resolved once when the configuration is built; creators never re-inspect the
/// shape of their configuration per call.
#[derive(Clone)]
pub enum BodySpec {
    /// Merge the scope into an object payload (payload keys win)
    Merge,
    /// `{key: merge(scope, payload)}`
    Keyed(String),
    /// Delegate to a function of `(scope, payload)`
    Custom(BodyFn),
    /// The template merged over the scope; the payload is ignored
    Template(Map<String, Value>),
    /// Default request body: every entity of the payload merged with the scope,
    /// entities carrying an `id` are scope-checked first
    ScopedEntities,
    /// The payload unchanged; the scope is ignored
    Passthrough,
}

impl BodySpec {
    /// Wrap a closure as a [`BodySpec::Custom`].
    #[must_use]
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Scope, Value) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }
}

impl fmt::Debug for BodySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "BodySpec::Merge"),
            Self::Keyed(key) => f.debug_tuple("BodySpec::Keyed").field(key).finish(),
            Self::Custom(_) => write!(f, "BodySpec::Custom(<fn>)"),
            Self::Template(template) => {
                f.debug_tuple("BodySpec::Template").field(template).finish()
            },
            Self::ScopedEntities => write!(f, "BodySpec::ScopedEntities"),
            Self::Passthrough => write!(f, "BodySpec::Passthrough"),
        }
    }
}

impl PartialEq for BodySpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Merge, Self::Merge)
            | (Self::ScopedEntities, Self::ScopedEntities)
            | (Self::Passthrough, Self::Passthrough) => true,
            (Self::Keyed(a), Self::Keyed(b)) => a == b,
            (Self::Template(a), Self::Template(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Per-phase body specifications (the `ret` table).
///
/// Phases left unspecified build their body with [`BodySpec::Merge`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PhaseBodies {
    request: Option<BodySpec>,
    success: Option<BodySpec>,
    failure: Option<BodySpec>,
}

impl PhaseBodies {
    /// Every phase merges scope into its payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The default bodies: scoped entities for requests, pass-through responses.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            request: Some(BodySpec::ScopedEntities),
            success: Some(BodySpec::Passthrough),
            failure: Some(BodySpec::Passthrough),
        }
    }

    /// Override the spec of one phase.
    #[must_use]
    pub fn with(mut self, phase: Phase, spec: BodySpec) -> Self {
        *self.slot(phase) = Some(spec);
        self
    }

    /// The spec a phase builds its body with.
    #[must_use]
    pub fn spec(&self, phase: Phase) -> &BodySpec {
        const MERGE: &BodySpec = &BodySpec::Merge;
        let slot = match phase {
            Phase::Request => &self.request,
            Phase::Success => &self.success,
            Phase::Failure => &self.failure,
        };
        slot.as_ref().unwrap_or(MERGE)
    }

    fn slot(&mut self, phase: Phase) -> &mut Option<BodySpec> {
        match phase {
            Phase::Request => &mut self.request,
            Phase::Success => &mut self.success,
            Phase::Failure => &mut self.failure,
        }
    }
}

/// Configuration of one asynchronous `(root, model, verb)` operation.
///
/// Built once at configuration-load time and shared immutably afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionConfig {
    /// Root concept, e.g. `"sample"`; may contain `/`
    pub root: String,
    /// Model the action is about, e.g. `"cities"`
    pub model: String,
    /// Operation kind
    pub verb: Verb,
    /// Scope keys projected from the ambient scope into request payloads
    pub scope: Vec<String>,
    /// Body specification of each phase
    pub ret: PhaseBodies,
    /// Transport category responses to this action arrive on
    pub category: Category,
}

impl ActionConfig {
    /// Create a config with the standard phase bodies and the catch-all category.
    #[must_use]
    pub fn new<I, S>(root: impl Into<String>, scope: I, model: impl Into<String>, verb: Verb) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            model: model.into(),
            verb,
            scope: scope.into_iter().map(Into::into).collect(),
            ret: PhaseBodies::standard(),
            category: Category::all(),
        }
    }

    /// Replace the phase bodies.
    #[must_use]
    pub fn with_bodies(mut self, ret: PhaseBodies) -> Self {
        self.ret = ret;
        self
    }

    /// Route responses for this config through another transport category.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// The action type of one phase.
    #[must_use]
    pub fn action_type(&self, phase: Phase) -> ActionType {
        action_type(&self.root, &self.model, self.verb, phase)
    }

    /// The action creator name of one phase.
    #[must_use]
    pub fn action_name(&self, phase: Phase) -> String {
        action_name(&self.model, self.verb, phase)
    }

    /// All three action types of this config.
    #[must_use]
    pub fn phase_keys(&self) -> BTreeMap<Phase, ActionType> {
        async_actions_phase_keys(&self.root, &self.model, self.verb)
    }

    /// Check that `scope` carries every key this config declares.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingScope`] naming the absent keys.
    pub fn check_scope(&self, scope: &Scope) -> Result<(), ConfigError> {
        let keys = scope.missing(&self.scope);
        if keys.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingScope {
                model: self.model.clone(),
                verb: self.verb,
                keys,
            })
        }
    }
}

/// An [`ActionConfig`] together with the phase an action type selected.
///
/// Dereferences to the underlying config.
#[derive(Clone, Debug, PartialEq)]
pub struct PhasedActionConfig {
    config: Arc<ActionConfig>,
    phase: Phase,
}

impl PhasedActionConfig {
    /// Pair a shared config with a phase.
    #[must_use]
    pub const fn new(config: Arc<ActionConfig>, phase: Phase) -> Self {
        Self { config, phase }
    }

    /// The phase of the looked-up action type.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The shared config.
    #[must_use]
    pub const fn config(&self) -> &Arc<ActionConfig> {
        &self.config
    }
}

impl Deref for PhasedActionConfig {
    type Target = ActionConfig;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}

/// Immutable `ActionType → (ActionConfig, Phase)` table.
///
/// Snapshots are never mutated in place; composing feature areas produces a new
/// table via [`ActionConfigLookup::merge`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionConfigLookup {
    by_type: BTreeMap<ActionType, PhasedActionConfig>,
}

impl ActionConfigLookup {
    /// Build a table, letting a later config overwrite an earlier one that derives
    /// the same action type.
    #[must_use]
    pub fn from_configs<I>(configs: I) -> Self
    where
        I: IntoIterator<Item = ActionConfig>,
    {
        let mut by_type = BTreeMap::new();
        for config in configs {
            let config = Arc::new(config);
            for (phase, ty) in config.phase_keys() {
                let phased = PhasedActionConfig::new(Arc::clone(&config), phase);
                if by_type.insert(ty.clone(), phased).is_some() {
                    tracing::warn!(action_type = %ty, "Duplicate action type, later config wins");
                }
            }
        }
        Self { by_type }
    }

    /// Build a table, rejecting configs that derive an action type already present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateActionType`] for the first collision found.
    pub fn try_from_configs<I>(configs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ActionConfig>,
    {
        let mut by_type = BTreeMap::new();
        for config in configs {
            let config = Arc::new(config);
            for (phase, ty) in config.phase_keys() {
                if by_type.contains_key(&ty) {
                    return Err(ConfigError::DuplicateActionType(ty));
                }
                by_type.insert(ty, PhasedActionConfig::new(Arc::clone(&config), phase));
            }
        }
        Ok(Self { by_type })
    }

    /// Look up the config and phase of an action type.
    #[must_use]
    pub fn get(&self, action_type: &str) -> Option<&PhasedActionConfig> {
        self.by_type.get(action_type)
    }

    /// Whether the table knows `action_type`.
    #[must_use]
    pub fn contains(&self, action_type: &str) -> bool {
        self.by_type.contains_key(action_type)
    }

    /// Number of action types (three per config).
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Iterate over entries in action type order.
    pub fn iter(&self) -> impl Iterator<Item = (&ActionType, &PhasedActionConfig)> {
        self.by_type.iter()
    }

    /// All action types in the table.
    pub fn action_types(&self) -> impl Iterator<Item = &ActionType> {
        self.by_type.keys()
    }

    /// Every transport category some config routes responses through.
    #[must_use]
    pub fn categories(&self) -> BTreeSet<Category> {
        self.by_type
            .values()
            .map(|phased| phased.category.clone())
            .collect()
    }

    /// Shallow union of two tables; on overlapping types `other` wins.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.by_type.extend(other.by_type);
        self
    }
}

/// Build the `configByType` table for a config set (later duplicates win).
#[must_use]
pub fn make_action_config_lookup<I>(configs: I) -> ActionConfigLookup
where
    I: IntoIterator<Item = ActionConfig>,
{
    ActionConfigLookup::from_configs(configs)
}

/// Union of the action name → action type maps of every config.
#[must_use]
pub fn make_action_types_lookup(configs: &[ActionConfig]) -> BTreeMap<String, ActionType> {
    configs
        .iter()
        .flat_map(|config| async_actions(&config.root, &config.model, config.verb))
        .collect()
}

/// Find the config entry for `(model, verb, phase)` by linear search.
#[must_use]
pub fn resolve_action_config<'a>(
    model: &str,
    verb: Verb,
    phase: Phase,
    configs: &'a ActionConfigLookup,
) -> Option<&'a PhasedActionConfig> {
    configs
        .by_type
        .values()
        .find(|phased| phased.model == model && phased.verb == verb && phased.phase == phase)
}
