//! Verbs, phases and the identifiers derived from them.
//!
//! Every asynchronous operation is described by a `(root, model, verb)` triple and
//! runs through exactly three [`Phase`]s. Two identifiers are derived from the
//! triple plus a phase:
//!
//! - the [`ActionType`] (`"sample/cities/FETCH_REQUEST"`), used as the correlation key
//!   between an outbound request and its inbound response
//! - the action name (`"fetchCitiesRequest"`), used to address action creators
//!
//! Both derivations are pure and deterministic.
//!
//! # Example
//!
//! ```
//! use record_relay_core::naming::{action_name, action_type, Phase, Verb};
//!
//! let ty = action_type("sample", "cities", Verb::Fetch, Phase::Request);
//! assert_eq!(ty.as_str(), "sample/cities/FETCH_REQUEST");
//! assert_eq!(action_name("cities", Verb::Fetch, Phase::Request), "fetchCitiesRequest");
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a verb, phase or action type string cannot be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseNameError {
    /// Not one of the known verbs
    #[error("Unknown verb: {0}")]
    UnknownVerb(String),

    /// Not one of the known phases
    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    /// Not of the form `{root}/{model}/{VERB}_{PHASE}`
    #[error("Malformed action type '{0}': expected root/model/VERB_PHASE")]
    MalformedActionType(String),
}

/// The kind of operation an action performs.
///
/// `Fetch` is a read; every other verb is a patch-style mutation modeled on
/// JSON Patch (RFC 6902) and shares a single wire shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    /// Read values
    Fetch,
    /// Add values to a collection
    Add,
    /// Remove values from a collection
    Remove,
    /// Replace existing values
    Replace,
    /// Add values to a selection
    Select,
    /// Remove values from a selection
    Deselect,
    /// Move a value from one location to another
    Move,
    /// Copy a value from one location to another
    Copy,
    /// Test that a value equals the stored value
    Test,
}

impl Verb {
    /// Every verb, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Fetch,
        Self::Add,
        Self::Remove,
        Self::Replace,
        Self::Select,
        Self::Deselect,
        Self::Move,
        Self::Copy,
        Self::Test,
    ];

    /// The verbs routed through the patch interpreter.
    ///
    /// `Test` is a valid verb but is not dispatched as a patch.
    pub const PATCH: [Self; 7] = [
        Self::Add,
        Self::Remove,
        Self::Replace,
        Self::Select,
        Self::Deselect,
        Self::Move,
        Self::Copy,
    ];

    /// Upper-case wire name, e.g. `"FETCH"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "FETCH",
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Replace => "REPLACE",
            Self::Select => "SELECT",
            Self::Deselect => "DESELECT",
            Self::Move => "MOVE",
            Self::Copy => "COPY",
            Self::Test => "TEST",
        }
    }

    /// Lower-case JSON Patch operation name, e.g. `"add"`.
    #[must_use]
    pub const fn patch_op(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Select => "select",
            Self::Deselect => "deselect",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Test => "test",
        }
    }

    /// Whether this verb is one of [`Verb::PATCH`].
    #[must_use]
    pub const fn is_patch(self) -> bool {
        !matches!(self, Self::Fetch | Self::Test)
    }

    /// HTTP method used to carry this verb.
    #[must_use]
    pub const fn http_method(self) -> HttpMethod {
        match self {
            Self::Fetch => HttpMethod::Get,
            _ => HttpMethod::Patch,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|verb| verb.as_str() == upper)
            .ok_or_else(|| ParseNameError::UnknownVerb(s.to_string()))
    }
}

/// HTTP methods used by the interpreters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Reads
    Get,
    /// All patch-style mutations
    Patch,
}

impl HttpMethod {
    /// Upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle stage of an asynchronous operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    /// The operation was asked for
    Request,
    /// The operation completed with a 2xx response
    Success,
    /// The operation completed with any other response
    Failure,
}

impl Phase {
    /// All three phases, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Request, Self::Success, Self::Failure];

    /// Upper-case name, e.g. `"REQUEST"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == upper)
            .ok_or_else(|| ParseNameError::UnknownPhase(s.to_string()))
    }
}

/// The correlation key of an action: `{root}/{model}/{VERB}_{PHASE}`.
///
/// # Validation
///
/// - `FromStr::from_str()` checks the shape and decodes verb and phase
/// - `new()` and `From` perform no validation (for trusted, derived input)
///
/// # Examples
///
/// ```
/// use record_relay_core::naming::{ActionType, Phase, Verb};
///
/// let ty: ActionType = "sample/cities/ADD_SUCCESS".parse().unwrap();
/// let parts = ty.parts().unwrap();
/// assert_eq!(parts.model, "cities");
/// assert_eq!(parts.verb, Verb::Add);
/// assert_eq!(parts.phase, Phase::Success);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionType(String);

/// The decoded components of an [`ActionType`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionTypeParts {
    /// Root concept; may itself contain `/`
    pub root: String,
    /// Model name
    pub model: String,
    /// Verb
    pub verb: Verb,
    /// Phase
    pub phase: Phase,
}

impl ActionType {
    /// Wrap a string without validating it.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Decode the type back into root, model, verb and phase.
    ///
    /// # Errors
    ///
    /// Returns [`ParseNameError`] if the type is not of the form
    /// `{root}/{model}/{VERB}_{PHASE}` or names an unknown verb or phase.
    pub fn parts(&self) -> Result<ActionTypeParts, ParseNameError> {
        let malformed = || ParseNameError::MalformedActionType(self.0.clone());
        let (prefix, suffix) = self.0.rsplit_once('/').ok_or_else(malformed)?;
        let (root, model) = prefix.rsplit_once('/').ok_or_else(malformed)?;
        let (verb, phase) = suffix.rsplit_once('_').ok_or_else(malformed)?;
        if root.is_empty() || model.is_empty() {
            return Err(malformed());
        }
        Ok(ActionTypeParts {
            root: root.to_string(),
            model: model.to_string(),
            verb: verb.parse()?,
            phase: phase.parse()?,
        })
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ActionType {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let candidate = Self(s.to_string());
        candidate.parts()?;
        Ok(candidate)
    }
}

impl From<String> for ActionType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ActionType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ActionType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ActionType {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Derive the action type for `(root, model, verb, phase)`.
#[must_use]
pub fn action_type(root: &str, model: &str, verb: Verb, phase: Phase) -> ActionType {
    ActionType(format!("{root}/{model}/{verb}_{phase}"))
}

/// Derive the action creator name for `(model, verb, phase)`.
///
/// `{lower(verb)}{Capitalize(camel(model))}{Capitalize(lower(phase))}`
#[must_use]
pub fn action_name(model: &str, verb: Verb, phase: Phase) -> String {
    format!(
        "{}{}{}",
        verb.as_str().to_ascii_lowercase(),
        capitalize(&camel_case(model)),
        capitalize(&phase.as_str().to_ascii_lowercase()),
    )
}

/// All three phase types for one `(root, model, verb)`.
#[must_use]
pub fn async_actions_phase_keys(root: &str, model: &str, verb: Verb) -> BTreeMap<Phase, ActionType> {
    Phase::ALL
        .into_iter()
        .map(|phase| (phase, action_type(root, model, verb, phase)))
        .collect()
}

/// All three phase types for one `(root, model, verb)`, keyed by action name.
#[must_use]
pub fn async_actions(root: &str, model: &str, verb: Verb) -> BTreeMap<String, ActionType> {
    async_actions_phase_keys(root, model, verb)
        .into_iter()
        .map(|(phase, ty)| (action_name(model, verb, phase), ty))
        .collect()
}

/// Join `_`, `-` or space separated words, upper-casing the first letter of each
/// word after the first.
fn camel_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for ch in s.chars() {
        if matches!(ch, '_' | '-' | ' ') {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
