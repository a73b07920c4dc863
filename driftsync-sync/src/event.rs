//! Event and parameter bag types.
//!
//! An [`Event`] is a named command with a key-validated [`Params`] bag, a
//! correlation code, and optional reply/error continuations. Events are the
//! unit of dispatch for the [`EventRouter`](crate::router::EventRouter):
//! reassembled wire messages become events, and handler replies become
//! events routed back through the sender's correlation token.

use crate::error::{SyncError, SyncResult};
use driftsync_types::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::warn;

/// Status tag carried by every event and wire message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    /// The default: nothing went wrong.
    Ok,
    /// The command failed on the far side.
    Error,
    /// Application-defined status.
    Other(String),
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ok" => Status::Ok,
            "error" => Status::Error,
            _ => Status::Other(s),
        }
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        match s {
            Status::Ok => "ok".to_string(),
            Status::Error => "error".to_string(),
            Status::Other(other) => other,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Ok
    }
}

/// A key-validated parameter bag.
///
/// Callers declare `required` and `allowed` keys, then project a restricted
/// view with [`Params::val`]. Requesting a required key that is absent fails
/// with [`SyncError::MissingKey`]; it is never silently defaulted.
#[derive(Debug, Clone, Default)]
pub struct Params {
    data: Map<String, Value>,
    required: BTreeSet<String>,
    allowed: BTreeSet<String>,
}

impl Params {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bag from a JSON value, which must be an object (or null,
    /// treated as empty).
    pub fn from_value(value: Value) -> SyncResult<Self> {
        let data = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(SyncError::BadParams(format!(
                    "not a map: {other}"
                )));
            }
        };
        Ok(Self {
            data,
            required: BTreeSet::new(),
            allowed: BTreeSet::new(),
        })
    }

    /// Inserts a value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Declares required keys (idempotent set union).
    pub fn require<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Declares allowed keys (idempotent set union).
    pub fn allow<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Returns the value for `key`, failing when absent.
    pub fn val(&self, key: &str) -> SyncResult<&Value> {
        self.data.get(key).ok_or_else(|| SyncError::MissingKey {
            key: key.to_string(),
        })
    }

    /// Returns the declared projection of the bag.
    ///
    /// Every required key must be present; allowed keys are included when
    /// present. With no keys declared, returns the full bag unfiltered.
    pub fn vals(&self) -> SyncResult<Map<String, Value>> {
        if self.required.is_empty() && self.allowed.is_empty() {
            return Ok(self.data.clone());
        }
        let mut result = Map::new();
        for key in &self.required {
            let value = self.val(key)?;
            result.insert(key.clone(), value.clone());
        }
        for key in &self.allowed {
            if let Some(value) = self.data.get(key) {
                result.insert(key.clone(), value.clone());
            }
        }
        Ok(result)
    }

    /// Returns a new `Params` wrapping the nested map at `key`.
    ///
    /// Fails when the key is missing or the value is not a map.
    pub fn get(&self, key: &str) -> SyncResult<Params> {
        let value = self.val(key)?;
        Params::from_value(value.clone())
    }

    /// Returns the bag as a JSON object value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// Deserializes the full bag into a typed payload.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> SyncResult<T> {
        Ok(serde_json::from_value(self.to_value())?)
    }
}

/// Reply continuation: consumes the reply event. Invoked at most once.
pub type ReplyFn = Box<dyn FnOnce(Event) + Send>;

/// Error continuation: consumes a dispatch-time error. Invoked at most once.
pub type ErrorFn = Box<dyn FnOnce(SyncError) + Send>;

/// A named command flowing through the router.
pub struct Event {
    /// Command name (or a correlation token, for replies).
    pub name: String,
    /// Outcome tag, default ok.
    pub status: Status,
    /// Correlation code embedded in replies to this event.
    pub rcode: String,
    /// The peer this event originated from, if remote. Never owns the
    /// connection.
    pub source: Option<PeerId>,
    /// The parameter bag.
    pub params: Params,
    reply_with: Option<ReplyFn>,
    error_with: Option<ErrorFn>,
}

impl Event {
    /// Creates an event with default status and empty params.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::Ok,
            rcode: String::new(),
            source: None,
            params: Params::new(),
            reply_with: None,
            error_with: None,
        }
    }

    /// Sets the parameter bag.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Sets the correlation code.
    pub fn with_rcode(mut self, rcode: impl Into<String>) -> Self {
        self.rcode = rcode.into();
        self
    }

    /// Sets the originating peer.
    pub fn with_source(mut self, source: PeerId) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the reply continuation.
    pub fn with_reply(mut self, reply: ReplyFn) -> Self {
        self.reply_with = Some(reply);
        self
    }

    /// Sets the error continuation.
    pub fn with_error(mut self, error: ErrorFn) -> Self {
        self.error_with = Some(error);
        self
    }

    /// Whether a reply continuation is attached.
    pub fn can_reply(&self) -> bool {
        self.reply_with.is_some()
    }

    /// Invokes the reply continuation with a fresh event named by this
    /// event's correlation code.
    ///
    /// A missing continuation is a warning, not an error: a caller that
    /// forgot to enable replies should not crash dispatch.
    pub fn reply(&mut self, status: Status, params: Params) {
        let Some(reply_with) = self.reply_with.take() else {
            warn!(event = %self.name, "no reply continuation for event");
            return;
        };
        let reply = Event::new(self.rcode.clone())
            .with_status(status)
            .with_params(params);
        reply_with(reply);
    }

    /// Takes the error continuation, if any. Used by the router to report
    /// dispatch-time handler errors.
    pub(crate) fn take_error(&mut self) -> Option<ErrorFn> {
        self.error_with.take()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("rcode", &self.rcode)
            .field("source", &self.source)
            .field("params", &self.params)
            .field("reply", &self.reply_with.is_some())
            .field("error", &self.error_with.is_some())
            .finish()
    }
}
