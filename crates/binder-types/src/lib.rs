use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Shared error type for the console crates that have no richer error of their own.
#[derive(Debug, Error, Clone)]
pub enum SharedError {
    #[error("{message}")]
    Message { message: String },
}

impl SharedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Identifier of one live link to the binder.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Two-part address of a remote call: API namespace and verb.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ApiAddress {
    pub api: String,
    pub verb: String,
}

impl ApiAddress {
    pub fn new(api: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            verb: verb.into(),
        }
    }
}

impl fmt::Display for ApiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api, self.verb)
    }
}

/// Resolution of one remote call. Exactly one is produced per issued call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "payload", rename_all = "snake_case")]
pub enum CallOutcome {
    Success(Value),
    Failure(Value),
}

impl CallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }

    pub fn payload(&self) -> &Value {
        match self {
            CallOutcome::Success(value) | CallOutcome::Failure(value) => value,
        }
    }

    pub fn into_payload(self) -> Value {
        match self {
            CallOutcome::Success(value) | CallOutcome::Failure(value) => value,
        }
    }
}

impl From<Result<Value, Value>> for CallOutcome {
    fn from(result: Result<Value, Value>) -> Self {
        match result {
            Ok(value) => CallOutcome::Success(value),
            Err(value) => CallOutcome::Failure(value),
        }
    }
}

/// Unsolicited message pushed by the binder after subscription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PushEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Event name filter used for subscriptions. `*` matches every event and a
/// trailing `*` matches by prefix (`UNICENS/*`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct EventPattern(pub String);

impl EventPattern {
    pub fn wildcard() -> Self {
        Self("*".to_string())
    }

    pub fn matches(&self, name: &str) -> bool {
        match self.0.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => self.0 == name,
        }
    }
}

impl fmt::Display for EventPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
