//! Built-in dynamic values available inside placeholders.

use crate::utils::{epoch_millis, iso_timestamp, today};
use serde_json::Value;
use uuid::Uuid;

/// A value computed at resolution time rather than looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicToken {
    /// Current UTC time as an ISO-8601 string with milliseconds.
    Timestamp,
    /// Current UTC date as `YYYY-MM-DD`.
    Date,
    /// Milliseconds since the Unix epoch.
    EpochMillis,
    /// A random v4 UUID.
    Uuid,
}

impl DynamicToken {
    /// Recognises the closed set of dynamic token spellings.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "now" | "new Date()" | "new Date().toISOString()" => Some(Self::Timestamp),
            "today" | "new Date().toISOString().split('T')[0]" => Some(Self::Date),
            "timestamp_ms" | "Date.now()" => Some(Self::EpochMillis),
            "uuid" | "crypto.randomUUID()" => Some(Self::Uuid),
            other if other.contains("new Date()") => Some(Self::Timestamp),
            _ => None,
        }
    }

    /// Produces the token's current value.
    #[must_use]
    pub fn evaluate(self) -> Value {
        match self {
            Self::Timestamp => Value::String(iso_timestamp()),
            Self::Date => Value::String(today()),
            Self::EpochMillis => Value::from(epoch_millis()),
            Self::Uuid => Value::String(Uuid::new_v4().to_string()),
        }
    }
}
