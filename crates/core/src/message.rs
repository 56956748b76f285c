//! Message and conversation identity types.
//!
//! These are the value objects that flow through a chat turn:
//! User sends a message → router classifies it → assistant answers → both are appended
//! to the conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routing::Scope;

/// Unique identifier for a conversation.
///
/// Always a hyphenated, lowercase UUID string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Mint a fresh random (v4) id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Resolve a caller-supplied id.
    ///
    /// An absent, empty, or unparseable id is replaced by a freshly minted one
    /// rather than rejected.
    pub fn parse_or_new(supplied: Option<&str>) -> Self {
        supplied
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(|u| Self(u.hyphenated().to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A single message in a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The scope the router assigned (assistant turns only)
    #[serde(default)]
    pub scope: Option<Scope>,

    /// The text content
    pub content: String,

    /// Creation time; orders messages within a conversation
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new user message. User turns carry no scope.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            scope: None,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    /// Create a new assistant message tagged with the routed scope.
    pub fn assistant(scope: Scope, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            scope: Some(scope),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
