//! Topic tokens: the scalar values that make up a [`crate::Topic`].
//!
//! Per the data model, a token is a non-empty value from a small set of
//! scalar types; byte-array tokens are rejected at construction (there is
//! simply no constructor for them). Two reserved wildcard tokens, `+` and
//! `#`, are configured at bus construction time and compared by value like
//! any other text token — the bus, not this type, knows which text values
//! are currently acting as wildcards.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One token of a topic.
///
/// `Arc<str>` (not `String`) backs the text variant so that cloning a
/// retained message — required on every subscription whose pattern
/// matches it — is cheap per token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    /// Textual token, e.g. a capability domain/kind/name segment or verb.
    Text(Arc<str>),
    /// Signed integer token.
    Int(i64),
    /// Unsigned integer token.
    Uint(u64),
}

impl Token {
    /// Build a text token.
    pub fn text(s: impl AsRef<str>) -> Self {
        Token::Text(Arc::from(s.as_ref()))
    }

    /// Build a signed-integer token.
    pub fn int(v: i64) -> Self {
        Token::Int(v)
    }

    /// Build an unsigned-integer token.
    pub fn uint(v: u64) -> Self {
        Token::Uint(v)
    }

    /// The token's text value, if it is a [`Token::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Token::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Text(s) => write!(f, "{s}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Uint(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::text(s)
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Text(Arc::from(s.as_str()))
    }
}
