//! # mchal_types
//!
//! Shared scalar, topic, address, and error-code types used by every other
//! crate in the workspace. Kept dependency-light (serde + thiserror only)
//! so that the ring, bus, registry, and service crates can all depend on it
//! without pulling in async runtimes or locking primitives they may not
//! need.

#![warn(missing_docs)]

pub mod consts;
pub mod error;
pub mod link;
pub mod token;
pub mod topic;
pub mod value;

pub mod prelude {
    //! Convenient re-exports: `use mchal_types::prelude::*;`

    // ─── Errors ─────────────────────────────────────────────────────
    pub use crate::error::ErrorCode;

    // ─── Topics ─────────────────────────────────────────────────────
    pub use crate::token::Token;
    pub use crate::topic::{Topic, TopicError, TopicFilter};

    // ─── Capabilities ───────────────────────────────────────────────
    pub use crate::link::LinkState;
    pub use crate::value::Value;
    pub use crate::{CapabilityAddress, DeviceId};
}

use serde::{Deserialize, Serialize};

/// Stable identity of a device, assigned at configuration time.
///
/// Used as the claimant in resource-registry claims and as the value side
/// of the HAL service's capability index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Borrow the device id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId(s)
    }
}

/// `(domain, kind, name)` triple identifying one capability, globally
/// unique within a single boot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityAddress {
    /// Coarse category, e.g. `io`, `power`, `env`.
    pub domain: String,
    /// Finer category, e.g. `led`, `switch`, `temperature`.
    pub kind: String,
    /// Instance identifier chosen at configuration time.
    pub name: String,
}

impl CapabilityAddress {
    /// Build a new capability address. All three segments must be
    /// non-empty; this is enforced by callers constructing from bus
    /// topics (`Topic::parse_control`), not here, since capability specs
    /// are also built directly by devices at compile time.
    pub fn new(domain: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        CapabilityAddress {
            domain: domain.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// The `hal/cap/<domain>/<kind>/<name>` topic prefix shared by all of
    /// this capability's derived topics.
    pub fn base_topic(&self) -> Topic {
        Topic::new(vec![
            Token::text("hal"),
            Token::text("cap"),
            Token::text(&self.domain),
            Token::text(&self.kind),
            Token::text(&self.name),
        ])
    }
}

impl std::fmt::Display for CapabilityAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.kind, self.name)
    }
}

pub use link::LinkState;
pub use token::Token;
pub use topic::Topic;
