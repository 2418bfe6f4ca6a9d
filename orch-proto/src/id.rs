//! Typed ID wrappers for users, contexts, tasks, and agents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Typed ID wrappers prevent mixing up a `ContextId` with a `TaskId`.
/// These are just strings underneath — no UUID enforcement, no format
/// requirement. Callers that want UUIDs can generate one and wrap it.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap any string-like value as this id.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Generate a fresh random id (20 lowercase-hex chars).
            ///
            /// Deliberately not a UUID dependency — the protocol doesn't
            /// care what ids look like, only that they're unique and
            /// stable once assigned.
            pub fn generate() -> Self {
                let mut raw = [0u8; 10];
                for byte in &mut raw {
                    *byte = fastrand::u8(..);
                }
                Self(raw.iter().map(|b| format!("{b:02x}")).collect())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(UserId, "Identifier for the tenant/user a request belongs to.");
typed_id!(ContextId, "Identifier for a user_context row.");
typed_id!(TaskId, "Identifier for a user_task row.");
typed_id!(AgentId, "Identifier for a registered agent descriptor.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_ids_are_unique_and_displayable() {
        let a = ContextId::generate();
        let b = ContextId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_str());
    }

    #[test]
    fn from_str_roundtrips() {
        let id = TaskId::from("t-1");
        assert_eq!(id.as_str(), "t-1");
    }
}
