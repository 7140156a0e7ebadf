// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes
//!
//! Document, space, and runtime ids are minted by the remote platform and
//! are opaque here. Connection ids are minted by the broker.

/// At most the first `n` characters of `s`.
pub fn short(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

/// Newtype id over `SmolStr` that serializes as a bare string and compares
/// and hashes like `str`, so maps keyed by it can be queried with `&str`.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* pub struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub smol_str::SmolStr);

        impl $name {
            pub fn new(id: impl Into<smol_str::SmolStr>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl<'a> From<&'a str> for $name {
            fn from(id: &'a str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self::new(id)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.as_str() == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.as_str() == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.as_str()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                self.as_str()
            }
        }
    };
}

define_id! {
    /// Identifier of a notebook or lexical document open in the editor.
    pub struct DocumentId;
}

define_id! {
    /// Identifier of a space (a container of notebooks and documents).
    pub struct SpaceId;
}

define_id! {
    /// Pod name of a remote runtime.
    ///
    /// The remote API addresses runtimes by pod name for deletion, so this
    /// doubles as the runtime's primary key.
    pub struct RuntimeId;
}

define_id! {
    /// Opaque id of a broker-owned WebSocket connection.
    pub struct ConnectionId;
}

impl ConnectionId {
    /// Mint a fresh connection id (broker side).
    pub fn generate() -> Self {
        Self::new(format!("ws-{}", uuid::Uuid::new_v4().simple()))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
