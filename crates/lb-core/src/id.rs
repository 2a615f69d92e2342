use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global string interner shared by every id kind: O(1) compare and hash.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Monotonic suffix for generated ids. Shared across kinds so a generated
/// string never collides between a node and a connection.
static COUNTER: AtomicU64 = AtomicU64::new(0);

macro_rules! interned_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $sigil:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Spur);

        impl $name {
            /// Prefix used by [`Self::generate`].
            pub const PREFIX: &'static str = $prefix;

            /// Intern a string as an id, or return the existing one.
            pub fn intern(s: &str) -> Self {
                $name(INTERNER.get_or_intern(s))
            }

            /// Resolve back to a string slice.
            pub fn as_str(&self) -> &str {
                INTERNER.resolve(&self.0)
            }

            /// Generate a fresh id (e.g. `node_12`).
            pub fn generate() -> Self {
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                Self::intern(&format!("{}_{n}", Self::PREFIX))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($sigil, "{}"), self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok($name::intern(&s))
            }
        }
    };
}

interned_id!(
    /// Identifier of a diagram node.
    NodeId,
    "node",
    "@"
);

interned_id!(
    /// Identifier of a connection between two nodes.
    ConnectionId,
    "conn",
    "~"
);

interned_id!(
    /// Identifier of a control point inside a connection's point list.
    ControlPointId,
    "cp",
    "*"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = NodeId::intern("login_box");
        let b = NodeId::intern("login_box");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "login_box");
    }

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let a = NodeId::generate();
        let b = NodeId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("node_"));
        assert!(ConnectionId::generate().as_str().starts_with("conn_"));
        assert!(ControlPointId::generate().as_str().starts_with("cp_"));
    }

    #[test]
    fn debug_uses_kind_sigil() {
        assert_eq!(format!("{:?}", NodeId::intern("a")), "@a");
        assert_eq!(format!("{:?}", ConnectionId::intern("e")), "~e");
        assert_eq!(format!("{}", ControlPointId::intern("p")), "p");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ConnectionId::intern("conn_x");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"conn_x\"");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
