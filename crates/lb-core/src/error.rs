//! Error taxonomy shared by the store, curve engine, and exchange layer.
//!
//! Nothing here is fatal: callers either log and move on (`NotFound`),
//! surface a transient notice (`CapacityExceeded`), or report a failed save
//! while keeping in-memory state (`PersistenceFailure`).

use thiserror::Error;

/// What kind of element an id referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Node,
    Connection,
    ControlPoint,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ElementKind::Node => "node",
            ElementKind::Connection => "connection",
            ElementKind::ControlPoint => "control point",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    /// The id is no longer (or never was) present.
    #[error("{kind} `{id}` not found")]
    NotFound { kind: ElementKind, id: String },

    /// A configured ceiling was hit (control points per connection, nodes,
    /// or connections).
    #[error("{what} limit of {limit} reached")]
    CapacityExceeded { what: &'static str, limit: usize },

    /// Degenerate geometry, e.g. two endpoints at the same position.
    /// Recovered inside the curve engine; only ever logged.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Serialization or storage of the scene failed.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// An explicit id collides with an existing element.
    #[error("{kind} `{id}` already exists")]
    DuplicateId { kind: ElementKind, id: String },

    /// A connection must join two distinct nodes.
    #[error("connection endpoints must be distinct (`{0}`)")]
    InvalidEndpoints(String),
}

impl SceneError {
    pub fn node_not_found(id: impl std::fmt::Display) -> Self {
        SceneError::NotFound {
            kind: ElementKind::Node,
            id: id.to_string(),
        }
    }

    pub fn connection_not_found(id: impl std::fmt::Display) -> Self {
        SceneError::NotFound {
            kind: ElementKind::Connection,
            id: id.to_string(),
        }
    }

    pub fn point_not_found(id: impl std::fmt::Display) -> Self {
        SceneError::NotFound {
            kind: ElementKind::ControlPoint,
            id: id.to_string(),
        }
    }

    /// True for errors the UI should show as a transient notice.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            SceneError::CapacityExceeded { .. } | SceneError::PersistenceFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_element() {
        let e = SceneError::node_not_found("node_4");
        assert_eq!(e.to_string(), "node `node_4` not found");
        let e = SceneError::CapacityExceeded {
            what: "control point",
            limit: 2,
        };
        assert_eq!(e.to_string(), "control point limit of 2 reached");
    }

    #[test]
    fn only_capacity_and_persistence_are_user_visible() {
        assert!(
            SceneError::CapacityExceeded {
                what: "node",
                limit: 1
            }
            .is_user_visible()
        );
        assert!(SceneError::PersistenceFailure("disk".into()).is_user_visible());
        assert!(!SceneError::connection_not_found("c").is_user_visible());
        assert!(!SceneError::InvalidGeometry("x".into()).is_user_visible());
    }
}
