pub mod curve;
pub mod error;
pub mod events;
pub mod exchange;
pub mod geometry;
pub mod id;
pub mod model;
pub mod store;
pub mod viewport;

pub use curve::{ControlPointEdit, CurveKind, CurvePath};
pub use error::{ElementKind, SceneError};
pub use events::{EventHub, SceneEvent, Subscription};
pub use exchange::SceneDocument;
pub use id::{ConnectionId, ControlPointId, NodeId};
pub use model::*;
pub use store::{SceneStore, StoreLimits};
pub use viewport::Viewport;

// Re-export kurbo's value types so downstream crates share one geometry vocabulary
pub use kurbo::{Point, Rect, Size, Vec2};
