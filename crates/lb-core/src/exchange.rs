//! Exchange format: the flat JSON document the save/load collaborator
//! persists, plus MessagePack snapshots of the same document for history.
//!
//! Import is all-or-nothing. A document is validated and built into a fresh
//! store first; the live store is only replaced once that succeeds.

use crate::error::SceneError;
use crate::id::{ConnectionId, ControlPointId, NodeId};
use crate::model::*;
use crate::store::{SceneStore, StoreLimits};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDocument {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub shape: Shape,
    #[serde(default)]
    pub style: NodeStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageOverlay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub control_points: Vec<PointRecord>,
    #[serde(default)]
    pub style: ConnectionStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub id: ControlPointId,
    pub x: f64,
    pub y: f64,
}

impl From<&Node> for NodeRecord {
    fn from(n: &Node) -> Self {
        Self {
            id: n.id,
            x: n.position.x,
            y: n.position.y,
            text: n.text.clone(),
            shape: n.shape,
            style: n.style.clone(),
            image: n.image.clone(),
        }
    }
}

impl From<&Connection> for ConnectionRecord {
    fn from(c: &Connection) -> Self {
        Self {
            id: c.id,
            from: c.from,
            to: c.to,
            control_points: c
                .control_points
                .iter()
                .map(|p| PointRecord {
                    id: p.id,
                    x: p.position.x,
                    y: p.position.y,
                })
                .collect(),
            style: c.style.clone(),
            label: c.label.clone(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> SceneError {
    SceneError::PersistenceFailure(msg.into())
}

impl SceneDocument {
    /// Flatten a store. Nodes come out in paint order.
    pub fn from_store(store: &SceneStore) -> Self {
        Self {
            nodes: store.nodes().map(NodeRecord::from).collect(),
            connections: store.connections().map(ConnectionRecord::from).collect(),
        }
    }

    /// Structural checks that must hold before anything is built.
    pub fn validate(&self) -> Result<(), SceneError> {
        let mut node_ids = HashSet::new();
        for n in &self.nodes {
            if !node_ids.insert(n.id) {
                return Err(invalid(format!("duplicate node id `{}`", n.id)));
            }
            if !n.x.is_finite() || !n.y.is_finite() {
                return Err(invalid(format!("node `{}` has a non-finite position", n.id)));
            }
        }

        let mut conn_ids = HashSet::new();
        let mut pairs = HashSet::new();
        for c in &self.connections {
            if !conn_ids.insert(c.id) {
                return Err(invalid(format!("duplicate connection id `{}`", c.id)));
            }
            for end in [c.from, c.to] {
                if !node_ids.contains(&end) {
                    return Err(invalid(format!(
                        "connection `{}` references unknown node `{end}`",
                        c.id
                    )));
                }
            }
            if c.from == c.to {
                return Err(invalid(format!("connection `{}` is a self loop", c.id)));
            }
            let pair = if c.from.as_str() <= c.to.as_str() {
                (c.from, c.to)
            } else {
                (c.to, c.from)
            };
            if !pairs.insert(pair) {
                return Err(invalid(format!(
                    "connection `{}` duplicates the pair {}–{}",
                    c.id, c.from, c.to
                )));
            }
            if c.control_points.len() > MAX_CONTROL_POINTS {
                return Err(invalid(format!(
                    "connection `{}` has {} control points (max {MAX_CONTROL_POINTS})",
                    c.id,
                    c.control_points.len()
                )));
            }
            if c
                .control_points
                .iter()
                .any(|p| !p.x.is_finite() || !p.y.is_finite())
            {
                return Err(invalid(format!(
                    "connection `{}` has a non-finite control point",
                    c.id
                )));
            }
        }
        Ok(())
    }

    /// Build a fresh store from this document.
    pub fn build_store(&self, limits: StoreLimits) -> Result<SceneStore, SceneError> {
        self.validate()?;
        let mut store = SceneStore::with_limits(limits);
        for n in &self.nodes {
            store
                .add_node(NodeSpec {
                    id: Some(n.id),
                    position: Point::new(n.x, n.y),
                    text: n.text.clone(),
                    shape: n.shape,
                    style: n.style.clone(),
                    image: n.image.clone(),
                })
                .map_err(|e| invalid(e.to_string()))?;
        }
        for c in &self.connections {
            let mut conn = Connection::new(c.id, c.from, c.to);
            conn.control_points = c
                .control_points
                .iter()
                .map(|p| ControlPoint {
                    id: p.id,
                    position: Point::new(p.x, p.y),
                })
                .collect();
            conn.style = c.style.clone();
            conn.label = c.label.clone().filter(|l| !l.is_empty());
            store
                .insert_connection(conn)
                .map_err(|e| invalid(e.to_string()))?;
        }
        Ok(store)
    }

    pub fn to_json(&self) -> Result<String, SceneError> {
        serde_json::to_string_pretty(self).map_err(|e| invalid(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        serde_json::from_str(json).map_err(|e| invalid(format!("malformed document: {e}")))
    }

    /// MessagePack with named fields, so optional fields may be skipped.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SceneError> {
        rmp_serde::to_vec_named(self).map_err(|e| invalid(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SceneError> {
        rmp_serde::from_slice(bytes).map_err(|e| invalid(format!("malformed snapshot: {e}")))
    }
}

/// Serialize the store to the exchange JSON.
pub fn export_json(store: &SceneStore) -> Result<String, SceneError> {
    SceneDocument::from_store(store).to_json()
}

/// Replace `store` with the scene in `json`. On any failure the store is
/// left exactly as it was.
pub fn import_json(store: &mut SceneStore, json: &str) -> Result<(), SceneError> {
    let doc = SceneDocument::from_json(json)?;
    replace_with(store, &doc)
}

/// Binary snapshot for the history collaborator.
pub fn snapshot(store: &SceneStore) -> Result<Vec<u8>, SceneError> {
    SceneDocument::from_store(store).to_bytes()
}

/// Restore a snapshot taken with [`snapshot`]. All-or-nothing.
pub fn apply_state(store: &mut SceneStore, bytes: &[u8]) -> Result<(), SceneError> {
    let doc = SceneDocument::from_bytes(bytes)?;
    replace_with(store, &doc)
}

fn replace_with(store: &mut SceneStore, doc: &SceneDocument) -> Result<(), SceneError> {
    let fresh = doc.build_store(store.limits())?;
    log::debug!(
        "replacing scene: {} node(s), {} connection(s)",
        fresh.node_count(),
        fresh.connection_count()
    );
    *store = fresh;
    Ok(())
}
