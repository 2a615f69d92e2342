//! Frame-coalescing redraw scheduler.
//!
//! Mutations only mark what changed. The host drains the pending set once
//! per animation frame, so a burst of pointer moves costs one redraw.

use lb_core::{ConnectionId, NodeId};
use serde::Serialize;
use std::collections::HashSet;

/// What changed since the last flush.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirtySet {
    pub nodes: HashSet<NodeId>,
    pub connections: HashSet<ConnectionId>,
    pub viewport: bool,
    /// Selection, previews, marquee, label editor.
    pub overlays: bool,
    /// Whole scene replaced.
    pub scene: bool,
}

impl DirtySet {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
            && self.connections.is_empty()
            && !self.viewport
            && !self.overlays
            && !self.scene
    }
}

#[derive(Debug, Default)]
pub struct FrameScheduler {
    pending: DirtySet,
    flushed: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_node(&mut self, id: NodeId) {
        self.pending.nodes.insert(id);
    }

    pub fn mark_connection(&mut self, id: ConnectionId) {
        self.pending.connections.insert(id);
    }

    pub fn mark_viewport(&mut self) {
        self.pending.viewport = true;
    }

    pub fn mark_overlays(&mut self) {
        self.pending.overlays = true;
    }

    pub fn mark_scene(&mut self) {
        self.pending.scene = true;
    }

    /// True when a redraw is owed.
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Drain the pending set. `None` when there is nothing to draw.
    pub fn flush(&mut self) -> Option<DirtySet> {
        if self.pending.is_empty() {
            return None;
        }
        self.flushed += 1;
        Some(std::mem::take(&mut self.pending))
    }

    /// Number of frames flushed so far.
    pub fn frames(&self) -> u64 {
        self.flushed
    }
}
