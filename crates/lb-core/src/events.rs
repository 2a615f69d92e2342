//! Scene events and scoped subscriptions.
//!
//! Every store mutation that goes through the editor engine is announced
//! as a [`SceneEvent`]. Observers (history, minimap, persistence) register
//! with [`EventHub::subscribe`] and stay registered for as long as they
//! hold the returned [`Subscription`].

use crate::id::{ConnectionId, NodeId};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Which store operation ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum SceneEvent {
    NodeAdded(NodeId),
    NodeRemoved {
        id: NodeId,
        cascaded: Vec<ConnectionId>,
    },
    NodesMoved(Vec<NodeId>),
    NodeTextChanged(NodeId),
    NodeStyleChanged(NodeId),
    NodeShapeChanged(NodeId),
    NodeImageChanged(NodeId),
    NodeRaised(NodeId),
    ConnectionAdded(ConnectionId),
    ConnectionRemoved(ConnectionId),
    ControlPointsChanged(ConnectionId),
    ConnectionLabelChanged(ConnectionId),
    ConnectionStyleChanged(ConnectionId),
    /// Whole scene replaced (import, `apply_state`, clear).
    SceneReplaced,
}

type Listener = Box<dyn FnMut(&SceneEvent)>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
    /// Set while `emit` has the listeners checked out.
    emitting: bool,
    /// Subscriptions dropped during an emit, pruned afterwards.
    dropped: Vec<u64>,
}

/// Single-threaded publish/subscribe hub. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: impl FnMut(&SceneEvent) + 'static) -> Subscription {
        let mut reg = self.inner.borrow_mut();
        let id = reg.next_id;
        reg.next_id += 1;
        reg.listeners.push((id, Box::new(listener)));
        Subscription {
            id,
            registry: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every live listener in subscription order.
    /// Listeners may subscribe or drop subscriptions while being called.
    pub fn emit(&self, event: &SceneEvent) {
        let mut listeners = {
            let mut reg = self.inner.borrow_mut();
            if reg.emitting {
                log::warn!("nested emit of {event:?} ignored");
                return;
            }
            reg.emitting = true;
            std::mem::take(&mut reg.listeners)
        };

        for (_, listener) in listeners.iter_mut() {
            listener(event);
        }

        let mut reg = self.inner.borrow_mut();
        let added = std::mem::replace(&mut reg.listeners, listeners);
        reg.listeners.extend(added);
        let dropped = std::mem::take(&mut reg.dropped);
        reg.listeners.retain(|(id, _)| !dropped.contains(id));
        reg.emitting = false;
    }

    pub fn listener_count(&self) -> usize {
        let reg = self.inner.borrow();
        reg.listeners.len() - reg.dropped.len().min(reg.listeners.len())
    }
}

/// Registration guard. Dropping it removes the listener.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let Ok(mut reg) = registry.try_borrow_mut() else {
            return;
        };
        if reg.emitting {
            reg.dropped.push(self.id);
        } else {
            reg.listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dropping_the_guard_unsubscribes() {
        let hub = EventHub::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let sub = hub.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        hub.emit(&SceneEvent::SceneReplaced);
        drop(sub);
        hub.emit(&SceneEvent::SceneReplaced);

        assert_eq!(*seen.borrow(), vec![SceneEvent::SceneReplaced]);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let hub = EventHub::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let (l1, l2) = (log.clone(), log.clone());
        let _a = hub.subscribe(move |_| l1.borrow_mut().push("first"));
        let _b = hub.subscribe(move |_| l2.borrow_mut().push("second"));
        hub.emit(&SceneEvent::NodeAdded(NodeId::intern("ev_n")));
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn guard_dropped_inside_listener_is_pruned() {
        let hub = EventHub::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let inner = slot.clone();
        let sub = hub.subscribe(move |_| {
            inner.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(sub);

        hub.emit(&SceneEvent::SceneReplaced);
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn guard_outliving_hub_is_harmless() {
        let hub = EventHub::new();
        let sub = hub.subscribe(|_| {});
        drop(hub);
        drop(sub);
    }
}
