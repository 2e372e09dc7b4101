use std::fmt;

use crate::model::tree::Tree;

/// One mutation event on the observed tree. Node references compare by
/// identity, so handlers can test whether the event concerns the node they
/// wrap.
#[derive(Clone)]
pub enum Change {
    /// A property write on `node`. Fired for both new values and removals.
    PropertyChanged { node: Tree, name: String },

    /// `child` was inserted into `parent`'s child list.
    ChildAdded { parent: Tree, child: Tree },

    /// `child` was removed from `parent`'s child list at `index`.
    ChildRemoved { parent: Tree, child: Tree, index: usize },

    /// A child of `parent` moved from `old_index` to `new_index`.
    ChildOrderChanged { parent: Tree, old_index: usize, new_index: usize },

    /// `node`'s parent link changed.
    ParentChanged { node: Tree },

    /// `node` now presents a different underlying subtree. Distinct from
    /// ordinary property or child mutation.
    Redirected { node: Tree },
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::PropertyChanged { node, name } => f
                .debug_struct("PropertyChanged")
                .field("node", node)
                .field("name", name)
                .finish(),
            Change::ChildAdded { parent, child } => f
                .debug_struct("ChildAdded")
                .field("parent", parent)
                .field("child", child)
                .finish(),
            Change::ChildRemoved { parent, index, .. } => f
                .debug_struct("ChildRemoved")
                .field("parent", parent)
                .field("index", index)
                .finish(),
            Change::ChildOrderChanged { parent, old_index, new_index } => f
                .debug_struct("ChildOrderChanged")
                .field("parent", parent)
                .field("old_index", old_index)
                .field("new_index", new_index)
                .finish(),
            Change::ParentChanged { node } => f
                .debug_struct("ParentChanged")
                .field("node", node)
                .finish(),
            Change::Redirected { node } => f
                .debug_struct("Redirected")
                .field("node", node)
                .finish(),
        }
    }
}

/// Receives changes fired on the node it is registered with or on any of
/// that node's descendants. Delivery is synchronous and in emission order;
/// the mutating call does not return until every handler has run.
pub trait ChangeObserver {
    fn notify_change(&mut self, change: &Change);
}

/// Handle for a single observer registration on a single node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObserverId(pub(super) u64);
