use std::cell;
use std::rc;
use std::sync;
use std::vec;

use itertools::Itertools;
use serde_derive::{Deserialize, Serialize};

use crate::model::path;
use crate::model::tree::change::{Change, ChangeObserver, ObserverId};
use crate::model::tree::{Tree, WeakTree};
use crate::util;
use crate::view;

pub type ViewNodeHandle = rc::Rc<cell::RefCell<ViewNode>>;

/// Property values longer than this are cut off in row summaries. The full
/// value stays in the tree.
pub const MAX_SUMMARY_VALUE_CHARS: usize = 200;

static NEXT_UID: sync::atomic::AtomicU64 = sync::atomic::AtomicU64::new(1);

/// Which descendants of a node were expanded, as positional paths relative
/// to that node. Survives serialization so a host can persist expansion
/// state across runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpennessSnapshot {
    open: vec::Vec<path::Path>,
}

impl OpennessSnapshot {
    pub fn record(&mut self, path: path::Path) {
        if !self.open.iter().any(|p| p == &path) {
            self.open.push(path);
        }
    }

    pub fn is_open(&self, path: path::PathSlice) -> bool {
        self.open.iter().any(|p| p.as_slice() == path)
    }

    /// The sub-snapshot for the child at `index`, rebased to that child.
    pub fn descend(&self, index: usize) -> OpennessSnapshot {
        OpennessSnapshot {
            open: self
                .open
                .iter()
                .filter(|p| p.first() == Some(&index))
                .map(|p| p[1..].to_vec())
                .collect(),
        }
    }

    pub fn paths(&self) -> &[path::Path] {
        &self.open
    }
}

/// One displayable line of the hierarchy, in visual order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub path: path::Path,
    pub depth: usize,
    pub type_name: String,
    pub summary: String,
    pub selected: bool,
    pub uid: u64,
}

/// Mirror of one tree node in the display. Registers itself as an observer
/// on its tree node at construction and deregisters on drop. Child mirrors
/// exist only while this node is open.
pub struct ViewNode {
    tree: WeakTree,
    uid: u64,
    shared: rc::Rc<view::Context>,
    observer_id: ObserverId,
    children: vec::Vec<ViewNodeHandle>,
    open: bool,
    /* expansion state of the subtree as of the last close, consumed by the
     * next reopen */
    saved_openness: Option<OpennessSnapshot>,
    selected: bool,
    needs_repaint: bool,
}

impl ViewNode {
    pub fn create(tree: &Tree, shared: &rc::Rc<view::Context>) -> ViewNodeHandle {
        rc::Rc::new_cyclic(|weak: &rc::Weak<cell::RefCell<ViewNode>>| {
            let observer: rc::Weak<cell::RefCell<dyn ChangeObserver>> = weak.clone();
            cell::RefCell::new(ViewNode {
                tree: tree.downgrade(),
                uid: NEXT_UID.fetch_add(1, sync::atomic::Ordering::Relaxed),
                shared: shared.clone(),
                observer_id: tree.add_observer(observer),
                children: vec::Vec::new(),
                open: false,
                saved_openness: None,
                selected: false,
                needs_repaint: true,
            })
        })
    }

    /// Stable for the lifetime of this mirror; survives resyncs that keep it.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn tree(&self) -> Option<Tree> {
        self.tree.upgrade().filter(Tree::is_valid)
    }

    pub fn wraps(&self, tree: &Tree) -> bool {
        self.tree.upgrade().map_or(false, |t| &t == tree)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn might_have_children(&self) -> bool {
        self.tree().map_or(false, |t| t.child_count() > 0)
    }

    pub fn child(&self, index: usize) -> Option<ViewNodeHandle> {
        self.children.get(index).cloned()
    }

    pub fn child_view_count(&self) -> usize {
        self.children.len()
    }

    pub fn set_open(&mut self, open: bool) {
        if open == self.open {
            return;
        }
        if open {
            self.open = true;
            self.resync();
        } else {
            self.saved_openness = Some(self.capture_openness());
            self.open = false;
            self.release_children();
        }
        self.needs_repaint = true;
    }

    /// Rebuilds the child mirrors against the tree's current child list.
    /// Children that still wrap a present tree node are kept as-is, with
    /// their uid, expansion and selection intact; tree nodes without a
    /// mirror get a fresh one, expanded if a node previously sat open at
    /// that position. Mirrors whose tree node is gone are dropped.
    pub fn resync(&mut self) {
        let tree = match self.tree() {
            Some(tree) => tree,
            None => {
                self.release_children();
                self.needs_repaint = true;
                return;
            }
        };
        if !self.open {
            return;
        }

        let snapshot = if self.children.is_empty() {
            self.saved_openness.take().unwrap_or_default()
        } else {
            self.capture_openness()
        };

        let mut leftovers = std::mem::take(&mut self.children);
        for (index, child_tree) in tree.children().into_iter().enumerate() {
            match leftovers.iter().position(|c| c.borrow().wraps(&child_tree)) {
                Some(at) => self.children.push(leftovers.remove(at)),
                None => {
                    let child = ViewNode::create(&child_tree, &self.shared);
                    child.borrow_mut().open_with(snapshot.descend(index));
                    self.children.push(child);
                }
            }
        }

        if let Some(selected) = self.shared.binding().selected() {
            if leftovers.iter().any(|c| subtree_contains(c, &selected)) {
                self.shared.binding().clear();
            }
        }
        drop(leftovers);

        tracing::trace!(children = self.children.len(), "resynced");
        self.needs_repaint = true;
    }

    /// Expands this node and builds its subtree according to `snapshot`.
    pub(super) fn open_with(&mut self, snapshot: OpennessSnapshot) {
        self.saved_openness = None;
        if !snapshot.is_open(&[]) {
            return;
        }
        self.open = true;
        if let Some(tree) = self.tree() {
            for (index, child_tree) in tree.children().into_iter().enumerate() {
                let child = ViewNode::create(&child_tree, &self.shared);
                child.borrow_mut().open_with(snapshot.descend(index));
                self.children.push(child);
            }
        }
        self.needs_repaint = true;
    }

    pub fn capture_openness(&self) -> OpennessSnapshot {
        let mut snapshot = OpennessSnapshot::default();
        let mut prefix = path::Path::new();
        self.record_openness(&mut snapshot, &mut prefix);
        snapshot
    }

    fn record_openness(&self, snapshot: &mut OpennessSnapshot, prefix: &mut path::Path) {
        if !self.open {
            return;
        }
        snapshot.record(prefix.clone());
        for (index, child) in self.children.iter().enumerate() {
            prefix.push(index);
            child.borrow().record_openness(snapshot, prefix);
            prefix.pop();
        }
    }

    fn release_children(&mut self) {
        let children = std::mem::take(&mut self.children);
        if let Some(selected) = self.shared.binding().selected() {
            if children.iter().any(|c| subtree_contains(c, &selected)) {
                self.shared.binding().clear();
            }
        }
        drop(children);
    }

    pub fn render(&self, rows: &mut vec::Vec<Row>, depth: usize, prefix: &mut path::Path) {
        rows.push(Row {
            path: prefix.clone(),
            depth,
            type_name: self.tree().map(|t| t.type_name()).unwrap_or_default(),
            summary: self.summary(),
            selected: self.selected,
            uid: self.uid,
        });
        if self.open {
            for (index, child) in self.children.iter().enumerate() {
                prefix.push(index);
                child.borrow().render(rows, depth + 1, prefix);
                prefix.pop();
            }
        }
    }

    fn summary(&self) -> String {
        let tree = match self.tree() {
            Some(tree) => tree,
            None => return String::new(),
        };
        tree.properties()
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    name,
                    util::truncate_display(&value.display_text(), MAX_SUMMARY_VALUE_CHARS)
                )
            })
            .join(" ")
    }

    pub fn take_needs_repaint(&mut self) -> bool {
        std::mem::replace(&mut self.needs_repaint, false)
    }

    pub fn take_repaints(&mut self, out: &mut vec::Vec<path::Path>, prefix: &mut path::Path) {
        if std::mem::replace(&mut self.needs_repaint, false) {
            out.push(prefix.clone());
        }
        for (index, child) in self.children.iter().enumerate() {
            prefix.push(index);
            child.borrow_mut().take_repaints(out, prefix);
            prefix.pop();
        }
    }

    pub(super) fn set_selected(&mut self, selected: bool) {
        if self.selected != selected {
            self.selected = selected;
            self.needs_repaint = true;
        }
    }

    pub(super) fn set_observer_muted(&self, muted: bool) {
        if let Some(tree) = self.tree.upgrade() {
            tree.set_observer_muted(self.observer_id, muted);
        }
    }

    fn refresh_editor(&mut self) {
        if !self.selected {
            return;
        }
        /* skip when the editor is mid-operation; it already knows */
        if let Ok(mut editor) = self.shared.binding().editor().try_borrow_mut() {
            if editor.refresh() {
                self.needs_repaint = true;
            }
        }
    }
}

impl ChangeObserver for ViewNode {
    fn notify_change(&mut self, change: &Change) {
        match change {
            Change::PropertyChanged { node, .. } => {
                if self.wraps(node) {
                    self.needs_repaint = true;
                    self.refresh_editor();
                }
            }
            Change::ChildAdded { parent, .. }
            | Change::ChildRemoved { parent, .. }
            | Change::ChildOrderChanged { parent, .. } => {
                if self.wraps(parent) {
                    self.needs_repaint = true;
                    if self.open {
                        self.resync();
                    }
                }
                /* the coarse signal always travels, even when the changed
                 * node has no mirror of its own */
                self.shared.signal_tree_changed();
            }
            Change::ParentChanged { .. } => {
                self.shared.signal_tree_changed();
            }
            Change::Redirected { node } => {
                if self.wraps(node) {
                    self.needs_repaint = true;
                    self.resync();
                    self.refresh_editor();
                }
                self.shared.signal_tree_changed();
            }
        }
    }
}

impl Drop for ViewNode {
    fn drop(&mut self) {
        if let Some(tree) = self.tree.upgrade() {
            tree.remove_observer(self.observer_id);
        }
    }
}

pub(super) fn subtree_contains(node: &ViewNodeHandle, target: &ViewNodeHandle) -> bool {
    if rc::Rc::ptr_eq(node, target) {
        return true;
    }
    node.borrow().children.iter().any(|child| subtree_contains(child, target))
}

/* Tests that need a full hierarchy around the node live in view::hierarchy;
 * these cover the mirror on its own. */
