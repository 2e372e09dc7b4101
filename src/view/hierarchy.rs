use std::rc;
use std::vec;

use crate::model::path;
use crate::model::tree::Tree;
use crate::view;
use crate::view::node::{self, OpennessSnapshot, Row, ViewNodeHandle};
use crate::view::props_editor::{CommitError, PropsEditor};

/// Owns the root mirror and the shared context, and is the surface a host
/// drives: point it at a tree, expand and select rows by path, render the
/// visible rows, apply edits from the properties editor.
pub struct ViewHierarchy {
    tree: Option<Tree>,
    root: Option<ViewNodeHandle>,
    shared: rc::Rc<view::Context>,
}

impl ViewHierarchy {
    pub fn new() -> ViewHierarchy {
        ViewHierarchy {
            tree: None,
            root: None,
            shared: view::Context::new(),
        }
    }

    pub fn context(&self) -> &rc::Rc<view::Context> {
        &self.shared
    }

    /// Points the display at `tree`. The root row starts expanded. An
    /// invalid handle clears the display and the selection; re-setting the
    /// current root is a no-op and keeps all display state.
    pub fn set_root(&mut self, tree: &Tree) {
        if !tree.is_valid() {
            tracing::debug!("clearing hierarchy");
            self.shared.binding().clear();
            self.tree = None;
            self.root = None;
            return;
        }
        if self.tree.as_ref() == Some(tree) {
            return;
        }

        tracing::debug!(root = %tree.type_name(), "setting hierarchy root");
        self.shared.binding().clear();
        self.tree = Some(tree.clone());
        let root = node::ViewNode::create(tree, &self.shared);
        root.borrow_mut().set_open(true);
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<ViewNodeHandle> {
        self.root.clone()
    }

    /// Walks materialized mirrors only; a path under a collapsed row
    /// resolves to nothing until its ancestors are expanded.
    pub fn node_at(&self, path: path::PathSlice) -> Option<ViewNodeHandle> {
        let mut cursor = self.root.clone()?;
        for &index in path {
            let next = cursor.borrow().child(index)?;
            cursor = next;
        }
        Some(cursor)
    }

    pub fn set_expanded(&self, path: path::PathSlice, open: bool) -> bool {
        match self.node_at(path) {
            Some(node) => {
                node.borrow_mut().set_open(open);
                true
            }
            None => false,
        }
    }

    pub fn select_at(&self, path: path::PathSlice) -> bool {
        match self.node_at(path) {
            Some(node) => {
                self.shared.binding().select(Some(&node));
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&self) {
        self.shared.binding().clear();
    }

    pub fn selection(&self) -> Option<ViewNodeHandle> {
        self.shared.binding().selected()
    }

    pub fn selected_path(&self) -> Option<path::Path> {
        let selected = self.shared.binding().selected()?;
        let tree = selected.borrow().tree()?;
        Some(tree.path())
    }

    pub fn editor(&self) -> rc::Rc<std::cell::RefCell<PropsEditor>> {
        self.shared.binding().editor().clone()
    }

    /// Every visible row, top to bottom.
    pub fn render(&self) -> vec::Vec<Row> {
        let mut rows = vec::Vec::new();
        if let Some(root) = &self.root {
            let mut prefix = path::Path::new();
            root.borrow().render(&mut rows, 0, &mut prefix);
        }
        rows
    }

    /// Paths of rows whose display is stale since the last call.
    pub fn take_repaints(&self) -> vec::Vec<path::Path> {
        let mut out = vec::Vec::new();
        if let Some(root) = &self.root {
            let mut prefix = path::Path::new();
            root.borrow_mut().take_repaints(&mut out, &mut prefix);
        }
        out
    }

    pub fn capture_openness(&self) -> OpennessSnapshot {
        match &self.root {
            Some(root) => root.borrow().capture_openness(),
            None => OpennessSnapshot::default(),
        }
    }

    pub fn restore_openness(&self, snapshot: OpennessSnapshot) {
        if let Some(root) = &self.root {
            root.borrow_mut().set_open(false);
            root.borrow_mut().open_with(snapshot);
        }
    }

    /// Applies an edit made in the properties editor back to the tree. The
    /// editor's own view of the field is updated before the write lands, so
    /// the change notification does not bounce back into it.
    pub fn commit_edit(&self, label: &str, text: &str) -> Result<(), CommitError> {
        let editor = self.shared.binding().editor().clone();
        let (target, value) = editor.borrow_mut().stage_edit(label, text)?;
        tracing::info!(field = label, node = %target.type_name(), "committing property edit");
        target.set_property(label, value);
        Ok(())
    }

    pub fn set_tree_changed_hook(&self, hook: Option<Box<dyn Fn()>>) {
        self.shared.set_tree_changed_hook(hook);
    }
}

impl Default for ViewHierarchy {
    fn default() -> ViewHierarchy {
        ViewHierarchy::new()
    }
}
