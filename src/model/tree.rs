pub mod change;

use std::any;
use std::borrow;
use std::cell;
use std::fmt;
use std::rc;
use std::sync;
use std::vec;

use crate::model::path;
use change::{Change, ChangeObserver, ObserverId};

/// A property value. `Object` carries an opaque non-primitive reference; it
/// renders as a placeholder and is never editable.
#[derive(Clone)]
pub enum Value {
    Text(String),
    Object(rc::Rc<dyn any::Any>),
    Void,
}

impl Value {
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Text rendering for row summaries and editor fields.
    pub fn display_text(&self) -> borrow::Cow<'_, str> {
        match self {
            Value::Text(text) => borrow::Cow::Borrowed(text.as_str()),
            Value::Object(_) => borrow::Cow::Borrowed("[object]"),
            Value::Void => borrow::Cow::Borrowed(""),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => rc::Rc::ptr_eq(a, b),
            (Value::Void, Value::Void) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Value::Object(_) => f.write_str("Object(..)"),
            Value::Void => f.write_str("Void"),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Value {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Value {
        Value::Text(text)
    }
}

struct ObserverSlot {
    id: u64,
    /* reentrancy guard; set while this registration's handler runs */
    muted: rc::Rc<cell::Cell<bool>>,
    observer: rc::Weak<cell::RefCell<dyn ChangeObserver>>,
}

struct Node {
    type_name: String,
    props: indexmap::IndexMap<String, Value>,
    children: vec::Vec<Tree>,
    parent: rc::Weak<cell::RefCell<Node>>,
    observers: vec::Vec<ObserverSlot>,
    valid: bool,
}

/// Shared handle to one node of the observed tree. Clones are cheap and refer
/// to the same node; equality is reference identity, never value equality.
///
/// Mutating operations on an invalid handle are silent no-ops and read
/// operations return nothing, so a torn-down tree degrades to an empty
/// display instead of an error.
#[derive(Clone)]
pub struct Tree {
    node: rc::Rc<cell::RefCell<Node>>,
}

/// Non-owning handle; the pattern view code uses to reference tree nodes it
/// must not keep alive.
#[derive(Clone)]
pub struct WeakTree {
    node: rc::Weak<cell::RefCell<Node>>,
}

impl WeakTree {
    pub fn upgrade(&self) -> Option<Tree> {
        self.node.upgrade().map(|node| Tree { node })
    }
}

impl PartialEq for Tree {
    fn eq(&self, other: &Tree) -> bool {
        rc::Rc::ptr_eq(&self.node, &other.node)
    }
}

impl Eq for Tree {}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node.try_borrow() {
            Ok(node) => f
                .debug_struct("Tree")
                .field("type_name", &node.type_name)
                .field("valid", &node.valid)
                .finish_non_exhaustive(),
            Err(_) => f.write_str("Tree { <borrowed> }"),
        }
    }
}

static NEXT_OBSERVER_ID: sync::atomic::AtomicU64 = sync::atomic::AtomicU64::new(1);

impl Tree {
    pub fn new(type_name: &str) -> Tree {
        Tree::construct(type_name, true)
    }

    /// An invalid handle. Setting it as a hierarchy root clears the display.
    pub fn invalid() -> Tree {
        Tree::construct("", false)
    }

    fn construct(type_name: &str, valid: bool) -> Tree {
        Tree {
            node: rc::Rc::new(cell::RefCell::new(Node {
                type_name: type_name.to_string(),
                props: indexmap::IndexMap::new(),
                children: vec::Vec::new(),
                parent: rc::Weak::new(),
                observers: vec::Vec::new(),
                valid,
            })),
        }
    }

    pub fn builder(type_name: &str) -> Builder {
        Builder::new(type_name)
    }

    pub fn is_valid(&self) -> bool {
        self.node.borrow().valid
    }

    pub fn downgrade(&self) -> WeakTree {
        WeakTree {
            node: rc::Rc::downgrade(&self.node),
        }
    }

    pub fn type_name(&self) -> String {
        self.node.borrow().type_name.clone()
    }

    pub fn property_count(&self) -> usize {
        self.node.borrow().props.len()
    }

    pub fn property_names(&self) -> vec::Vec<String> {
        self.node.borrow().props.keys().cloned().collect()
    }

    pub fn property(&self, name: &str) -> Option<Value> {
        self.node.borrow().props.get(name).cloned()
    }

    /// Ordered snapshot of every property, in declaration order.
    pub fn properties(&self) -> vec::Vec<(String, Value)> {
        self.node
            .borrow()
            .props
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Writes a property. Re-setting an existing name keeps its position in
    /// the declaration order.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        {
            let mut node = self.node.borrow_mut();
            if !node.valid {
                return;
            }
            node.props.insert(name.to_string(), value);
        }
        self.notify(Change::PropertyChanged {
            node: self.clone(),
            name: name.to_string(),
        });
    }

    pub fn remove_property(&self, name: &str) {
        let removed = {
            let mut node = self.node.borrow_mut();
            node.valid && node.props.shift_remove(name).is_some()
        };
        if removed {
            self.notify(Change::PropertyChanged {
                node: self.clone(),
                name: name.to_string(),
            });
        }
    }

    pub fn child_count(&self) -> usize {
        self.node.borrow().children.len()
    }

    pub fn child(&self, index: usize) -> Option<Tree> {
        self.node.borrow().children.get(index).cloned()
    }

    pub fn children(&self) -> vec::Vec<Tree> {
        self.node.borrow().children.clone()
    }

    pub fn parent(&self) -> Option<Tree> {
        self.node.borrow().parent.upgrade().map(|node| Tree { node })
    }

    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let index = parent.node.borrow().children.iter().position(|child| child == self);
        index
    }

    /// Positional path from the root, outermost index first.
    pub fn path(&self) -> path::Path {
        let mut steps = vec::Vec::new();
        let mut cursor = self.clone();
        while let Some(index) = cursor.index_in_parent() {
            steps.push(index);
            cursor = cursor.parent().unwrap_or_else(Tree::invalid);
        }
        steps.reverse();
        steps
    }

    fn is_ancestor_of(&self, other: &Tree) -> bool {
        let mut cursor = other.parent();
        while let Some(node) = cursor {
            if node == *self {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    /// Inserts `child` at `index` (appends when `None`), detaching it from
    /// any previous parent first.
    pub fn add_child(&self, child: &Tree, index: Option<usize>) {
        if !self.is_valid() || !child.is_valid() {
            return;
        }
        if child == self || child.is_ancestor_of(self) {
            return;
        }
        if let Some(old_index) = child.index_in_parent() {
            if let Some(old_parent) = child.parent() {
                old_parent.remove_child(old_index);
            }
        }
        {
            let mut node = self.node.borrow_mut();
            let index = index.unwrap_or(node.children.len()).min(node.children.len());
            node.children.insert(index, child.clone());
        }
        child.node.borrow_mut().parent = rc::Rc::downgrade(&self.node);
        self.notify(Change::ChildAdded {
            parent: self.clone(),
            child: child.clone(),
        });
        child.notify(Change::ParentChanged { node: child.clone() });
    }

    pub fn remove_child(&self, index: usize) -> Option<Tree> {
        let child = {
            let mut node = self.node.borrow_mut();
            if !node.valid || index >= node.children.len() {
                return None;
            }
            node.children.remove(index)
        };
        child.node.borrow_mut().parent = rc::Weak::new();
        self.notify(Change::ChildRemoved {
            parent: self.clone(),
            child: child.clone(),
            index,
        });
        child.notify(Change::ParentChanged { node: child.clone() });
        Some(child)
    }

    pub fn move_child(&self, old_index: usize, new_index: usize) {
        {
            let mut node = self.node.borrow_mut();
            if !node.valid
                || old_index == new_index
                || old_index >= node.children.len()
                || new_index >= node.children.len()
            {
                return;
            }
            let child = node.children.remove(old_index);
            node.children.insert(new_index, child);
        }
        self.notify(Change::ChildOrderChanged {
            parent: self.clone(),
            old_index,
            new_index,
        });
    }

    /// Points this handle at `target`'s current content while keeping its
    /// identity and observer registrations. The target's children are shared
    /// and reparented here; this handle's previous children are detached.
    pub fn redirect_to(&self, target: &Tree) {
        if self == target {
            return;
        }
        tracing::debug!(from = %self.type_name(), to = %target.type_name(), "redirecting node");
        let (type_name, props, children, valid) = {
            let node = target.node.borrow();
            (node.type_name.clone(), node.props.clone(), node.children.clone(), node.valid)
        };
        let old_children = {
            let mut node = self.node.borrow_mut();
            node.type_name = type_name;
            node.props = props;
            node.valid = valid;
            std::mem::replace(&mut node.children, children.clone())
        };
        for child in &old_children {
            if !children.contains(child) {
                child.node.borrow_mut().parent = rc::Weak::new();
            }
        }
        for child in &children {
            child.node.borrow_mut().parent = rc::Rc::downgrade(&self.node);
        }
        self.notify(Change::Redirected { node: self.clone() });
    }

    pub fn add_observer(&self, observer: rc::Weak<cell::RefCell<dyn ChangeObserver>>) -> ObserverId {
        let id = NEXT_OBSERVER_ID.fetch_add(1, sync::atomic::Ordering::Relaxed);
        self.node.borrow_mut().observers.push(ObserverSlot {
            id,
            muted: rc::Rc::new(cell::Cell::new(false)),
            observer,
        });
        ObserverId(id)
    }

    pub fn remove_observer(&self, id: ObserverId) {
        self.node.borrow_mut().observers.retain(|slot| slot.id != id.0);
    }

    /// While muted, a registration is skipped by dispatch. Used to keep a
    /// node from reacting to a mutation or read-back it is itself performing.
    pub fn set_observer_muted(&self, id: ObserverId, muted: bool) {
        if let Some(slot) = self.node.borrow().observers.iter().find(|slot| slot.id == id.0) {
            slot.muted.set(muted);
        }
    }

    /// Delivers `change` to the observers of this node and of every ancestor,
    /// origin first. Observer lists are collected up front so no node stays
    /// borrowed while handlers run; handlers may read and mutate the tree.
    fn notify(&self, change: Change) {
        let mut slots = vec::Vec::new();
        let mut cursor = Some(self.clone());
        while let Some(tree) = cursor {
            {
                let mut node = tree.node.borrow_mut();
                node.observers.retain(|slot| slot.observer.strong_count() > 0);
                slots.extend(node.observers.iter().map(|slot| (slot.muted.clone(), slot.observer.clone())));
            }
            cursor = tree.parent();
        }

        for (muted, observer) in slots {
            let observer = match observer.upgrade() {
                Some(observer) => observer,
                None => continue,
            };
            if muted.get() {
                continue;
            }
            muted.set(true);
            observer.borrow_mut().notify_change(&change);
            muted.set(false);
        }
    }
}

/// Declarative construction for fixtures and demos; fires no notifications.
pub struct Builder {
    type_name: String,
    props: vec::Vec<(String, Value)>,
    children: vec::Vec<Builder>,
}

impl Builder {
    fn new(type_name: &str) -> Builder {
        Builder {
            type_name: type_name.to_string(),
            props: vec::Vec::new(),
            children: vec::Vec::new(),
        }
    }

    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Builder {
        self.props.push((name.to_string(), value.into()));
        self
    }

    pub fn child<F: FnOnce(Builder) -> Builder>(mut self, type_name: &str, f: F) -> Builder {
        self.children.push(f(Builder::new(type_name)));
        self
    }

    pub fn build(self) -> Tree {
        let tree = Tree::new(&self.type_name);
        {
            let mut node = tree.node.borrow_mut();
            for (name, value) in self.props {
                node.props.insert(name, value);
            }
        }
        for child in self.children {
            let child = child.build();
            child.node.borrow_mut().parent = rc::Rc::downgrade(&tree.node);
            tree.node.borrow_mut().children.push(child);
        }
        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Recorder {
        seen: vec::Vec<String>,
    }

    impl ChangeObserver for Recorder {
        fn notify_change(&mut self, change: &Change) {
            self.seen.push(match change {
                Change::PropertyChanged { name, .. } => format!("prop:{}", name),
                Change::ChildAdded { .. } => "add".to_string(),
                Change::ChildRemoved { index, .. } => format!("remove:{}", index),
                Change::ChildOrderChanged { old_index, new_index, .. } => {
                    format!("move:{}->{}", old_index, new_index)
                }
                Change::ParentChanged { .. } => "parent".to_string(),
                Change::Redirected { .. } => "redirect".to_string(),
            });
        }
    }

    fn attach(tree: &Tree) -> (rc::Rc<cell::RefCell<Recorder>>, ObserverId) {
        let recorder = rc::Rc::new(cell::RefCell::new(Recorder { seen: vec![] }));
        /* unsize the strong handle first; downgrading through an annotated
         * binding would drive inference to the trait object */
        let observer: rc::Rc<cell::RefCell<dyn ChangeObserver>> = recorder.clone();
        let id = tree.add_observer(rc::Rc::downgrade(&observer));
        (recorder, id)
    }

    fn sample_tree() -> Tree {
        Tree::builder("project")
            .prop("id", "p0")
            .child("track", |b| b
                .prop("id", "t0")
                .child("clip", |b| b.prop("id", "c0")))
            .child("track", |b| b.prop("id", "t1"))
            .build()
    }

    #[test]
    fn test_property_order_is_declaration_order() {
        let tree = Tree::new("node");
        tree.set_property("b", "2");
        tree.set_property("a", "1");
        tree.set_property("b", "3"); /* rewrite keeps position */

        assert_eq!(tree.property_names(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(tree.property("b"), Some(Value::Text("3".to_string())));
        assert_eq!(tree.property_count(), 2);
    }

    #[test]
    fn test_identity_is_reference_identity() {
        let a = Tree::new("node");
        let b = Tree::new("node");
        let alias = a.clone();

        assert_eq!(a, alias);
        assert_ne!(a, b);
    }

    #[test]
    fn test_events_reach_ancestors() {
        let tree = sample_tree();
        let (recorder, _id) = attach(&tree);

        let clip = tree.child(0).unwrap().child(0).unwrap();
        clip.set_property("length", "16");

        assert_eq!(recorder.borrow().seen, vec!["prop:length".to_string()]);
    }

    #[test]
    fn test_child_events() {
        let tree = sample_tree();
        let (recorder, _id) = attach(&tree);

        let extra = Tree::new("track");
        tree.add_child(&extra, Some(1));
        assert_eq!(tree.child(1).unwrap(), extra);
        assert_eq!(extra.parent().unwrap(), tree);
        assert_eq!(extra.index_in_parent(), Some(1));

        tree.move_child(1, 2);
        assert_eq!(tree.child(2).unwrap(), extra);

        tree.remove_child(2);
        assert!(extra.parent().is_none());

        /* the observer on the root saw the adds/removes plus the detached
         * child's parent change while it was still being delivered upward */
        assert_eq!(
            recorder.borrow().seen,
            vec!["add", "parent", "move:1->2", "remove:2"]
        );
    }

    #[test]
    fn test_add_child_reparents() {
        let a = Tree::new("a");
        let b = Tree::new("b");
        let child = Tree::new("child");

        a.add_child(&child, None);
        b.add_child(&child, None);

        assert_eq!(a.child_count(), 0);
        assert_eq!(b.child_count(), 1);
        assert_eq!(child.parent().unwrap(), b);
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let tree = sample_tree();
        let track = tree.child(0).unwrap();

        track.add_child(&tree, None);

        assert_eq!(track.child_count(), 1);
        assert!(tree.parent().is_none());
    }

    #[test]
    fn test_path() {
        let tree = sample_tree();
        let clip = tree.child(0).unwrap().child(0).unwrap();

        assert_eq!(tree.path(), path::Path::new());
        assert_eq!(clip.path(), vec![0, 0]);
        assert_eq!(path::describe(&clip.path()), "0.0");
        assert_eq!(path::describe(&tree.path()), path::ROOT_DESCRIPTION);
    }

    #[test]
    fn test_remove_observer_stops_delivery() {
        let tree = Tree::new("node");
        let (recorder, id) = attach(&tree);

        tree.set_property("a", "1");
        tree.remove_observer(id);
        tree.set_property("b", "2");

        assert_eq!(recorder.borrow().seen, vec!["prop:a".to_string()]);
    }

    #[test]
    fn test_muted_observer_is_skipped() {
        let tree = Tree::new("node");
        let (recorder, id) = attach(&tree);

        tree.set_observer_muted(id, true);
        tree.set_property("a", "1");
        tree.set_observer_muted(id, false);
        tree.set_property("b", "2");

        assert_eq!(recorder.borrow().seen, vec!["prop:b".to_string()]);
    }

    /* An observer that writes back into the tree from its own handler. The
     * dispatch guard must keep it from seeing the write it caused. */
    struct EchoObserver {
        tree: Tree,
        seen: vec::Vec<String>,
    }

    impl ChangeObserver for EchoObserver {
        fn notify_change(&mut self, change: &Change) {
            if let Change::PropertyChanged { name, .. } = change {
                self.seen.push(name.clone());
                if name != "echo" {
                    self.tree.set_property("echo", "1");
                }
            }
        }
    }

    #[test]
    fn test_handler_does_not_reenter_itself() {
        let tree = Tree::new("node");
        let echo = rc::Rc::new(cell::RefCell::new(EchoObserver {
            tree: tree.clone(),
            seen: vec![],
        }));
        let observer: rc::Rc<cell::RefCell<dyn ChangeObserver>> = echo.clone();
        tree.add_observer(rc::Rc::downgrade(&observer));
        let (recorder, _id) = attach(&tree);

        tree.set_property("x", "1");

        assert_eq!(tree.property("echo"), Some(Value::Text("1".to_string())));
        /* the echoing observer never saw its own write... */
        assert_eq!(echo.borrow().seen, vec!["x".to_string()]);
        /* ...but an unrelated observer saw both */
        assert_eq!(recorder.borrow().seen, vec!["prop:echo".to_string(), "prop:x".to_string()]);
    }

    #[test]
    fn test_redirect_keeps_identity_and_observers() {
        let tree = sample_tree();
        let replacement = Tree::builder("arrangement")
            .prop("id", "a0")
            .child("scene", |b| b.prop("id", "s0"))
            .build();
        let (recorder, _id) = attach(&tree);
        let alias = tree.clone();

        tree.redirect_to(&replacement);

        assert_eq!(tree, alias);
        assert_eq!(tree.type_name(), "arrangement");
        assert_eq!(tree.child_count(), 1);
        assert_eq!(tree.child(0).unwrap().parent().unwrap(), tree);
        assert_eq!(recorder.borrow().seen, vec!["redirect".to_string()]);

        /* mutations in the adopted subtree now reach the old handle's observers */
        tree.child(0).unwrap().set_property("name", "intro");
        assert_eq!(recorder.borrow().seen, vec!["redirect".to_string(), "prop:name".to_string()]);
    }

    #[test]
    fn test_invalid_handle_is_inert() {
        let tree = Tree::invalid();
        let (recorder, _id) = attach(&tree);

        tree.set_property("a", "1");
        tree.add_child(&Tree::new("child"), None);
        tree.remove_property("a");

        assert!(!tree.is_valid());
        assert_eq!(tree.property_count(), 0);
        assert_eq!(tree.child_count(), 0);
        assert_eq!(recorder.borrow().seen, Vec::<String>::new());
    }

    #[test]
    fn test_builder_shape() {
        let tree = sample_tree();

        assert_eq!(tree.type_name(), "project");
        assert_eq!(tree.child_count(), 2);
        assert_eq!(tree.child(0).unwrap().type_name(), "track");
        assert_eq!(tree.child(0).unwrap().child(0).unwrap().type_name(), "clip");
        assert_eq!(tree.child(1).unwrap().parent().unwrap(), tree);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Text("abc".to_string()).display_text(), "abc");
        assert_eq!(Value::Void.display_text(), "");
        assert_eq!(Value::Object(rc::Rc::new(5u32)).display_text(), "[object]");
        assert!(Value::Object(rc::Rc::new(5u32)).is_object());
    }
}
