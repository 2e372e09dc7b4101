pub mod hierarchy;
pub mod node;
pub mod props_editor;
pub mod selection;

use std::cell;
use std::rc;

/// State shared by every view node in one hierarchy: the selection binding
/// and the coarse "something changed" hook a host can use to schedule a
/// relayout without interpreting individual change events.
pub struct Context {
    binding: selection::SelectionBinding,
    tree_changed: cell::RefCell<Option<Box<dyn Fn()>>>,
}

impl Context {
    pub fn new() -> rc::Rc<Context> {
        rc::Rc::new(Context {
            binding: selection::SelectionBinding::new(),
            tree_changed: cell::RefCell::new(None),
        })
    }

    pub fn binding(&self) -> &selection::SelectionBinding {
        &self.binding
    }

    pub fn set_tree_changed_hook(&self, hook: Option<Box<dyn Fn()>>) {
        *self.tree_changed.borrow_mut() = hook;
    }

    pub(crate) fn signal_tree_changed(&self) {
        if let Some(hook) = self.tree_changed.borrow().as_ref() {
            hook();
        }
    }
}
