use std::cell;
use std::rc;

use crate::view::node;
use crate::view::props_editor::PropsEditor;

/// Couples "which row is selected" to "what the properties editor shows".
/// At most one node is selected; selecting it routes its tree node into the
/// editor, deselecting (or selecting nothing) empties the editor.
pub struct SelectionBinding {
    editor: rc::Rc<cell::RefCell<PropsEditor>>,
    selected: cell::RefCell<Option<rc::Weak<cell::RefCell<node::ViewNode>>>>,
}

impl SelectionBinding {
    pub(super) fn new() -> SelectionBinding {
        SelectionBinding {
            editor: rc::Rc::new(cell::RefCell::new(PropsEditor::new())),
            selected: cell::RefCell::new(None),
        }
    }

    pub fn editor(&self) -> &rc::Rc<cell::RefCell<PropsEditor>> {
        &self.editor
    }

    pub fn selected(&self) -> Option<node::ViewNodeHandle> {
        self.selected.borrow().as_ref().and_then(rc::Weak::upgrade)
    }

    pub fn select(&self, target: Option<&node::ViewNodeHandle>) {
        if target.is_none() && self.selected.borrow().is_none() {
            return;
        }
        if let (Some(target), Some(current)) = (target, self.selected()) {
            if rc::Rc::ptr_eq(target, &current) {
                return;
            }
        }

        if let Some(previous) = self.selected() {
            previous.borrow_mut().set_selected(false);
        }
        *self.selected.borrow_mut() = target.map(rc::Rc::downgrade);

        match target {
            Some(target) => {
                let tree = {
                    let mut node = target.borrow_mut();
                    node.set_selected(true);
                    node.tree()
                };
                /* keep the node's own change handler out of the rebind */
                target.borrow().set_observer_muted(true);
                self.editor.borrow_mut().bind(tree.as_ref());
                target.borrow().set_observer_muted(false);
            }
            None => self.editor.borrow_mut().bind(None),
        }
    }

    pub fn clear(&self) {
        self.select(None);
    }
}
