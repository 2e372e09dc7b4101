use std::vec;

use crate::model::tree::{Tree, Value, WeakTree};
use crate::util;

/// Displayed in place of a value the editor cannot represent as text.
pub const NOT_EDITABLE_TEXT: &str = "not editable";

/// Identity-carrying property; always read-only.
pub const ID_KEY: &str = "id";

/// The one property rendered as a multiline field.
pub const DESCRIPTION_KEY: &str = "description";

pub const MAX_FIELD_CHARS: usize = 200;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub text: String,
    pub multiline: bool,
    pub editable: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("no field named '{0}'")]
    UnknownField(String),
    #[error("field '{0}' is not editable")]
    NotEditable(String),
    #[error("the edited node is no longer part of a live tree")]
    InvalidNode,
}

/// Projects the bound node's properties into a flat list of labelled text
/// fields. Holds no strong reference to the node, so an editor left bound to
/// a discarded subtree simply goes empty.
pub struct PropsEditor {
    source: Option<WeakTree>,
    fields: vec::Vec<Field>,
    bind_generation: u64,
}

impl PropsEditor {
    pub fn new() -> PropsEditor {
        PropsEditor {
            source: None,
            fields: vec::Vec::new(),
            bind_generation: 0,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The bound node, if it is still alive and valid.
    pub fn source(&self) -> Option<Tree> {
        self.source
            .as_ref()
            .and_then(WeakTree::upgrade)
            .filter(Tree::is_valid)
    }

    /// Bumped on every (re)bind, including binding to nothing.
    pub fn bind_generation(&self) -> u64 {
        self.bind_generation
    }

    pub fn bind(&mut self, source: Option<&Tree>) {
        self.source = source.map(Tree::downgrade);
        self.bind_generation += 1;
        self.fields = self.project();
    }

    /// Reprojects the bound node and replaces the fields only when something
    /// actually differs. Returns whether they were replaced, so a caller can
    /// skip redisplaying the editor for a write it performed itself.
    pub fn refresh(&mut self) -> bool {
        let projected = self.project();
        if projected != self.fields {
            self.fields = projected;
            true
        } else {
            false
        }
    }

    fn project(&self) -> vec::Vec<Field> {
        let source = match self.source() {
            Some(source) => source,
            None => return vec::Vec::new(),
        };

        let mut fields = vec::Vec::new();
        for (name, value) in source.properties() {
            /* only text values have a live, writable rendering */
            let (text, editable) = match &value {
                Value::Text(text) => (
                    util::truncate_display(text, MAX_FIELD_CHARS).into_owned(),
                    name != ID_KEY,
                ),
                _ => (NOT_EDITABLE_TEXT.to_string(), false),
            };
            fields.push(Field {
                multiline: name == DESCRIPTION_KEY,
                label: name,
                text,
                editable,
            });
        }

        fields
    }

    /// Validates an edit and records it locally, but does not touch the tree.
    /// The caller applies the returned write after releasing its borrow of
    /// the editor, so change handlers that look back into the editor can run.
    pub fn stage_edit(&mut self, label: &str, text: &str) -> Result<(Tree, Value), CommitError> {
        /* a dead or invalid source is reported as such even when the stale
         * field list no longer carries the label */
        let source = match self.source.as_ref().and_then(WeakTree::upgrade).filter(Tree::is_valid) {
            Some(source) => source,
            None => return Err(CommitError::InvalidNode),
        };

        let field = self
            .fields
            .iter_mut()
            .find(|field| field.label == label)
            .ok_or_else(|| CommitError::UnknownField(label.to_string()))?;

        if !field.editable {
            return Err(CommitError::NotEditable(label.to_string()));
        }

        /* field keeps the truncated form the next projection will produce */
        field.text = util::truncate_display(text, MAX_FIELD_CHARS).into_owned();
        Ok((source, Value::Text(text.to_string())))
    }
}

impl Default for PropsEditor {
    fn default() -> PropsEditor {
        PropsEditor::new()
    }
}
