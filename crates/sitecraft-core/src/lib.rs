//! sitecraft core crate.
//!
//! A small arena-backed HTML document model. The compiler in `sitecraft-web`
//! treats it as an opaque collaborator that can:
//!
//! - create element and text nodes (`Document::create_element`, `create_text`)
//! - mutate attributes, classes, inline style and text content
//! - attach, detach and remove subtrees
//! - serialize any node, or a whole document, to HTML5 text
//!
//! Nodes are addressed by [`NodeId`]. Slots are never reused, so a stale id
//! can only ever resolve to `DomError::MissingNode`, never to a different
//! node.

mod document;
mod error;
mod node;
mod serialize;

pub use document::Document;
pub use error::DomError;
pub use node::{ElementData, NodeKind};
pub use serialize::{
    escape_attribute, escape_text, is_raw_text_element, is_void_element, serialize_document,
    serialize_node,
};

/// Index of a node inside a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
