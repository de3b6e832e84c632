use crate::NodeId;

/// Errors raised by document mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("invalid tag name: {0:?}")]
    InvalidTagName(String),

    #[error("invalid attribute name: {0:?}")]
    InvalidAttributeName(String),

    #[error("node {0} does not exist in this document")]
    MissingNode(NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("<{tag}> is a void element and cannot have children")]
    VoidElement { tag: String },

    #[error("cannot append {child} to {parent}: the child is the parent or one of its ancestors")]
    HierarchyRequest { parent: NodeId, child: NodeId },
}
