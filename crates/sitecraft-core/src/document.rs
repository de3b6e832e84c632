use crate::node::Node;
use crate::serialize::is_void_element;
use crate::{DomError, ElementData, NodeId, NodeKind};

/// Arena of element and text nodes.
///
/// Nodes start detached. Attaching a node that already has a parent moves
/// it, the same way DOM `appendChild` does.
#[derive(Debug, Default, Clone)]
pub struct Document {
    nodes: Vec<Option<Node>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn create_element(&mut self, tag: &str) -> Result<NodeId, DomError> {
        if !is_valid_tag_name(tag) {
            return Err(DomError::InvalidTagName(tag.to_string()));
        }
        Ok(self.push(Node::element(tag.to_ascii_lowercase())))
    }

    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.push(Node::text(content.into()))
    }

    pub fn kind(&self, id: NodeId) -> Result<&NodeKind, DomError> {
        Ok(&self.node(id)?.kind)
    }

    pub fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        match &self.node(id)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Text(_) => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).ok().map(|el| el.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|node| node.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// Sets an attribute. `class` replaces the class list and `style`
    /// replaces the inline declarations, so both stay mergeable with
    /// `add_class` / `set_style`.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        if !is_valid_attribute_name(name) {
            return Err(DomError::InvalidAttributeName(name.to_string()));
        }
        let name = name.to_ascii_lowercase();
        let el = self.element_mut(id)?;
        match name.as_str() {
            "class" => {
                el.classes.clear();
                for class in value.split_whitespace() {
                    el.add_class(class);
                }
            }
            "style" => {
                el.style.clear();
                for decl in value.split(';') {
                    let Some((prop, val)) = decl.split_once(':') else {
                        continue;
                    };
                    let prop = prop.trim();
                    if !prop.is_empty() {
                        el.set_style(prop, val.trim());
                    }
                }
            }
            _ => el.set_attr(&name, value),
        }
        Ok(())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).ok().and_then(|el| el.attr(name))
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>, DomError> {
        Ok(self.element_mut(id)?.remove_attr(name))
    }

    /// Adds every whitespace-separated class in `classes`.
    pub fn add_class(&mut self, id: NodeId, classes: &str) -> Result<(), DomError> {
        let el = self.element_mut(id)?;
        for class in classes.split_whitespace() {
            el.add_class(class);
        }
        Ok(())
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> Result<(), DomError> {
        self.element_mut(id)?.set_style(property, value);
        Ok(())
    }

    /// Replaces all children with a single text node. Former element
    /// children are detached, not destroyed. On a text node this rewrites
    /// its content.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        if let NodeKind::Text(content) = &mut self.node_mut(id)?.kind {
            *content = text.to_string();
            return Ok(());
        }

        for child in self.clear_children(id)? {
            if matches!(self.kind(child), Ok(NodeKind::Text(_))) {
                self.remove(child)?;
            }
        }
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.append_child(id, text_node)?;
        }
        Ok(())
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Ok(node) = self.node(id) else {
            return;
        };
        if let NodeKind::Text(content) = &node.kind {
            out.push_str(content);
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let tag = self.element(parent)?.tag.clone();
        if is_void_element(&tag) {
            return Err(DomError::VoidElement { tag });
        }
        self.node(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }

        self.detach(child)?;
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Unlinks `id` from its parent. A no-op for detached nodes.
    pub fn detach(&mut self, id: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        if let Ok(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|c| *c != id);
        }
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Detaches and returns every child of `id`, in order.
    pub fn clear_children(&mut self, id: NodeId) -> Result<Vec<NodeId>, DomError> {
        let children = std::mem::take(&mut self.node_mut(id)?.children);
        for child in &children {
            if let Ok(node) = self.node_mut(*child) {
                node.parent = None;
            }
        }
        Ok(children)
    }

    /// Detaches `id` and frees it together with its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        self.detach(id)?;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current.index()).and_then(Option::take) {
                stack.extend(node.children);
            }
        }
        Ok(())
    }

    /// True when `ancestor == node` or `ancestor` appears on the parent chain
    /// of `node`.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(DomError::MissingNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(DomError::MissingNode(id))
    }
}

/// ASCII letter first, then letters, digits or `-` (custom elements).
fn is_valid_tag_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphabetic() && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            !c.is_whitespace()
                && !c.is_control()
                && !matches!(c, '"' | '\'' | '>' | '<' | '/' | '=')
        })
}
