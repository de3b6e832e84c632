use crate::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

/// Tag, attributes, class list and inline style of one element.
///
/// `class` and `style` are kept apart from the generic attribute list so the
/// builder can add classes and style properties one at a time; the
/// serializer folds them back into attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub classes: Vec<String>,
    pub style: Vec<(String, String)>,
}

impl ElementData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            slot.1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|(key, _)| key == name)?;
        Some(self.attrs.remove(pos).1)
    }

    /// Returns `false` when the class was already present.
    pub fn add_class(&mut self, class: &str) -> bool {
        if self.classes.iter().any(|c| c == class) {
            return false;
        }
        self.classes.push(class.to_string());
        true
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn set_style(&mut self, property: &str, value: &str) {
        if let Some(slot) = self.style.iter_mut().find(|(key, _)| key == property) {
            slot.1 = value.to_string();
        } else {
            self.style.push((property.to_string(), value.to_string()));
        }
    }

    pub fn style_value(&self, property: &str) -> Option<&str> {
        self.style
            .iter()
            .find(|(key, _)| key == property)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn element(tag: String) -> Self {
        Self {
            kind: NodeKind::Element(ElementData::new(tag)),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn text(content: String) -> Self {
        Self {
            kind: NodeKind::Text(content),
            parent: None,
            children: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_attr_replaces_in_place() {
        let mut el = ElementData::new("a");
        el.set_attr("href", "/one");
        el.set_attr("title", "t");
        el.set_attr("href", "/two");

        assert_eq!(el.attr("href"), Some("/two"));
        assert_eq!(el.attrs[0].0, "href");
        assert_eq!(el.attrs.len(), 2);
    }

    #[test]
    fn test_add_class_dedupes() {
        let mut el = ElementData::new("div");
        assert!(el.add_class("card"));
        assert!(!el.add_class("card"));
        assert_eq!(el.classes, vec!["card".to_string()]);
    }
}
