use crate::behavior::Handler;
use crate::config::AppendPolicy;
use crate::engine::Workspace;
use crate::style::{Declarations, to_kebab_case};
use crate::{Error, Result};
use sitecraft_core::{NodeId, serialize_node};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Handle to one element of an engine's document.
///
/// Cloning the handle does not clone the element. Every mutator returns the
/// handle again, so calls chain with `?`:
///
/// ```ignore
/// engine.div()?.set_text("hello")?.add_class("greeting")?;
/// ```
#[derive(Clone)]
pub struct Element {
    node: NodeId,
    tag: String,
    ws: Weak<RefCell<Workspace>>,
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("node", &self.node)
            .field("tag", &self.tag)
            .finish()
    }
}

impl Element {
    pub(crate) fn new(node: NodeId, tag: String, ws: &Rc<RefCell<Workspace>>) -> Self {
        Self {
            node,
            tag,
            ws: Rc::downgrade(ws),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub(crate) fn belongs_to(&self, ws: &Rc<RefCell<Workspace>>) -> bool {
        std::ptr::eq(self.ws.as_ptr(), Rc::as_ptr(ws))
    }

    fn workspace(&self) -> Result<Rc<RefCell<Workspace>>> {
        self.ws.upgrade().ok_or(Error::Detached(self.node))
    }

    fn read<T>(&self, f: impl FnOnce(&Workspace) -> T) -> Option<T> {
        let ws = self.ws.upgrade()?;
        let ws = ws.borrow();
        Some(f(&*ws))
    }

    fn update(&self, f: impl FnOnce(&mut Workspace) -> Result<()>) -> Result<&Self> {
        let ws = self.workspace()?;
        let mut ws = ws.borrow_mut();
        f(&mut *ws)?;
        Ok(self)
    }

    /// Current `id` attribute, if any.
    pub fn identifier(&self) -> Option<String> {
        self.attribute("id")
    }

    pub fn text(&self) -> String {
        self.read(|ws| ws.doc.text_content(self.node))
            .unwrap_or_default()
    }

    /// Attribute value as it will be serialized; `class` and `style` are
    /// folded from the class list and inline declarations.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.read(|ws| {
            let el = ws.doc.element(self.node).ok()?;
            match name {
                "class" if !el.classes.is_empty() => Some(el.classes.join(" ")),
                "style" if !el.style.is_empty() => Some(
                    el.style
                        .iter()
                        .map(|(k, v)| format!("{k}: {v}"))
                        .collect::<Vec<_>>()
                        .join("; "),
                ),
                "class" | "style" => None,
                _ => el.attr(name).map(str::to_string),
            }
        })
        .flatten()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.read(|ws| {
            ws.doc
                .element(self.node)
                .is_ok_and(|el| el.has_class(class))
        })
        .unwrap_or(false)
    }

    /// Markup of this element and its subtree.
    pub fn to_html(&self) -> String {
        self.read(|ws| serialize_node(&ws.doc, self.node))
            .unwrap_or_default()
    }

    /// Fails with `IdentifierLocked` once behavior, a binding or a reference
    /// already targets a different id.
    pub fn set_id(&self, id: &str) -> Result<&Self> {
        self.update(|ws| {
            if ws.hooked.contains(&self.node) {
                let current = ws.doc.attribute(self.node, "id").unwrap_or_default();
                if current != id {
                    return Err(Error::IdentifierLocked {
                        node: self.node,
                        id: current.to_string(),
                    });
                }
            }
            ws.doc.set_attribute(self.node, "id", id)?;
            Ok(())
        })
    }

    /// Replaces the children with one text node; markup in `text` is
    /// escaped on output.
    pub fn set_text(&self, text: &str) -> Result<&Self> {
        self.update(|ws| Ok(ws.doc.set_text_content(self.node, text)?))
    }

    pub fn set_attribute(&self, name: &str, value: &str) -> Result<&Self> {
        if name.eq_ignore_ascii_case("id") {
            return self.set_id(value);
        }
        self.update(|ws| Ok(ws.doc.set_attribute(self.node, name, value)?))
    }

    /// Merges declarations into the `style` attribute. Camel-case keys are
    /// converted to kebab case.
    pub fn set_inline_style(&self, declarations: impl Into<Declarations>) -> Result<&Self> {
        let declarations = declarations.into();
        self.update(|ws| {
            for (property, value) in declarations.iter() {
                ws.doc
                    .set_style(self.node, &to_kebab_case(property.trim()), value.trim())?;
            }
            Ok(())
        })
    }

    /// Adds every whitespace-separated class in `classes`.
    pub fn add_class(&self, classes: &str) -> Result<&Self> {
        self.update(|ws| Ok(ws.doc.add_class(self.node, classes)?))
    }

    pub fn add_classes<I, S>(&self, classes: I) -> Result<&Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.update(|ws| {
            for class in classes {
                ws.doc.add_class(self.node, class.as_ref())?;
            }
            Ok(())
        })
    }

    /// Allocates a fresh class, registers `declarations` under it and
    /// applies it. A rejected rule is logged and the class is not applied.
    pub fn generate_scoped_class(&self, declarations: impl Into<Declarations>) -> Result<&Self> {
        let declarations = declarations.into();
        self.update(|ws| {
            let class = ws.ids.allocate_class_name();
            match ws.buffers.styles.define_rule(&class, &declarations, false) {
                Ok(()) => ws.doc.add_class(self.node, &class)?,
                Err(err) => {
                    tracing::warn!("[sitecraft:style] scoped class for <{}> dropped: {err}", self.tag)
                }
            }
            Ok(())
        })
    }

    /// Keeps the text of this element equal to the client state `key`.
    pub fn bind_text(&self, key: &str) -> Result<&Self> {
        self.bind(key, None)
    }

    /// Like [`Element::bind_text`], rendering `transform(value)` instead.
    /// A body handler receives the new value as `value`.
    pub fn bind_text_with(&self, key: &str, transform: impl Into<Handler>) -> Result<&Self> {
        self.bind(key, Some(transform.into()))
    }

    fn bind(&self, key: &str, transform: Option<Handler>) -> Result<&Self> {
        if let Some(transform) = &transform {
            transform.validate()?;
        }
        self.update(|ws| {
            let id = ws.ensure_identifier(self.node)?;
            ws.buffers
                .behaviors
                .record_state_watch(key, &id, transform)
        })
    }

    /// Makes this element reachable as `$refs.get(name)` on the client.
    pub fn register_reference(&self, name: &str) -> Result<&Self> {
        self.update(|ws| {
            let id = ws.ensure_identifier(self.node)?;
            ws.buffers.refs.register(name, &id);
            Ok(())
        })
    }

    /// Attaches a client-side listener. A body handler receives the DOM
    /// event as `event`.
    pub fn on(&self, event: &str, handler: impl Into<Handler>) -> Result<&Self> {
        let handler = handler.into();
        handler.validate()?;
        self.update(|ws| {
            let id = ws.ensure_identifier(self.node)?;
            ws.buffers.behaviors.record_event(&id, event, handler)
        })
    }

    pub fn on_click(&self, handler: impl Into<Handler>) -> Result<&Self> {
        self.on("click", handler)
    }

    pub fn append(&self, child: impl Into<Child>) -> Result<&Self> {
        self.append_children([child.into()])
    }

    /// Appends every item in order, flattening nested lists and skipping
    /// `None` and empty text.
    ///
    /// Items that cannot be attached follow the engine's [`AppendPolicy`].
    /// Under `Strict` the first such item aborts with `InvalidChild`; items
    /// before it stay attached.
    pub fn append_children<I>(&self, items: I) -> Result<&Self>
    where
        I: IntoIterator,
        I::Item: Into<Child>,
    {
        let mut flat = Vec::new();
        for item in items {
            item.into().flatten_into(&mut flat);
        }

        let ws_rc = self.workspace()?;
        let mut ws = ws_rc.borrow_mut();
        let policy = ws.config.append;

        for child in flat {
            let outcome = match child {
                Child::Element(el) if !el.belongs_to(&ws_rc) => {
                    Err(format!("<{}> belongs to another engine", el.tag))
                }
                Child::Element(el) => ws
                    .doc
                    .append_child(self.node, el.node)
                    .map_err(|err| err.to_string()),
                Child::Node(id) => ws
                    .doc
                    .append_child(self.node, id)
                    .map_err(|err| err.to_string()),
                Child::Text(text) => {
                    let id = ws.doc.create_text(text);
                    ws.doc.append_child(self.node, id).map_err(|err| {
                        let _ = ws.doc.remove(id);
                        err.to_string()
                    })
                }
                Child::Many(_) | Child::Skip => Ok(()),
            };

            if let Err(reason) = outcome {
                match policy {
                    AppendPolicy::Strict => {
                        return Err(Error::InvalidChild(format!(
                            "cannot append to <{}>: {reason}",
                            self.tag
                        )));
                    }
                    AppendPolicy::Lenient => {
                        tracing::warn!(
                            "[sitecraft:element] skipped child of <{}>: {reason}",
                            self.tag
                        );
                    }
                }
            }
        }
        Ok(self)
    }

    /// Creates a `tag` element, appends it here and returns it.
    pub fn create_child(&self, tag: &str) -> Result<Element> {
        let ws_rc = self.workspace()?;
        let mut ws = ws_rc.borrow_mut();
        let node = ws.doc.create_element(tag)?;
        if let Err(err) = ws.doc.append_child(self.node, node) {
            let _ = ws.doc.remove(node);
            return Err(err.into());
        }
        let tag = ws.doc.tag_name(node).unwrap_or(tag).to_string();
        Ok(Element::new(node, tag, &ws_rc))
    }
}

/// Anything `append_children` accepts.
#[derive(Debug, Clone)]
pub enum Child {
    Element(Element),
    /// Raw node of the same engine's document.
    Node(NodeId),
    Text(String),
    Many(Vec<Child>),
    Skip,
}

impl Child {
    fn flatten_into(self, out: &mut Vec<Child>) {
        match self {
            Child::Many(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
            Child::Skip => {}
            Child::Text(text) if text.is_empty() => {}
            other => out.push(other),
        }
    }
}

impl From<Element> for Child {
    fn from(el: Element) -> Self {
        Child::Element(el)
    }
}

impl From<&Element> for Child {
    fn from(el: &Element) -> Self {
        Child::Element(el.clone())
    }
}

impl From<NodeId> for Child {
    fn from(id: NodeId) -> Self {
        Child::Node(id)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(item: Option<T>) -> Self {
        item.map_or(Child::Skip, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::Many(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Child>, const N: usize> From<[T; N]> for Child {
    fn from(items: [T; N]) -> Self {
        Child::Many(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{AppendPolicy, EngineConfig};
    use crate::{Child, Engine, Error, Handler};

    fn lenient() -> Engine {
        Engine::with_config(EngineConfig {
            append: AppendPolicy::Lenient,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn test_mutators_chain() {
        let engine = Engine::new();
        let card = engine.div().unwrap();
        card.set_attribute("data-kind", "card")
            .unwrap()
            .add_class("card  wide")
            .unwrap()
            .set_inline_style([("backgroundColor", "#fff"), ("marginTop", "4px")])
            .unwrap()
            .set_text("hi")
            .unwrap();

        assert_eq!(
            card.to_html(),
            r#"<div data-kind="card" class="card wide" style="background-color: #fff; margin-top: 4px">hi</div>"#
        );
        assert!(card.has_class("wide"));
        assert_eq!(card.text(), "hi");
    }

    #[test]
    fn test_hooks_assign_an_identifier_once() {
        let engine = Engine::new();
        let button = engine.button().unwrap();
        assert_eq!(button.identifier(), None);

        button.on_click("go()").unwrap();
        let id = button.identifier().unwrap();
        button.register_reference("go").unwrap();
        button.bind_text("label").unwrap();

        assert_eq!(button.identifier().unwrap(), id);
        assert_eq!(engine.reference("go").as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_existing_identifier_is_reused() {
        let engine = Engine::new();
        let panel = engine.div().unwrap();
        panel.set_id("panel").unwrap().register_reference("panel").unwrap();

        assert_eq!(engine.reference("panel").as_deref(), Some("panel"));
        assert!(panel.set_id("panel").is_ok());
        assert!(matches!(
            panel.set_id("other"),
            Err(Error::IdentifierLocked { .. })
        ));
        assert!(matches!(
            panel.set_attribute("ID", "other"),
            Err(Error::IdentifierLocked { .. })
        ));
    }

    #[test]
    fn test_invalid_handler_leaves_element_untouched() {
        let engine = Engine::new();
        let button = engine.button().unwrap();

        assert!(matches!(
            button.on_click(""),
            Err(Error::InvalidHandler(_))
        ));
        assert!(matches!(
            button.bind_text_with("k", Handler::callable("nope")),
            Err(Error::InvalidHandler(_))
        ));
        assert_eq!(button.identifier(), None);
    }

    #[test]
    fn test_append_children_flattens_and_skips() {
        let engine = Engine::new();
        let list = engine.create_element("ul").unwrap();
        let a = engine.create_element("li").unwrap();
        let b = engine.create_element("li").unwrap();
        let c = engine.create_element("li").unwrap();
        a.set_text("a").unwrap();
        b.set_text("b").unwrap();
        c.set_text("c").unwrap();

        let hidden: Option<&str> = None;
        list.append_children(vec![
            Child::from(&a),
            Child::from(vec![b.clone(), c.clone()]),
            Child::from(hidden),
            Child::from(""),
        ])
        .unwrap();

        assert_eq!(
            list.to_html(),
            "<ul><li>a</li><li>b</li><li>c</li></ul>"
        );
    }

    #[test]
    fn test_text_children_are_escaped() {
        let engine = Engine::new();
        let p = engine.paragraph().unwrap();
        p.append_children(["1 < 2", " & more"]).unwrap();

        assert_eq!(p.to_html(), "<p>1 &lt; 2 &amp; more</p>");
    }

    #[test]
    fn test_strict_append_rejects_foreign_element() {
        let engine = Engine::new();
        let other = Engine::new();
        let host = engine.div().unwrap();
        let stranger = other.span().unwrap();

        assert!(matches!(
            host.append(&stranger),
            Err(Error::InvalidChild(_))
        ));
        assert!(host.to_html().starts_with("<div></div>"));
    }

    #[test]
    fn test_lenient_append_skips_bad_items() {
        let engine = lenient();
        let other = Engine::new();
        let host = engine.div().unwrap();
        let ok = engine.span().unwrap();

        host.append_children(vec![
            Child::from(other.span().unwrap()),
            Child::from(host.clone()),
            Child::from(&ok),
        ])
        .unwrap();

        assert_eq!(host.to_html(), "<div><span></span></div>");
    }

    #[test]
    fn test_void_parent_and_cycle_are_rejected() {
        let engine = Engine::new();
        let img = engine.create_element("img").unwrap();
        assert!(matches!(img.append("x"), Err(Error::InvalidChild(_))));
        assert!(img.create_child("span").is_err());

        let outer = engine.div().unwrap();
        let inner = outer.create_child("section").unwrap();
        assert!(matches!(inner.append(&outer), Err(Error::InvalidChild(_))));
    }

    #[test]
    fn test_create_child_appends() {
        let engine = Engine::new();
        let nav = engine.create_element("nav").unwrap();
        let link = nav.create_child("A").unwrap();
        link.set_attribute("href", "/").unwrap();

        assert_eq!(link.tag(), "a");
        assert_eq!(nav.to_html(), r#"<nav><a href="/"></a></nav>"#);
    }

    #[test]
    fn test_handle_outliving_engine() {
        let el = {
            let engine = Engine::new();
            engine.div().unwrap()
        };
        assert!(matches!(el.set_text("x"), Err(Error::Detached(_))));
        assert_eq!(el.text(), "");
    }

    #[test]
    fn test_scoped_class() {
        let engine = Engine::new();
        let box_el = engine.div().unwrap();
        box_el
            .generate_scoped_class([("paddingTop", "2px")])
            .unwrap()
            .generate_scoped_class([("color", "red; }")])
            .unwrap();

        let class = box_el.attribute("class").unwrap();
        assert!(class.starts_with("sc-c-1-"));
        assert!(!class.contains(' '));
        assert_eq!(engine.pending().styles, 1);
    }
}
