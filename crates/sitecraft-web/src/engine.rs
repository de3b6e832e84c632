//! Render engine: owns the document and every build-time buffer, and
//! compiles them into one HTML document on request.

use crate::behavior::{BehaviorBuffer, Handler};
use crate::config::{EngineConfig, FlushPolicy, HeadConfig};
use crate::element::Element;
use crate::ids::IdAllocator;
use crate::jsminify::minify_js;
use crate::refs::ReferenceMap;
use crate::runtime::compose_bootstrap;
use crate::state::StateTable;
use crate::style::{Declarations, StyleRegistry};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use sitecraft_core::{Document, NodeId, serialize_document};
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;

const DEFAULT_LANG: &str = "en";
const DEFAULT_VIEWPORT: &str = "width=device-width, initial-scale=1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPhase {
    #[default]
    Idle,
    Compiling,
    Compiled,
}

/// Entry counts of the buffers the next render will flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pending {
    pub styles: usize,
    pub behaviors: usize,
    pub references: usize,
    pub state: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Buffers {
    pub(crate) styles: StyleRegistry,
    pub(crate) behaviors: BehaviorBuffer,
    pub(crate) refs: ReferenceMap,
    pub(crate) state: StateTable,
}

#[derive(Debug, Clone, Copy)]
struct Shell {
    html: NodeId,
    head: NodeId,
    body: NodeId,
    script: Option<NodeId>,
}

#[derive(Debug)]
pub(crate) struct Workspace {
    pub(crate) config: EngineConfig,
    pub(crate) doc: Document,
    pub(crate) ids: IdAllocator,
    pub(crate) buffers: Buffers,
    /// Elements whose id is referenced by behavior, a binding or the
    /// reference table.
    pub(crate) hooked: HashSet<NodeId>,
    shell: Option<Shell>,
    phase: RenderPhase,
    last_rendered: Option<String>,
}

impl Workspace {
    fn new(config: EngineConfig) -> Self {
        Self {
            ids: IdAllocator::new(&config.ids),
            config,
            doc: Document::new(),
            buffers: Buffers::default(),
            hooked: HashSet::new(),
            shell: None,
            phase: RenderPhase::Idle,
            last_rendered: None,
        }
    }

    /// Returns the element's id, allocating one first if it has none. The
    /// id is locked from then on.
    pub(crate) fn ensure_identifier(&mut self, node: NodeId) -> Result<String> {
        let id = match self.doc.attribute(node, "id") {
            Some(existing) if !existing.is_empty() => existing.to_string(),
            _ => {
                let id = self.ids.allocate_element_id();
                self.doc.set_attribute(node, "id", &id)?;
                id
            }
        };
        self.hooked.insert(node);
        Ok(id)
    }

    fn compile(&mut self, roots: &[NodeId], head: &HeadConfig) -> Result<String> {
        let body = self.shell.map(|shell| shell.body);
        let mut seen = HashSet::new();
        for &root in roots {
            if self.doc.element(root).is_err() {
                return Err(Error::Render(format!("root {root} is not a live element")));
            }
            if !seen.insert(root) {
                return Err(Error::Render(format!("root {root} is mounted twice")));
            }
            // Mounting moves the node; a nested root would leave its parent
            // for good.
            if let Some(parent) = self.doc.parent(root).filter(|&p| Some(p) != body) {
                return Err(Error::Render(format!(
                    "root {root} is a child of <{}> {parent}; mount the outermost element",
                    self.doc.tag_name(parent).unwrap_or("?")
                )));
            }
        }

        let shell = self.reset_shell()?;
        let lang = head.lang.as_deref().unwrap_or(DEFAULT_LANG);
        self.doc.set_attribute(shell.html, "lang", lang)?;
        self.build_head(shell.head, head)?;

        for &root in roots {
            self.doc.append_child(shell.body, root)?;
        }

        let source = self.compose_script()?;
        let script = self.doc.create_element("script")?;
        self.doc.set_text_content(script, &source)?;
        self.doc.append_child(shell.body, script)?;
        self.shell = Some(Shell {
            script: Some(script),
            ..shell
        });

        Ok(serialize_document(&self.doc, shell.html))
    }

    /// Empties head and body. Former roots are detached and stay usable;
    /// generated head nodes and the old script are freed.
    fn reset_shell(&mut self) -> Result<Shell> {
        let shell = match self.shell {
            Some(shell) => shell,
            None => {
                let html = self.doc.create_element("html")?;
                let head = self.doc.create_element("head")?;
                let body = self.doc.create_element("body")?;
                self.doc.append_child(html, head)?;
                self.doc.append_child(html, body)?;
                Shell {
                    html,
                    head,
                    body,
                    script: None,
                }
            }
        };

        for child in self.doc.clear_children(shell.head)? {
            self.doc.remove(child)?;
        }
        self.doc.clear_children(shell.body)?;
        if let Some(script) = shell.script {
            self.doc.remove(script)?;
        }

        let shell = Shell {
            script: None,
            ..shell
        };
        self.shell = Some(shell);
        Ok(shell)
    }

    fn build_head(&mut self, head_el: NodeId, head: &HeadConfig) -> Result<()> {
        self.head_child(head_el, "meta", &[("charset", "utf-8")])?;

        let title_text = head
            .title
            .clone()
            .unwrap_or_else(|| self.config.default_title.clone());
        let title = self.head_child(head_el, "title", &[])?;
        self.doc.set_text_content(title, &title_text)?;

        if !head.has_viewport() {
            self.head_child(
                head_el,
                "meta",
                &[("name", "viewport"), ("content", DEFAULT_VIEWPORT)],
            )?;
        }
        for tag in &head.meta {
            let attrs: Vec<(&str, &str)> =
                tag.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            self.head_child(head_el, "meta", &attrs)?;
        }
        for src in &head.scripts {
            self.head_child(head_el, "script", &[("src", src.as_str())])?;
        }
        for href in &head.css {
            self.head_child(head_el, "link", &[("rel", "stylesheet"), ("href", href.as_str())])?;
        }
        if let Some(icon) = &head.icon {
            self.head_child(head_el, "link", &[("rel", "icon"), ("href", icon.as_str())])?;
        }

        let style = self.head_child(head_el, "style", &[])?;
        let css = self.buffers.styles.flush();
        if !css.is_empty() {
            self.doc.set_text_content(style, &css)?;
        }
        Ok(())
    }

    fn head_child(&mut self, head: NodeId, tag: &str, attrs: &[(&str, &str)]) -> Result<NodeId> {
        let node = self.doc.create_element(tag)?;
        self.doc.append_child(head, node)?;
        for (name, value) in attrs {
            self.doc.set_attribute(node, name, value)?;
        }
        Ok(node)
    }

    fn compose_script(&mut self) -> Result<String> {
        let refs = self.buffers.refs.flush();
        let state = self.buffers.state.flush();
        let behavior = self.buffers.behaviors.flush();
        let script = compose_bootstrap(&refs, &state, &behavior, self.config.expose_globals)?;

        if !self.config.minify_script {
            return Ok(script);
        }
        match minify_js(&script) {
            Ok(minified) => Ok(minified),
            Err(err) => {
                tracing::warn!("[sitecraft:render] minification failed, shipping script as is: {err}");
                Ok(script)
            }
        }
    }
}

/// Roots placed directly into `<body>`, in order.
#[derive(Debug, Clone, Default)]
pub struct Mount(Vec<Element>);

impl From<Element> for Mount {
    fn from(el: Element) -> Self {
        Mount(vec![el])
    }
}

impl From<&Element> for Mount {
    fn from(el: &Element) -> Self {
        Mount(vec![el.clone()])
    }
}

impl From<Vec<Element>> for Mount {
    fn from(els: Vec<Element>) -> Self {
        Mount(els)
    }
}

impl From<&Vec<Element>> for Mount {
    fn from(els: &Vec<Element>) -> Self {
        Mount(els.clone())
    }
}

impl From<&[Element]> for Mount {
    fn from(els: &[Element]) -> Self {
        Mount(els.to_vec())
    }
}

impl<const N: usize> From<[Element; N]> for Mount {
    fn from(els: [Element; N]) -> Self {
        Mount(els.into())
    }
}

impl<const N: usize> From<[&Element; N]> for Mount {
    fn from(els: [&Element; N]) -> Self {
        Mount(els.into_iter().cloned().collect())
    }
}

/// Document compiler.
///
/// Elements created here share the engine's buffers. Styles, behavior,
/// references and state registered between two renders are emitted by the
/// second one; after a successful render the buffers are cleared (or kept,
/// under [`FlushPolicy::Retain`]).
///
/// Cloning an engine yields another handle to the same document.
#[derive(Clone)]
pub struct Engine {
    ws: Rc<RefCell<Workspace>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ws = self.ws.borrow();
        f.debug_struct("Engine")
            .field("phase", &ws.phase)
            .field("nodes", &ws.doc.len())
            .field("rendered", &ws.last_rendered.is_some())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        tracing::debug!(
            "[sitecraft:engine] ids={:?} flush={:?} append={:?}",
            config.ids.strategy,
            config.flush,
            config.append
        );
        Self {
            ws: Rc::new(RefCell::new(Workspace::new(config))),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.ws.borrow().config.clone()
    }

    pub fn phase(&self) -> RenderPhase {
        self.ws.borrow().phase
    }

    pub fn pending(&self) -> Pending {
        let ws = self.ws.borrow();
        Pending {
            styles: ws.buffers.styles.len(),
            behaviors: ws.buffers.behaviors.len(),
            references: ws.buffers.refs.len(),
            state: ws.buffers.state.len(),
        }
    }

    /// Runs `f` against a snapshot of the underlying document. The engine is
    /// not borrowed while `f` runs, so elements may be edited from inside it;
    /// such edits are not visible in the snapshot.
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        let doc = self.ws.borrow().doc.clone();
        f(&doc)
    }

    pub fn create_element(&self, tag: &str) -> Result<Element> {
        let (node, tag) = {
            let mut ws = self.ws.borrow_mut();
            let node = ws.doc.create_element(tag)?;
            let tag = ws.doc.tag_name(node).unwrap_or(tag).to_string();
            (node, tag)
        };
        Ok(Element::new(node, tag, &self.ws))
    }

    pub fn div(&self) -> Result<Element> {
        self.create_element("div")
    }

    pub fn span(&self) -> Result<Element> {
        self.create_element("span")
    }

    pub fn paragraph(&self) -> Result<Element> {
        self.create_element("p")
    }

    pub fn button(&self) -> Result<Element> {
        self.create_element("button")
    }

    /// `<h1>` .. `<h6>`; out-of-range levels are clamped.
    pub fn heading(&self, level: u8) -> Result<Element> {
        self.create_element(&format!("h{}", level.clamp(1, 6)))
    }

    /// Detached text node, usable as a raw child.
    pub fn text_node(&self, content: &str) -> NodeId {
        self.ws.borrow_mut().doc.create_text(content)
    }

    /// Registers `.name { ... }`. A rejected rule is logged and `false`
    /// returned; nothing else is affected.
    pub fn define_style(&self, name: &str, declarations: impl Into<Declarations>) -> bool {
        self.define_logged(name, declarations.into(), false)
    }

    /// Like [`Engine::define_style`] with `selector` used verbatim.
    pub fn define_global_style(&self, selector: &str, declarations: impl Into<Declarations>) -> bool {
        self.define_logged(selector, declarations.into(), true)
    }

    fn define_logged(&self, name: &str, declarations: Declarations, raw: bool) -> bool {
        match self.try_define_style(name, &declarations, raw) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("[sitecraft:style] {err}");
                false
            }
        }
    }

    pub fn try_define_style(&self, name: &str, declarations: &Declarations, raw: bool) -> Result<()> {
        self.ws
            .borrow_mut()
            .buffers
            .styles
            .define_rule(name, declarations, raw)
    }

    /// Seeds client state. Returns `Ok(false)` when `key` already holds an
    /// equal value.
    pub fn set_state<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        self.ws.borrow_mut().buffers.state.set_serialized(key, value)
    }

    pub fn state_value(&self, key: &str) -> Option<Value> {
        self.ws.borrow().buffers.state.get(key).cloned()
    }

    /// Runs `handler` once the document has loaded.
    pub fn on_load(&self, handler: impl Into<Handler>) -> Result<()> {
        self.ws
            .borrow_mut()
            .buffers
            .behaviors
            .record_lifecycle(handler.into())
    }

    /// Element id registered under `name`, pending the next render.
    pub fn reference(&self, name: &str) -> Option<String> {
        self.ws.borrow().buffers.refs.get(name).map(str::to_string)
    }

    /// Compiles the document and keeps it as the current output.
    ///
    /// On failure the previous output and every buffer are left as they
    /// were, so the call can be retried.
    pub fn try_render(&self, mount: impl Into<Mount>, head: &HeadConfig) -> Result<String> {
        let Mount(roots) = mount.into();
        if let Some(foreign) = roots.iter().find(|el| !el.belongs_to(&self.ws)) {
            return Err(Error::Render(format!(
                "<{}> {} belongs to another engine",
                foreign.tag(),
                foreign.node_id()
            )));
        }
        let roots: Vec<NodeId> = roots.iter().map(Element::node_id).collect();

        let mut ws = self.ws.borrow_mut();
        let previous_phase = ws.phase;
        let saved = ws.buffers.clone();
        ws.phase = RenderPhase::Compiling;

        match ws.compile(&roots, head) {
            Ok(html) => {
                if ws.config.flush == FlushPolicy::Retain {
                    ws.buffers = saved;
                }
                tracing::info!(
                    "[sitecraft:render] compiled {} root(s) into {} bytes",
                    roots.len(),
                    html.len()
                );
                ws.last_rendered = Some(html.clone());
                ws.phase = RenderPhase::Compiled;
                Ok(html)
            }
            Err(err) => {
                ws.buffers = saved;
                ws.phase = previous_phase;
                Err(match err {
                    Error::Render(_) => err,
                    other => Error::Render(other.to_string()),
                })
            }
        }
    }

    /// [`Engine::try_render`] with the error logged instead of returned.
    pub fn render(&self, mount: impl Into<Mount>, head: &HeadConfig) -> bool {
        match self.try_render(mount, head) {
            Ok(_) => true,
            Err(err) => {
                tracing::error!("[sitecraft:render] {err}");
                false
            }
        }
    }

    /// The last successfully rendered document.
    pub fn output(&self) -> Result<String> {
        self.ws
            .borrow()
            .last_rendered
            .clone()
            .ok_or(Error::NotRendered)
    }

    pub fn try_save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let html = self.output()?;
        std::fs::write(path, html.as_bytes()).map_err(|source| Error::Persistence {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("[sitecraft:save] wrote {} ({} bytes)", path.display(), html.len());
        Ok(())
    }

    /// [`Engine::try_save`] with the error logged instead of returned.
    pub fn save(&self, path: impl AsRef<Path>) -> bool {
        match self.try_save(path) {
            Ok(()) => true,
            Err(err @ Error::NotRendered) => {
                tracing::warn!("[sitecraft:save] {err}");
                false
            }
            Err(err) => {
                tracing::error!("[sitecraft:save] {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Child;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{}-{}-{}", prefix, std::process::id(), ts));
        std::fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    fn script_of(html: &str) -> &str {
        let start = html.rfind("<script>").expect("trailing script") + "<script>".len();
        let end = html.rfind("</script>").expect("closed script");
        &html[start..end]
    }

    #[test]
    fn test_end_to_end_page() {
        let engine = Engine::with_config(EngineConfig::deterministic(7));
        let page = engine.div().unwrap();
        let heading = engine.heading(1).unwrap();
        heading.set_text("Hello").unwrap();
        let button = engine.button().unwrap();
        button.set_text("Go").unwrap().on_click("console.log(1)").unwrap();
        page.append_children([&heading, &button]).unwrap();

        let html = engine
            .try_render(&page, &HeadConfig::titled("Demo"))
            .unwrap();
        let id = button.identifier().unwrap();

        assert!(html.starts_with(
            "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><title>Demo</title>"
        ));
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains(&format!("<button id=\"{id}\">Go</button>")));
        assert_eq!(html.matches("<script").count(), 1);
        assert_eq!(html.matches("<style").count(), 1);
        assert!(html.ends_with("</script></body></html>"));

        let script = script_of(&html);
        assert!(script.contains("console.log(1)"));
        assert!(script.contains(&format!("$on(\"{id}\",\"click\",function(event){{")));
        assert_eq!(engine.phase(), RenderPhase::Compiled);
        assert_eq!(engine.output().unwrap(), html);
    }

    #[test]
    fn test_user_text_is_escaped() {
        let engine = Engine::new();
        let p = engine.paragraph().unwrap();
        p.set_text("<script>alert(1)</script>").unwrap();

        let html = engine.try_render(&p, &HeadConfig::default()).unwrap();
        assert!(html.contains("<p>&lt;script&gt;alert(1)&lt;/script&gt;</p>"));
        assert_eq!(html.matches("<script").count(), 1);
        assert!(html.contains("<title>Untitled</title>"));
    }

    #[test]
    fn test_roots_are_mounted_flat() {
        let engine = Engine::new();
        let a = engine.div().unwrap();
        let b = engine.span().unwrap();
        a.set_text("A").unwrap();
        b.set_text("B").unwrap();

        let html = engine.try_render([&a, &b], &HeadConfig::default()).unwrap();
        assert!(html.contains("<body><div>A</div><span>B</span><script>"));
    }

    #[test]
    fn test_reference_round_trip() {
        let engine = Engine::new();
        let panel = engine.div().unwrap();
        panel.register_reference("panel").unwrap();
        let id = panel.identifier().unwrap();

        let html = engine.try_render(&panel, &HeadConfig::default()).unwrap();
        let expected = format!("var $refTable = {{\"panel\":\"{id}\"}};");
        assert!(script_of(&html).contains(&expected));
        assert!(html.contains(&format!("<div id=\"{id}\"></div>")));
    }

    #[test]
    fn test_every_declaration_emitted_once() {
        let engine = Engine::new();
        assert!(engine.define_style("card", [("backgroundColor", "#fafafa"), ("padding", "7px")]));
        assert!(engine.define_global_style("body", [("margin", "3px")]));
        let root = engine.div().unwrap();
        root.generate_scoped_class([("borderRadius", "9px")]).unwrap();

        let html = engine.try_render(&root, &HeadConfig::default()).unwrap();
        for decl in [
            "background-color: #fafafa;",
            "padding: 7px;",
            "margin: 3px;",
            "border-radius: 9px;",
        ] {
            assert_eq!(html.matches(decl).count(), 1, "{decl}");
        }
        let class = root.attribute("class").unwrap();
        assert!(html.contains(&format!(".{class} {{ border-radius: 9px; }}")));
    }

    #[test]
    fn test_rejected_style_is_isolated() {
        let engine = Engine::new();
        assert!(!engine.define_style("bad", [("color", "red; }")]));
        assert!(engine.define_style("good", [("color", "teal")]));
        assert_eq!(engine.pending().styles, 1);
    }

    #[test]
    fn test_second_render_starts_empty() {
        let engine = Engine::new();
        engine.define_style("once", [("color", "navy")]);
        engine.set_state("count", &1).unwrap();
        let root = engine.button().unwrap();
        root.on_click("go()").unwrap();

        let first = engine.try_render(&root, &HeadConfig::default()).unwrap();
        assert!(first.contains("color: navy;"));
        assert!(first.contains("$on(\""));
        assert_eq!(engine.pending(), Pending::default());

        let second = engine.try_render(&root, &HeadConfig::default()).unwrap();
        assert!(second.contains("<style></style>"));
        assert!(!second.contains("$on(\""));
        assert!(script_of(&second).contains("var $seed = {};"));
        assert!(second.contains(&format!("id=\"{}\"", root.identifier().unwrap())));
    }

    #[test]
    fn test_retain_policy_repeats_registrations() {
        let engine = Engine::with_config(EngineConfig {
            flush: FlushPolicy::Retain,
            ..EngineConfig::default()
        });
        engine.define_style("kept", [("color", "olive")]);
        let root = engine.button().unwrap();
        root.on_click("go()").unwrap();

        let first = engine.try_render(&root, &HeadConfig::default()).unwrap();
        let second = engine.try_render(&root, &HeadConfig::default()).unwrap();

        assert_eq!(first, second);
        assert!(second.contains("color: olive;"));
        assert_eq!(engine.pending().behaviors, 1);
    }

    #[test]
    fn test_failed_render_keeps_previous_output() {
        let engine = Engine::new();
        let root = engine.div().unwrap();
        root.set_text("v1").unwrap();
        assert!(engine.render(&root, &HeadConfig::titled("ok")));
        let good = engine.output().unwrap();

        engine.define_style("later", [("color", "plum")]);
        let broken = HeadConfig::default().meta([("bad name", "x")]);
        assert!(!engine.render(&root, &broken));

        assert_eq!(engine.output().unwrap(), good);
        assert_eq!(engine.pending().styles, 1);
        assert_eq!(engine.phase(), RenderPhase::Compiled);

        let html = engine.try_render(&root, &HeadConfig::default()).unwrap();
        assert!(html.contains("color: plum;"));
        assert!(html.contains("<div>v1</div>"));
    }

    #[test]
    fn test_foreign_root_is_rejected() {
        let engine = Engine::new();
        let other = Engine::new();
        let stranger = other.div().unwrap();

        assert!(matches!(
            engine.try_render(&stranger, &HeadConfig::default()),
            Err(Error::Render(_))
        ));
        assert!(matches!(engine.output(), Err(Error::NotRendered)));
        assert_eq!(engine.phase(), RenderPhase::Idle);
    }

    #[test]
    fn test_duplicate_root_is_rejected() {
        let engine = Engine::new();
        let a = engine.div().unwrap();
        assert!(!engine.render([&a, &a], &HeadConfig::default()));
    }

    #[test]
    fn test_nested_root_is_rejected_and_left_in_place() {
        let engine = Engine::new();
        let page = engine.div().unwrap();
        let heading = engine.heading(2).unwrap();
        heading.set_text("Title").unwrap();
        page.append(&heading).unwrap();

        assert!(matches!(
            engine.try_render(&heading, &HeadConfig::default()),
            Err(Error::Render(_))
        ));
        assert!(!engine.render([&page, &heading], &HeadConfig::default()));

        let html = engine.try_render(&page, &HeadConfig::default()).unwrap();
        assert!(html.contains("<body><div><h2>Title</h2></div><script>"));

        let again = engine.try_render(&page, &HeadConfig::default()).unwrap();
        assert!(again.contains("<body><div><h2>Title</h2></div><script>"));
    }

    #[test]
    fn test_document_view_allows_edits() {
        let engine = Engine::new();
        let p = engine.paragraph().unwrap();
        p.set_text("before").unwrap();

        let seen = engine.with_document(|doc| {
            p.set_text("after").unwrap();
            doc.text_content(p.node_id())
        });

        assert_eq!(seen, "before");
        assert_eq!(p.text(), "after");
    }

    #[test]
    fn test_rerender_remounts_roots() {
        let engine = Engine::new();
        let first = engine.div().unwrap();
        first.set_text("first").unwrap();
        let second = engine.div().unwrap();
        second.set_text("second").unwrap();

        engine.try_render(&first, &HeadConfig::default()).unwrap();
        let html = engine.try_render(&second, &HeadConfig::default()).unwrap();
        assert!(!html.contains("<div>first</div>"));
        assert!(html.contains("<div>second</div>"));

        let html = engine.try_render(&first, &HeadConfig::default()).unwrap();
        assert!(html.contains("<div>first</div>"));
        assert_eq!(html.matches("<script").count(), 1);
        assert_eq!(html.matches("<title>").count(), 1);
    }

    #[test]
    fn test_head_order() {
        let engine = Engine::new();
        let root = engine.div().unwrap();
        let head = HeadConfig::titled("T")
            .meta([("name", "description"), ("content", "d")])
            .script("/app.js")
            .stylesheet("/site.css")
            .icon("/favicon.ico")
            .lang("fr");

        let html = engine.try_render(&root, &head).unwrap();
        let expected = concat!(
            "<html lang=\"fr\"><head>",
            "<meta charset=\"utf-8\">",
            "<title>T</title>",
            "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">",
            "<meta content=\"d\" name=\"description\">",
            "<script src=\"/app.js\"></script>",
            "<link rel=\"stylesheet\" href=\"/site.css\">",
            "<link rel=\"icon\" href=\"/favicon.ico\">",
            "<style></style>",
            "</head>"
        );
        assert!(html.contains(expected), "{html}");
    }

    #[test]
    fn test_custom_viewport_replaces_default() {
        let engine = Engine::new();
        let root = engine.div().unwrap();
        let head = HeadConfig::default().meta([("name", "viewport"), ("content", "width=320")]);

        let html = engine.try_render(&root, &head).unwrap();
        assert_eq!(html.matches("name=\"viewport\"").count(), 1);
        assert!(html.contains("width=320"));
    }

    #[test]
    fn test_state_seed_and_bindings() {
        let engine = Engine::new();
        assert!(engine.set_state("count", &0).unwrap());
        assert!(!engine.set_state("count", &0).unwrap());
        assert_eq!(engine.state_value("count"), Some(serde_json::json!(0)));

        let label = engine.span().unwrap();
        label
            .bind_text_with("count", Handler::callable("(n) => n + ' clicks'"))
            .unwrap();
        let id = label.identifier().unwrap();

        let html = engine.try_render(&label, &HeadConfig::default()).unwrap();
        let script = script_of(&html);
        assert!(script.contains("var $seed = {\"count\":0};"));
        assert!(script.contains(&format!(
            "$text(\"count\",\"{id}\",((n) => n + ' clicks'));"
        )));
    }

    /// Brackets balance outside string literals, and no statement starts
    /// with an anonymous `function(`, which would not parse.
    fn assert_well_formed(script: &str) {
        let mut open = Vec::new();
        let mut chars = script.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '"' | '\'' | '`' => {
                    while let Some(c) = chars.next() {
                        if c == '\\' {
                            chars.next();
                        } else if c == ch {
                            break;
                        }
                    }
                }
                '(' | '{' | '[' => open.push(ch),
                ')' | '}' | ']' => {
                    let expected = match ch {
                        ')' => '(',
                        '}' => '{',
                        _ => '[',
                    };
                    assert_eq!(open.pop(), Some(expected), "unbalanced {ch:?} in {script}");
                }
                _ => {}
            }
        }
        assert!(open.is_empty(), "unclosed {open:?} in {script}");

        let compact: String = script.chars().filter(|c| !c.is_whitespace()).collect();
        assert!(!compact.starts_with("function("));
        for boundary in [";function(", "{function(", "}function("] {
            assert!(!compact.contains(boundary), "{boundary} in {script}");
        }
    }

    #[test]
    fn test_lifecycle_runs_after_runtime() {
        let engine = Engine::new();
        engine.on_load("document.body.dataset.ready = '1'").unwrap();
        let root = engine.div().unwrap();

        let html = engine.try_render(&root, &HeadConfig::default()).unwrap();
        let script = script_of(&html);
        let runtime = script.find("var $state").unwrap();
        let boot = script.find("var boot=function(){").unwrap();
        let ready = script
            .find("(function(){document.body.dataset.ready = '1'\n})();")
            .unwrap();
        assert!(runtime < boot && boot < ready);
        assert_well_formed(script);
    }

    #[test]
    fn test_mixed_behavior_script_is_well_formed() {
        let engine = Engine::new();
        engine.set_state("count", &0).unwrap();
        engine.on_load("console.log('ready')").unwrap();
        engine
            .on_load(Handler::callable("() => $watch('count', function (n) { document.title = n; })"))
            .unwrap();
        let button = engine.button().unwrap();
        button.on_click("$state.count = $state.count + 1;").unwrap();
        let label = engine.span().unwrap();
        label.bind_text("count").unwrap();
        label
            .bind_text_with("count", "return '(' + value + ')';")
            .unwrap();
        let root = engine.div().unwrap();
        root.append_children([&button, &label]).unwrap();

        let html = engine.try_render(&root, &HeadConfig::default()).unwrap();
        let script = script_of(&html);
        assert!(script.contains("(function(){console.log('ready')\n})();"));
        assert!(script.contains("function(value){return '(' + value + ')';\n})"));
        assert_well_formed(script);
    }

    #[test]
    fn test_minified_script_keeps_handlers() {
        let engine = Engine::with_config(EngineConfig {
            minify_script: true,
            ..EngineConfig::default()
        });
        let button = engine.button().unwrap();
        button.on_click("console.log(1)").unwrap();
        let id = button.identifier().unwrap();

        let html = engine.try_render(&button, &HeadConfig::default()).unwrap();
        let script = script_of(&html);
        assert!(script.contains(&format!(
            "$on(\"{id}\",\"click\",function(event){{console.log(1)}});"
        )));
        assert!(!script.contains("\n  "));
    }

    #[test]
    fn test_script_cannot_close_itself() {
        let engine = Engine::new();
        let root = engine.div().unwrap();
        root.on_click("var s = '</script><b>x</b>'").unwrap();

        let html = engine.try_render(&root, &HeadConfig::default()).unwrap();
        assert_eq!(html.matches("</script>").count(), 1);
        assert!(html.contains("<\\/script><b>x</b>"));
    }

    #[test]
    fn test_raw_node_children() {
        let engine = Engine::new();
        let root = engine.paragraph().unwrap();
        let text = engine.text_node("raw");
        root.append(text).unwrap();

        let html = engine.try_render(&root, &HeadConfig::default()).unwrap();
        assert!(html.contains("<p>raw</p>"));
    }

    #[test]
    fn test_save_before_render() {
        let engine = Engine::new();
        let dir = unique_temp_dir("sitecraft-save-early");
        assert!(matches!(
            engine.try_save(dir.join("page.html")),
            Err(Error::NotRendered)
        ));
        assert!(!engine.save(dir.join("page.html")));
        assert!(!dir.join("page.html").exists());
    }

    #[test]
    fn test_save_writes_output() {
        let engine = Engine::new();
        let root = engine.div().unwrap();
        root.set_text("saved").unwrap();
        assert!(engine.render(&root, &HeadConfig::default()));

        let dir = unique_temp_dir("sitecraft-save");
        let path = dir.join("index.html");
        assert!(engine.save(&path));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), engine.output().unwrap());

        let bad = dir.join("missing").join("nested").join("index.html");
        assert!(matches!(
            engine.try_save(&bad),
            Err(Error::Persistence { .. })
        ));
        assert!(!engine.save(&bad));
        assert!(engine.output().unwrap().contains("<div>saved</div>"));
    }

    #[test]
    fn test_children_survive_as_nested_values() {
        let engine = Engine::new();
        let list = engine.create_element("ol").unwrap();
        let items: Vec<Element> = ["x", "y"]
            .iter()
            .map(|label| {
                let li = engine.create_element("li").unwrap();
                li.set_text(label).unwrap();
                li
            })
            .collect();
        list.append_children(vec![Child::from(items), Child::from("!")])
            .unwrap();

        let html = engine.try_render(&list, &HeadConfig::default()).unwrap();
        assert!(html.contains("<ol><li>x</li><li>y</li>!</ol>"));
    }
}
