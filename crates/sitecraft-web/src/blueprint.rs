//! Pages described as JSON and compiled through the builder API.
//!
//! ```json
//! {
//!   "head": { "title": "Counter" },
//!   "state": { "count": 0 },
//!   "styles": [{ "selector": "counter", "declarations": { "fontSize": "2rem" } }],
//!   "body": [{
//!     "tag": "button",
//!     "class": "counter",
//!     "bind": { "key": "count" },
//!     "on": { "click": "$state.count = $state.count + 1;" }
//!   }]
//! }
//! ```

use crate::config::{EngineConfig, HeadConfig, one_or_many};
use crate::style::Declarations;
use crate::{Element, Engine, Error, Handler, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageBlueprint {
    #[serde(default)]
    pub config: EngineConfig,
    #[serde(default)]
    pub head: HeadConfig,
    /// Client state seed.
    #[serde(default)]
    pub state: Map<String, Value>,
    #[serde(default)]
    pub styles: Vec<RuleBlueprint>,
    /// Handler bodies run once the page has loaded.
    #[serde(default, deserialize_with = "one_or_many")]
    pub lifecycle: Vec<String>,
    /// Roots, mounted flat into `<body>`.
    #[serde(default, deserialize_with = "one_or_many")]
    pub body: Vec<NodeBlueprint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleBlueprint {
    /// Class name, or a full selector when `raw` is set.
    pub selector: String,
    #[serde(default)]
    pub declarations: Map<String, Value>,
    #[serde(default)]
    pub raw: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeBlueprint {
    pub tag: String,
    pub id: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Inline declarations.
    #[serde(default)]
    pub style: Map<String, Value>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub class: Vec<String>,
    /// Declarations for a generated, element-scoped class.
    #[serde(default)]
    pub scoped: Map<String, Value>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub bind: Option<BindBlueprint>,
    /// Event name to handler body.
    #[serde(default)]
    pub on: BTreeMap<String, String>,
    #[serde(default)]
    pub children: Vec<ChildBlueprint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindBlueprint {
    pub key: String,
    /// Function or arrow expression applied to the value before display.
    pub transform: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildBlueprint {
    Text(String),
    Node(NodeBlueprint),
}

impl PageBlueprint {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| Error::Blueprint(err.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::Blueprint(format!("{}: {err}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|err| Error::Blueprint(format!("{}: {err}", path.display())))
    }

    /// Registers state, styles and lifecycle handlers on `engine` and builds
    /// the body. Returns the roots in order.
    pub fn build(&self, engine: &Engine) -> Result<Vec<Element>> {
        for (key, value) in &self.state {
            engine.set_state(key, value)?;
        }
        for rule in &self.styles {
            engine.try_define_style(&rule.selector, &declarations(&rule.declarations)?, rule.raw)?;
        }
        for source in &self.lifecycle {
            engine.on_load(source.as_str())?;
        }
        self.body.iter().map(|node| node.build(engine)).collect()
    }

    /// Builds into a fresh engine configured by `config` and renders once.
    pub fn compile(&self) -> Result<String> {
        let engine = Engine::with_config(self.config.clone());
        let roots = self.build(&engine)?;
        tracing::debug!("[sitecraft:blueprint] built {} root(s)", roots.len());
        engine.try_render(roots, &self.head)
    }
}

impl NodeBlueprint {
    pub fn build(&self, engine: &Engine) -> Result<Element> {
        let el = engine.create_element(&self.tag)?;
        if let Some(id) = &self.id {
            el.set_id(id)?;
        }
        for (name, value) in &self.attrs {
            el.set_attribute(name, value)?;
        }
        if !self.class.is_empty() {
            el.add_classes(&self.class)?;
        }
        if !self.style.is_empty() {
            el.set_inline_style(declarations(&self.style)?)?;
        }
        if !self.scoped.is_empty() {
            el.generate_scoped_class(declarations(&self.scoped)?)?;
        }
        if let Some(text) = &self.text {
            el.set_text(text)?;
        }

        for child in &self.children {
            match child {
                ChildBlueprint::Text(text) => {
                    el.append(text.as_str())?;
                }
                ChildBlueprint::Node(node) => {
                    el.append(node.build(engine)?)?;
                }
            }
        }

        if let Some(name) = &self.reference {
            el.register_reference(name)?;
        }
        if let Some(bind) = &self.bind {
            match &bind.transform {
                Some(transform) => el.bind_text_with(&bind.key, Handler::callable(transform.as_str()))?,
                None => el.bind_text(&bind.key)?,
            };
        }
        for (event, source) in &self.on {
            el.on(event, source.as_str())?;
        }
        Ok(el)
    }
}

fn declarations(map: &Map<String, Value>) -> Result<Declarations> {
    Declarations::from_json(&Value::Object(map.clone()))
}
