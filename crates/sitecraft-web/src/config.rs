use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// How generated identifiers are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// `<prefix>-<counter>-<4 char suffix>`; the counter alone guarantees
    /// uniqueness.
    Sequential,
    /// `_<6 char token>`; re-drawn until unused.
    Random,
}

impl Default for IdStrategy {
    fn default() -> Self {
        Self::Sequential
    }
}

/// What happens to the style/behavior/reference/state buffers after a
/// successful render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushPolicy {
    /// Drained into the output; the next render starts empty.
    #[default]
    Clear,
    /// Kept, so every render re-emits everything registered so far.
    Retain,
}

/// Reaction to an item `append_children` cannot attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendPolicy {
    #[default]
    Strict,
    /// Log a warning and skip the item.
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdConfig {
    #[serde(default)]
    pub strategy: IdStrategy,
    #[serde(default = "default_element_prefix")]
    pub element_prefix: String,
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
    /// Seeds the suffix generator; identical builds then produce identical
    /// documents.
    pub seed: Option<u64>,
}

fn default_element_prefix() -> String {
    "sc-id".to_string()
}

fn default_class_prefix() -> String {
    "sc-c".to_string()
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            strategy: IdStrategy::default(),
            element_prefix: default_element_prefix(),
            class_prefix: default_class_prefix(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub ids: IdConfig,
    #[serde(default)]
    pub flush: FlushPolicy,
    #[serde(default)]
    pub append: AppendPolicy,
    #[serde(default)]
    pub minify_script: bool,
    /// Also publish `$refs`, `$state` and `$watch` on `window`.
    #[serde(default)]
    pub expose_globals: bool,
    #[serde(default = "default_title")]
    pub default_title: String,
}

fn default_title() -> String {
    "Untitled".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ids: IdConfig::default(),
            flush: FlushPolicy::default(),
            append: AppendPolicy::default(),
            minify_script: false,
            expose_globals: false,
            default_title: default_title(),
        }
    }
}

impl EngineConfig {
    /// Sequential ids from a fixed seed: byte-identical output per build.
    pub fn deterministic(seed: u64) -> Self {
        Self {
            ids: IdConfig {
                seed: Some(seed),
                ..IdConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Attribute map of one `<meta>` tag.
pub type MetaTag = BTreeMap<String, String>;

/// Head metadata applied on every render.
///
/// List fields also accept a single value when deserialized, so
/// `"css": "/site.css"` and `"css": ["/site.css"]` are equivalent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadConfig {
    /// `<title>`; falls back to `EngineConfig::default_title`.
    pub title: Option<String>,
    /// Extra `<meta>` tags, in order. A viewport tag is added unless one of
    /// these has `name="viewport"`.
    #[serde(default, deserialize_with = "one_or_many")]
    pub meta: Vec<MetaTag>,
    /// External `<script src>` tags.
    #[serde(default, deserialize_with = "one_or_many")]
    pub scripts: Vec<String>,
    /// External `<link rel="stylesheet">` tags.
    #[serde(default, deserialize_with = "one_or_many")]
    pub css: Vec<String>,
    /// `<link rel="icon">`.
    pub icon: Option<String>,
    /// `lang` attribute of `<html>`, `en` when absent.
    pub lang: Option<String>,
}

impl HeadConfig {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn meta<K, V, I>(mut self, attrs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.meta.push(
            attrs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn script(mut self, src: impl Into<String>) -> Self {
        self.scripts.push(src.into());
        self
    }

    pub fn stylesheet(mut self, href: impl Into<String>) -> Self {
        self.css.push(href.into());
        self
    }

    pub fn icon(mut self, href: impl Into<String>) -> Self {
        self.icon = Some(href.into());
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    pub(crate) fn has_viewport(&self) -> bool {
        self.meta
            .iter()
            .any(|tag| tag.get("name").is_some_and(|name| name == "viewport"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}
