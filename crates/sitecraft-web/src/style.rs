//! Style registry: named rule sets collected during building and flushed
//! into the single `<style>` block of the document.

use crate::{Error, Result};
use serde_json::Value;

/// Ordered CSS declarations as given by the caller (keys may be camel case).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations(Vec<(String, String)>);

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(property, value);
        self
    }

    pub fn insert(&mut self, property: impl Into<String>, value: impl Into<String>) {
        self.0.push((property.into(), value.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reads a JSON object of `property: string | number` pairs.
    pub fn from_json(value: &Value) -> Result<Self> {
        let Some(obj) = value.as_object() else {
            return Err(Error::StyleDefinition(format!(
                "declarations must be an object, got {value}"
            )));
        };

        let mut decls = Self::new();
        for (key, value) in obj {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => {
                    return Err(Error::StyleDefinition(format!(
                        "value of {key:?} must be a string or number, got {other}"
                    )));
                }
            };
            decls.insert(key.clone(), rendered);
        }
        Ok(decls)
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Declarations
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V> From<Vec<(K, V)>> for Declarations
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Declarations
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// `backgroundColor` -> `background-color`.
///
/// A leading capital marks a vendor prefix (`WebkitTransition` ->
/// `-webkit-transition`), as does a leading `ms` (`msTransform` ->
/// `-ms-transform`). Keys without capitals and custom properties pass
/// through unchanged.
pub fn to_kebab_case(key: &str) -> String {
    if key.starts_with("--") || !key.chars().any(|c| c.is_ascii_uppercase()) {
        return key.to_string();
    }

    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }

    if out.starts_with("ms-") {
        out.insert(0, '-');
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Vec<(String, String)>,
}

impl StyleRule {
    fn to_css(&self) -> String {
        let body = self
            .declarations
            .iter()
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} {{ {} }}", self.selector, body)
    }
}

#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    rules: Vec<StyleRule>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one rule. `raw == false` turns `name` into the class
    /// selector `.name`; `raw == true` uses it verbatim.
    ///
    /// A rejected rule leaves the registry unchanged.
    pub fn define_rule(&mut self, name: &str, declarations: &Declarations, raw: bool) -> Result<()> {
        let name = name.trim();
        let selector = if raw {
            if name.is_empty() || name.contains(['{', '}', '<']) {
                return Err(Error::StyleDefinition(format!("invalid selector {name:?}")));
            }
            name.to_string()
        } else {
            if !is_class_name(name) {
                return Err(Error::StyleDefinition(format!("invalid class name {name:?}")));
            }
            format!(".{name}")
        };

        let mut normalized = Vec::with_capacity(declarations.len());
        for (key, value) in declarations.iter() {
            let property = to_kebab_case(key.trim());
            if property.is_empty()
                || property.contains(|c: char| c.is_whitespace() || "{};:<>\"'".contains(c))
            {
                return Err(Error::StyleDefinition(format!(
                    "invalid property {key:?} in {selector}"
                )));
            }
            let value = value.trim();
            if value.is_empty() || !stays_inside_rule(value) {
                return Err(Error::StyleDefinition(format!(
                    "invalid value {value:?} for {property} in {selector}"
                )));
            }
            normalized.push((property, value.to_string()));
        }

        self.rules.push(StyleRule {
            selector,
            declarations: normalized,
        });
        Ok(())
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn to_css(&self) -> String {
        self.rules
            .iter()
            .map(StyleRule::to_css)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Stylesheet text for every registered rule, in order; empties the
    /// registry.
    pub fn flush(&mut self) -> String {
        let css = self.to_css();
        self.rules.clear();
        css
    }
}

/// `;`, `{` and `}` are allowed inside quoted strings and parentheses
/// (`url("data:image/png;base64,...")`, `content: "a;b"`). Quotes and
/// parentheses must close, and `<` is refused anywhere so the text cannot
/// end the `<style>` element.
fn stays_inside_rule(value: &str) -> bool {
    if value.contains('<') {
        return false;
    }

    let mut depth = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' | '\'' => loop {
                match chars.next() {
                    Some('\\') => {
                        chars.next();
                    }
                    Some('\n') | None => return false,
                    Some(c) if c == ch => break,
                    Some(_) => {}
                }
            },
            '\\' => {
                chars.next();
            }
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            ';' | '{' | '}' if depth == 0 => return false,
            _ => {}
        }
    }
    depth == 0
}

fn is_class_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '-')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
