//! Deferred client behavior, recorded as source text.
//!
//! Everything recorded here runs in the browser, which shares nothing with
//! the process that built the page. Handlers are therefore accepted as
//! literal JavaScript source ([`Handler`]) and never as Rust closures. The
//! source must parse in the browser and may only refer to page globals and
//! the runtime helpers (`$refs`, `$state`, `$watch`); that part of the
//! contract is on the caller.

use crate::{Error, Result};
use serde_json::Value;

/// Client-side callable, as source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handler {
    /// Statements wrapped into `function(<param>){ ... }` on emission.
    Body(String),
    /// A complete function or arrow expression, emitted verbatim.
    Callable(String),
}

impl Handler {
    pub fn body(source: impl Into<String>) -> Self {
        Self::Body(source.into())
    }

    pub fn callable(source: impl Into<String>) -> Self {
        Self::Callable(source.into())
    }

    pub fn source(&self) -> &str {
        match self {
            Self::Body(src) | Self::Callable(src) => src,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let src = self.source().trim();
        if src.is_empty() {
            return Err(Error::InvalidHandler("handler source is empty".to_string()));
        }
        if let Self::Callable(_) = self {
            if !is_function_expression(src) {
                return Err(Error::InvalidHandler(format!(
                    "{src:?} is not a function or arrow expression"
                )));
            }
        }
        Ok(())
    }

    /// Expression evaluating to the callable. The closing brace of a body
    /// goes on its own line so a trailing `//` comment cannot swallow it.
    pub fn to_function(&self, param: &str) -> String {
        match self {
            Self::Body(src) => format!("function({param}){{{src}\n}}"),
            Self::Callable(src) => format!("({})", src.trim()),
        }
    }
}

impl From<&str> for Handler {
    fn from(source: &str) -> Self {
        Self::Body(source.to_string())
    }
}

impl From<String> for Handler {
    fn from(source: String) -> Self {
        Self::Body(source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BehaviorEntry {
    Event {
        element_id: String,
        event: String,
        handler: Handler,
    },
    StateWatch {
        key: String,
        element_id: String,
        transform: Option<Handler>,
    },
    Lifecycle {
        handler: Handler,
    },
}

impl BehaviorEntry {
    pub fn to_statement(&self) -> String {
        match self {
            Self::Event {
                element_id,
                event,
                handler,
            } => format!(
                "$on({},{},{});",
                js_string(element_id),
                js_string(event),
                handler.to_function("event")
            ),
            Self::StateWatch {
                key,
                element_id,
                transform: Some(transform),
            } => format!(
                "$text({},{},{});",
                js_string(key),
                js_string(element_id),
                transform.to_function("value")
            ),
            Self::StateWatch {
                key,
                element_id,
                transform: None,
            } => format!("$text({},{});", js_string(key), js_string(element_id)),
            // A bare `function(){}` at statement start is a declaration
            // without a name; parentheses make it an expression.
            Self::Lifecycle {
                handler: handler @ Handler::Body(_),
            } => format!("({})();", handler.to_function("")),
            Self::Lifecycle { handler } => format!("{}();", handler.to_function("")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BehaviorBuffer {
    entries: Vec<BehaviorEntry>,
}

impl BehaviorBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&mut self, element_id: &str, event: &str, handler: Handler) -> Result<()> {
        validate_event_name(event)?;
        handler.validate()?;
        self.entries.push(BehaviorEntry::Event {
            element_id: element_id.to_string(),
            event: event.to_string(),
            handler,
        });
        Ok(())
    }

    pub fn record_state_watch(
        &mut self,
        key: &str,
        element_id: &str,
        transform: Option<Handler>,
    ) -> Result<()> {
        if let Some(transform) = &transform {
            transform.validate()?;
        }
        self.entries.push(BehaviorEntry::StateWatch {
            key: key.to_string(),
            element_id: element_id.to_string(),
            transform,
        });
        Ok(())
    }

    pub fn record_lifecycle(&mut self, handler: Handler) -> Result<()> {
        handler.validate()?;
        self.entries.push(BehaviorEntry::Lifecycle { handler });
        Ok(())
    }

    pub fn entries(&self) -> &[BehaviorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One statement per line, in registration order.
    pub fn to_script(&self) -> String {
        self.entries
            .iter()
            .map(BehaviorEntry::to_statement)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn flush(&mut self) -> String {
        let script = self.to_script();
        self.entries.clear();
        script
    }
}

/// `function`/`async` must start a real keyword (`functionality` does not);
/// anything else has to be an arrow.
fn is_function_expression(src: &str) -> bool {
    let after = |keyword: &str| {
        src.strip_prefix(keyword)
            .and_then(|rest| rest.chars().next())
    };
    matches!(after("function"), Some(c) if c.is_whitespace() || c == '(' || c == '*')
        || matches!(after("async"), Some(c) if c.is_whitespace())
        || src.contains("=>")
}

fn validate_event_name(event: &str) -> Result<()> {
    let valid = !event.is_empty()
        && event
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidHandler(format!("invalid event name {event:?}")))
    }
}

/// Double-quoted JavaScript string literal.
pub(crate) fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
