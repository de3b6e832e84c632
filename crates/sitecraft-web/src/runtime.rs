//! Client bootstrap: the reactive runtime plus recorded behavior, as one
//! self-contained script.

use crate::{Error, Result};

pub const RUNTIME_JS: &str = include_str!("sitecraft-runtime.js");

const REFS_MARKER: &str = "__SITECRAFT_REFS__";
const STATE_MARKER: &str = "__SITECRAFT_STATE__";
/// Makes the helpers reachable from scripts outside the bootstrap.
const GLOBAL_EXPORTS: &str = "window.$refs = $refs;\nwindow.$state = $state;\nwindow.$watch = $watch;\n";

/// Fills the runtime template with the reference table and state seed (both
/// JSON object text), then appends the behavior statements.
///
/// Behavior only runs once the document is parsed, so handlers can resolve
/// ids of elements that appear anywhere in the body. The helpers stay inside
/// the wrapping function unless `expose_globals` is set.
pub fn compose_bootstrap(
    refs_json: &str,
    state_json: &str,
    behavior: &str,
    expose_globals: bool,
) -> Result<String> {
    let (head, rest) = RUNTIME_JS
        .split_once(REFS_MARKER)
        .ok_or_else(|| Error::Render("runtime template lost its reference marker".to_string()))?;
    let (middle, tail) = rest
        .split_once(STATE_MARKER)
        .ok_or_else(|| Error::Render("runtime template lost its state marker".to_string()))?;

    let mut script = String::with_capacity(RUNTIME_JS.len() + behavior.len() + 256);
    script.push_str("(function(){\n");
    script.push_str(head);
    script.push_str(refs_json);
    script.push_str(middle);
    script.push_str(state_json);
    script.push_str(tail);
    if expose_globals {
        script.push_str(GLOBAL_EXPORTS);
    }
    script.push_str("var boot=function(){\n");
    script.push_str(behavior);
    script.push_str("\n};\n");
    script.push_str(
        "if(document.readyState===\"loading\"){document.addEventListener(\"DOMContentLoaded\",boot);}else{boot();}\n",
    );
    script.push_str("})();");
    Ok(script)
}
