//! sitecraft web crate.
//!
//! Builds a page server side through a fluent element API and compiles it
//! into a single HTML document: one consolidated `<style>` in the head and
//! one trailing `<script>` carrying a small reactive runtime (`$state`,
//! `$watch`, `$refs`) plus the behavior recorded while building.
//!
//! ```ignore
//! let engine = Engine::new();
//! let button = engine.button()?;
//! button.set_text("Clicked 0 times")?
//!     .bind_text_with("count", Handler::callable("(n) => `Clicked ${n} times`"))?
//!     .on_click("$state.count = $state.count + 1;")?;
//! engine.set_state("count", &0)?;
//! engine.render(&button, &HeadConfig::titled("Counter"));
//! engine.save("counter.html");
//! ```

mod behavior;
pub mod blueprint;
mod config;
mod element;
mod engine;
mod error;
mod ids;
pub mod jsminify;
mod refs;
mod runtime;
mod state;
mod style;

pub use behavior::{BehaviorBuffer, BehaviorEntry, Handler};
pub use blueprint::PageBlueprint;
pub use config::{
    AppendPolicy, EngineConfig, FlushPolicy, HeadConfig, IdConfig, IdStrategy, MetaTag,
};
pub use element::{Child, Element};
pub use engine::{Engine, Mount, Pending, RenderPhase};
pub use error::{Error, Result};
pub use ids::IdAllocator;
pub use refs::ReferenceMap;
pub use runtime::{RUNTIME_JS, compose_bootstrap};
pub use sitecraft_core::{Document, NodeId, escape_text};
pub use state::StateTable;
pub use style::{Declarations, StyleRegistry, StyleRule, to_kebab_case};
