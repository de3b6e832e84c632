use sitecraft_core::{DomError, NodeId};
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the compiler can report.
///
/// Builder-time variants (`ElementCreation`, `InvalidHandler`,
/// `InvalidChild`, `IdentifierLocked`, `Detached`, `State`) propagate to the
/// caller. `StyleDefinition`, `Render` and `Persistence` are contained at
/// the registry / `render` / `save` boundaries and logged there.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("element creation failed: {0}")]
    ElementCreation(#[from] DomError),

    #[error("invalid handler: {0}")]
    InvalidHandler(String),

    #[error("invalid style definition: {0}")]
    StyleDefinition(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("nothing has been rendered yet")]
    NotRendered,

    #[error("invalid child: {0}")]
    InvalidChild(String),

    #[error("element {node} already exposes identifier {id:?} to bound behavior")]
    IdentifierLocked { node: NodeId, id: String },

    #[error("element {0} outlived the engine that created it")]
    Detached(NodeId),

    #[error("state value for {key:?} is not serializable: {source}")]
    State {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid blueprint: {0}")]
    Blueprint(String),
}
