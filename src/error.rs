use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while classifying, aggregating and resolving layers.
///
/// `DatasetOpen`, `UnknownZone`, `MissingField`, `Schema` and `Config` abort a run.
/// `DegenerateBasin`, `UnmatchedPoint` and `AmbiguousPoint` describe per-point
/// conditions; the resolver collects them as diagnostics and carries on.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open dataset {path}: {reason}")]
    DatasetOpen { path: PathBuf, reason: String },

    #[error("zone '{zone}' on feature {feature} has no entry in the fraction table")]
    UnknownZone { zone: String, feature: usize },

    #[error("feature {feature} has no usable value in field '{field}'")]
    MissingField { field: String, feature: usize },

    #[error("derived basin {basin} enclosing point {feature} has zero area; no fraction written")]
    DegenerateBasin { basin: usize, feature: usize },

    #[error("point {feature} is not contained by any basin")]
    UnmatchedPoint { feature: usize },

    #[error("point {feature} is contained by several basins {basins:?}")]
    AmbiguousPoint { feature: usize, basins: Vec<usize> },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unsupported geometry in {layer}, feature {feature}: {reason}")]
    Geometry { layer: String, feature: usize, reason: String },

    #[error("commit failed after writing {committed:?}: {source}")]
    PartialCommit { committed: Vec<PathBuf>, source: Box<Error> },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Shapefile(#[from] shapefile::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors that must stop the run before anything is written.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::DegenerateBasin { .. } | Error::UnmatchedPoint { .. } | Error::AmbiguousPoint { .. }
        )
    }
}
