//! Catalog failure taxonomy.
//!
//! Every failure carries enough detail for a caller to render an actionable
//! diagnostic: the descriptor path, the full list of known ids, or every
//! missing role/path pair. Nothing here is retried internally.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::model::ArtifactRole;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The descriptor file does not exist at the expected path.
    #[error("firmware catalog not found at {}", .path.display())]
    Unavailable { path: PathBuf },

    /// The descriptor exists but is not valid JSON or has the wrong shape.
    #[error("firmware catalog {} is malformed:\n{details}", .path.display())]
    Malformed { path: PathBuf, details: String },

    /// The requested firmware id is not in the catalog.
    #[error("firmware '{id}' not found (known ids: {})", .known.join(", "))]
    NotFound { id: String, known: Vec<String> },

    /// One or more referenced artifact files are absent on disk.
    #[error("firmware '{id}' is missing artifacts:\n{}", format_missing(.missing))]
    MissingArtifacts {
        id: String,
        missing: Vec<(ArtifactRole, PathBuf)>,
    },

    /// No entries to select a default from.
    #[error("firmware catalog contains no entries")]
    EmptyCatalog,
}

fn format_missing(missing: &[(ArtifactRole, PathBuf)]) -> String {
    missing
        .iter()
        .map(|(role, path)| format!("  - {role} ({})", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}
