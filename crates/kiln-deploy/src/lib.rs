//! Static-hosting deploys for kiln.
//!
//! Packs the distribution directory into a gzipped tarball and uploads it
//! to surge.sh under a domain.

pub mod archive;
pub mod surge;

use std::path::PathBuf;

pub use archive::{pack, Archive};
pub use surge::{DeployReport, SurgeClient, DEFAULT_ENDPOINT, DEFAULT_TOKEN_ENV};

/// Errors that can occur while deploying.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Project directory not found: {0}. Build the site first.")]
    MissingProject(PathBuf),

    #[error("No deploy token: set the {0} environment variable")]
    MissingToken(String),

    #[error("Failed to pack project: {0}")]
    ArchiveError(String),

    #[error("Upload failed: {0}")]
    RequestError(String),

    #[error("Upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}
