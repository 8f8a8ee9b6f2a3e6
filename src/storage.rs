use std::path::PathBuf;

use thiserror::Error;

use crate::models::project::{NewProject, Project, ProjectId};

pub mod artifacts;
pub mod json;
pub mod migrations;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to load projects from '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON from '{path}': {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid schema version in '{path}': {found}")]
    InvalidVersion { path: PathBuf, found: String },

    #[error("Failed to save projects to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize projects to JSON: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to lock '{path}': {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A project with slug '{0}' already exists")]
    SlugConflict(String),

    #[error(
        "Projects file was created by a newer version of showcase (version {0}). Please upgrade showcase to open this file."
    )]
    FutureVersion(u32),

    #[error("Projects file has unsupported version {0}. This version of showcase cannot read it.")]
    UnsupportedVersion(u32),
}

/// The document collection holding project metadata.
pub trait MetadataStore {
    /// Every record, in store order
    fn list_all(&self) -> Result<Vec<Project>, StorageError>;

    /// Inserts a record and returns its new id.
    ///
    /// Fails with [`StorageError::SlugConflict`] when a record with the same
    /// slug exists, so a slug addresses at most one project.
    fn insert(&self, project: NewProject) -> Result<ProjectId, StorageError>;
}
