use thiserror::Error;
use tracing::debug;

use crate::{
    models::project::Project,
    storage::{MetadataStore, StorageError},
};

#[derive(Debug, Error)]
pub enum ListProjectsError {
    #[error("Failed to fetch projects: {0}")]
    Fetch(#[from] StorageError),
}

/// Every project, in the order the store returns them. Nothing is cached.
pub fn list_projects(metadata: &impl MetadataStore) -> Result<Vec<Project>, ListProjectsError> {
    let projects = metadata.list_all()?;
    debug!(count = projects.len(), "Fetched projects");
    Ok(projects)
}
