use std::{collections::HashSet, time::Duration};

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    models::project::Project,
    storage::{
        MetadataStore, StorageError,
        artifacts::{ArtifactError, ArtifactHandle, ArtifactStore, submission_prefix},
    },
};

#[derive(Debug, Error)]
pub enum SweepOrphansError {
    #[error("Failed to list projects: {0}")]
    ListProjects(#[from] StorageError),

    #[error("Failed to list artifacts: {0}")]
    ListArtifacts(#[source] ArtifactError),
}

pub struct SweepOrphansParameters {
    /// Report orphans without deleting them
    pub dry_run: bool,
    /// Artifacts younger than this are left alone, since a submission may
    /// still be between its upload and its record insert
    pub grace: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedDeletion {
    pub key: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    /// Keys of unreferenced artifacts older than the grace period
    pub orphans: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDeletion>,
    /// Unreferenced artifacts still inside the grace period
    pub recent: usize,
    /// Total size of the deleted artifacts
    pub reclaimed_bytes: u64,
}

/// What the project records point at.
///
/// Keys and slug directories do not depend on how URLs are currently built,
/// so they survive a change of public base URL or data directory. URLs only
/// cover records that carry neither.
#[derive(Default)]
struct References {
    keys: HashSet<String>,
    prefixes: Vec<String>,
    urls: HashSet<String>,
}

impl References {
    fn from_projects(projects: Vec<Project>) -> Self {
        let mut references = Self::default();
        for project in projects {
            if let Some(key) = project.artifact_key() {
                references.keys.insert(key.to_string());
            }
            if let Some(slug) = project.slug() {
                references.prefixes.push(submission_prefix(slug));
            }
            if let Some(url) = project.html_file_url {
                references.urls.insert(url);
            }
        }
        references
    }

    fn contains(&self, artifacts: &impl ArtifactStore, handle: &ArtifactHandle) -> bool {
        if self.keys.contains(&handle.key)
            || self.prefixes.iter().any(|prefix| handle.key.starts_with(prefix))
        {
            return true;
        }

        match artifacts.resolve_url(handle) {
            Ok(url) => self.urls.contains(&url),
            Err(e) => {
                // Keep what cannot be checked.
                warn!(key = %handle.key, error = %e, "Could not resolve artifact URL");
                true
            }
        }
    }
}

fn within_grace(modified: Option<Timestamp>, grace: Duration, now: Timestamp) -> bool {
    let Some(modified) = modified else {
        return false;
    };
    let Ok(grace) = SignedDuration::try_from(grace) else {
        return true;
    };
    now.duration_since(modified) < grace
}

/// Finds artifacts that no project record points at and deletes them.
///
/// These are left behind when a submission fails after its upload.
pub fn sweep_orphans(
    metadata: &impl MetadataStore,
    artifacts: &impl ArtifactStore,
    parameters: SweepOrphansParameters,
) -> Result<SweepReport, SweepOrphansError> {
    let references = References::from_projects(metadata.list_all()?);

    let handles = artifacts
        .list()
        .map_err(SweepOrphansError::ListArtifacts)?;

    let now = Timestamp::now();
    let mut report = SweepReport::default();

    for handle in handles {
        if references.contains(artifacts, &handle) {
            continue;
        }
        if within_grace(handle.modified, parameters.grace, now) {
            report.recent += 1;
            continue;
        }

        report.orphans.push(handle.key.clone());
        if parameters.dry_run {
            continue;
        }

        match artifacts.delete(&handle) {
            Ok(()) => {
                info!(key = %handle.key, size = handle.size, "Deleted orphaned artifact");
                report.reclaimed_bytes += handle.size;
                report.deleted.push(handle.key);
            }
            Err(e) => {
                warn!(key = %handle.key, error = %e, "Failed to delete orphaned artifact");
                report.failed.push(FailedDeletion {
                    key: handle.key,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        orphans = report.orphans.len(),
        deleted = report.deleted.len(),
        reclaimed_bytes = report.reclaimed_bytes,
        dry_run = parameters.dry_run,
        "Sweep finished"
    );

    Ok(report)
}
