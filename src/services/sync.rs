use std::{
    fmt,
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    fetch::{ArtifactFetcher, FetchError},
    models::project::{Project, ProjectId},
    slug::is_canonical,
    storage::{MetadataStore, StorageError},
};

/// File every published project is materialized as
pub const INDEX_FILE: &str = "index.html";

/// What to do with the rest of the batch once a project fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop at the first failure, leaving later projects untouched
    #[default]
    Abort,
    /// Record the failure and move on to the next project
    Continue,
}

#[derive(Debug, Error)]
pub enum SyncProjectsError {
    #[error("Failed to list projects: {0}")]
    ListFailed(#[from] StorageError),

    #[error("Another sync is already running (lock '{0}' is held)")]
    AlreadyRunning(PathBuf),

    #[error("Failed to acquire sync lock '{path}': {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
enum MaterializeError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    MissingSlug,
    MissingUrl,
    NonCanonicalSlug,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::MissingSlug => "missing slug",
            SkipReason::MissingUrl => "missing HTML file URL",
            SkipReason::NonCanonicalSlug => "slug is not a safe folder name",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedProject {
    pub id: ProjectId,
    pub title: String,
    pub slug: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedProject {
    pub id: ProjectId,
    pub slug: String,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub untouched: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct SyncReport {
    pub policy: FailurePolicy,
    /// Number of records returned by the metadata store
    pub total: usize,
    /// Slugs materialized, in processing order
    pub written: Vec<String>,
    pub skipped: Vec<SkippedProject>,
    pub failed: Vec<FailedProject>,
    /// Records never looked at because the batch was aborted
    pub untouched: usize,
    pub aborted: bool,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }

    pub fn counts(&self) -> SyncCounts {
        SyncCounts {
            total: self.total,
            written: self.written.len(),
            skipped: self.skipped.len(),
            failed: self.failed.len(),
            untouched: self.untouched,
        }
    }
}

pub struct SyncProjectsParameters {
    /// Root of the static hosting mirror; projects land in `<root>/<slug>/index.html`
    pub root: PathBuf,
    pub policy: FailurePolicy,
    /// Lock file guarding against overlapping runs, if any
    pub lock_path: Option<PathBuf>,
}

fn acquire_lock(path: &Path) -> Result<File, SyncProjectsError> {
    let lock_failed = |e| SyncProjectsError::LockFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(lock_failed)?;
    }

    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(lock_failed)?;

    match lock_file.try_lock_exclusive() {
        Ok(()) => Ok(lock_file),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
            Err(SyncProjectsError::AlreadyRunning(path.to_path_buf()))
        }
        Err(e) => Err(lock_failed(e)),
    }
}

fn publishable(project: &Project) -> Result<(&str, &str), SkipReason> {
    let slug = project.slug().ok_or(SkipReason::MissingSlug)?;
    let url = project.html_file_url().ok_or(SkipReason::MissingUrl)?;
    if !is_canonical(slug) {
        return Err(SkipReason::NonCanonicalSlug);
    }
    Ok((slug, url))
}

/// Replaces `path` through a hidden sibling temp file and a rename, so the
/// static host sees either the old file or the new one.
fn write_replacing(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp.{}", file_name, Uuid::new_v4()));

    if let Err(e) = fs::write(&temp_path, bytes).and_then(|()| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}

fn materialize(
    fetcher: &impl ArtifactFetcher,
    root: &Path,
    slug: &str,
    url: &str,
) -> Result<PathBuf, MaterializeError> {
    let project_dir = root.join(slug);
    fs::create_dir_all(&project_dir).map_err(|e| MaterializeError::CreateDir {
        path: project_dir.clone(),
        source: e,
    })?;

    let bytes = fetcher.fetch(url)?;

    let index_path = project_dir.join(INDEX_FILE);
    write_replacing(&index_path, &bytes).map_err(|e| MaterializeError::Write {
        path: index_path.clone(),
        source: e,
    })?;

    Ok(index_path)
}

/// Mirrors every project's HTML file into `<root>/<slug>/index.html`.
///
/// Records without a slug or URL are skipped and never stop the batch.
/// A failing download or write stops it under [`FailurePolicy::Abort`] and
/// is only recorded under [`FailurePolicy::Continue`]. Existing files are
/// overwritten and nothing is ever deleted, so re-running over unchanged
/// records produces the same tree.
pub fn sync_projects(
    metadata: &impl MetadataStore,
    fetcher: &impl ArtifactFetcher,
    parameters: SyncProjectsParameters,
) -> Result<SyncReport, SyncProjectsError> {
    let _lock = parameters
        .lock_path
        .as_deref()
        .map(acquire_lock)
        .transpose()?;

    let projects = metadata.list_all()?;
    info!(
        count = projects.len(),
        root = %parameters.root.display(),
        policy = ?parameters.policy,
        "Starting sync"
    );

    let mut report = SyncReport {
        policy: parameters.policy,
        total: projects.len(),
        ..SyncReport::default()
    };

    for (index, project) in projects.iter().enumerate() {
        let (slug, url) = match publishable(project) {
            Ok(target) => target,
            Err(reason) => {
                warn!(id = %project.id, title = %project.project_title, %reason, "Skipping project");
                report.skipped.push(SkippedProject {
                    id: project.id,
                    title: project.project_title.clone(),
                    slug: project.slug.clone(),
                    reason,
                });
                continue;
            }
        };

        info!(slug, title = %project.project_title, "Downloading project");
        match materialize(fetcher, &parameters.root, slug, url) {
            Ok(path) => {
                info!(slug, path = %path.display(), "Project published");
                report.written.push(slug.to_string());
            }
            Err(e) => {
                error!(slug, error = %e, "Failed to publish project");
                report.failed.push(FailedProject {
                    id: project.id,
                    slug: slug.to_string(),
                    error: e.to_string(),
                });

                if parameters.policy == FailurePolicy::Abort {
                    report.aborted = true;
                    report.untouched = projects.len() - index - 1;
                    break;
                }
            }
        }
    }

    let counts = report.counts();
    info!(
        written = counts.written,
        skipped = counts.skipped,
        failed = counts.failed,
        untouched = counts.untouched,
        "Sync finished"
    );

    Ok(report)
}
