use jiff::Timestamp;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    models::{
        project::{NewProject, ProjectId, STATUS_PENDING},
        submission::{ArtifactUpload, SubmissionForm},
    },
    slug::normalize,
    storage::{
        MetadataStore, StorageError,
        artifacts::{ArtifactError, ArtifactStore, submission_key},
    },
};

const DEFAULT_CONTENT_TYPE: &str = "text/html";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    #[error("An HTML file is required")]
    MissingFile,

    #[error("File '{0}' is not an HTML file (expected text/html or a .html name)")]
    NotHtml(String),

    #[error("File name '{0}' cannot be used")]
    InvalidFileName(String),

    #[error("File '{0}' is empty")]
    EmptyFile(String),
}

#[derive(Debug, Error)]
pub enum SubmitProjectError {
    #[error("Invalid submission: {0}")]
    Validation(#[from] ValidationError),

    #[error("A project with slug '{0}' already exists")]
    Conflict(String),

    #[error("Failed to upload the HTML file: {0}")]
    Upload(#[source] ArtifactError),

    #[error("Failed to save the project: {0}")]
    Persist(#[source] StorageError),
}

pub struct SubmitProjectParameters {
    pub form: SubmissionForm,
    pub file: Option<ArtifactUpload>,
}

pub struct SubmitProjectResult {
    pub id: ProjectId,
    pub slug: String,
    pub html_file_url: String,
}

/// Checked and trimmed submission, ready for side effects
struct ValidSubmission {
    student_name: String,
    project_title: String,
    slug: String,
    description: String,
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(trimmed.to_string())
}

fn validate(parameters: SubmitProjectParameters) -> Result<ValidSubmission, ValidationError> {
    let form = parameters.form;
    let student_name = required(&form.student_name, "studentName")?;
    let project_title = required(&form.project_title, "projectTitle")?;
    let slug = required(&form.slug, "slug")?;
    let description = required(&form.description, "description")?;

    let file = parameters.file.ok_or(ValidationError::MissingFile)?;
    if !file.looks_like_html() {
        return Err(ValidationError::NotHtml(file.file_name));
    }
    let file_name = file
        .base_name()
        .map(String::from)
        .ok_or_else(|| ValidationError::InvalidFileName(file.file_name.clone()))?;
    if file.bytes.is_empty() {
        return Err(ValidationError::EmptyFile(file_name));
    }

    Ok(ValidSubmission {
        student_name,
        project_title,
        slug: normalize(&slug),
        description,
        file_name,
        content_type: file
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        bytes: file.bytes,
    })
}

/// Validates a submission, stores its HTML file and records its metadata.
///
/// The artifact is always written before the record, so a listed project
/// never points at a missing file. An artifact is never replaced: a slug whose
/// object already exists is a conflict. A failure after the upload leaves an
/// orphaned artifact behind; `sweep_orphans` reclaims those.
pub fn submit_project(
    metadata: &impl MetadataStore,
    artifacts: &impl ArtifactStore,
    parameters: SubmitProjectParameters,
) -> Result<SubmitProjectResult, SubmitProjectError> {
    let submission = validate(parameters)?;
    let slug = submission.slug;

    let existing = metadata.list_all().map_err(SubmitProjectError::Persist)?;
    if existing.iter().any(|p| p.slug() == Some(slug.as_str())) {
        return Err(SubmitProjectError::Conflict(slug));
    }

    // The listing may already be stale; the store refuses to replace an
    // object, so a concurrent duplicate still cannot overwrite the file.
    let key = submission_key(&slug, &submission.file_name);
    let handle = artifacts
        .put(&key, &submission.bytes, &submission.content_type)
        .map_err(|e| match e {
            ArtifactError::AlreadyExists(_) => SubmitProjectError::Conflict(slug.clone()),
            other => SubmitProjectError::Upload(other),
        })?;

    let html_file_url = artifacts.resolve_url(&handle).map_err(|e| {
        warn!(key = %handle.key, "Artifact stored but its URL could not be resolved");
        SubmitProjectError::Upload(e)
    })?;

    let new_project = NewProject {
        student_name: submission.student_name,
        project_title: submission.project_title,
        slug: slug.clone(),
        description: submission.description,
        html_file_url: html_file_url.clone(),
        artifact_key: handle.key.clone(),
        created_at: Timestamp::now(),
        status: STATUS_PENDING.to_string(),
    };

    let id = metadata.insert(new_project).map_err(|e| {
        warn!(key = %handle.key, error = %e, "Artifact stored without a project record");
        match e {
            StorageError::SlugConflict(slug) => SubmitProjectError::Conflict(slug),
            other => SubmitProjectError::Persist(other),
        }
    })?;

    info!(%id, slug = %slug, url = %html_file_url, "Project submitted");

    Ok(SubmitProjectResult {
        id,
        slug,
        html_file_url,
    })
}
