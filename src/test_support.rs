//! In-memory stand-ins for the external stores, shared by service tests.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
};

use jiff::Timestamp;
use uuid::Uuid;

use crate::{
    fetch::{ArtifactFetcher, FetchError},
    models::project::{NewProject, Project, ProjectId, STATUS_PENDING},
    storage::{
        MetadataStore, StorageError,
        artifacts::{ArtifactError, ArtifactHandle, ArtifactStore},
    },
};

fn io_error(message: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::ConnectionRefused, message.to_string())
}

/// A ready-made record without an artifact key, as older records and
/// records written by other tools are
pub fn project(slug: &str, url: &str) -> Project {
    Project {
        id: Uuid::new_v4(),
        student_name: String::from("Jean Dupont"),
        project_title: format!("Project {}", slug),
        slug: Some(String::from(slug)),
        description: String::from("A description"),
        html_file_url: Some(String::from(url)),
        artifact_key: None,
        created_at: Some(Timestamp::now()),
        status: String::from(STATUS_PENDING),
    }
}

#[derive(Default)]
pub struct InMemoryMetadataStore {
    pub projects: RefCell<Vec<Project>>,
    pub unreachable: Cell<bool>,
    pub reject_inserts: Cell<bool>,
    /// `list_all` answers with an empty collection, like a read taken just
    /// before another submitter's insert
    pub stale_listing: Cell<bool>,
    pub inserts: Cell<usize>,
}

impl InMemoryMetadataStore {
    pub fn with_projects(projects: Vec<Project>) -> Self {
        Self {
            projects: RefCell::new(projects),
            ..Self::default()
        }
    }

    fn unreachable_error(&self) -> StorageError {
        StorageError::LoadFailed {
            path: "memory://projects".into(),
            source: io_error("metadata store unreachable"),
        }
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn list_all(&self) -> Result<Vec<Project>, StorageError> {
        if self.unreachable.get() {
            return Err(self.unreachable_error());
        }
        if self.stale_listing.get() {
            return Ok(vec![]);
        }
        Ok(self.projects.borrow().clone())
    }

    fn insert(&self, project: NewProject) -> Result<ProjectId, StorageError> {
        if self.unreachable.get() {
            return Err(self.unreachable_error());
        }
        if self.reject_inserts.get() {
            return Err(StorageError::SaveFailed {
                path: "memory://projects".into(),
                source: io_error("insert rejected"),
            });
        }
        if self
            .projects
            .borrow()
            .iter()
            .any(|p| p.slug() == Some(project.slug.as_str()))
        {
            return Err(StorageError::SlugConflict(project.slug));
        }

        let id = Uuid::new_v4();
        self.projects.borrow_mut().push(Project::from_new(id, project));
        self.inserts.set(self.inserts.get() + 1);
        Ok(id)
    }
}

#[derive(Default)]
pub struct InMemoryArtifactStore {
    pub objects: RefCell<BTreeMap<String, Vec<u8>>>,
    pub content_types: RefCell<HashMap<String, String>>,
    pub modified: RefCell<HashMap<String, Timestamp>>,
    pub reject_puts: Cell<bool>,
    pub reject_resolves: Cell<bool>,
    pub puts: Cell<usize>,
}

impl InMemoryArtifactStore {
    pub fn url_for(key: &str) -> String {
        format!("memory://artifacts/{}", key)
    }

    /// Stores an object directly, bypassing the counters
    pub fn seed(&self, key: &str, bytes: &[u8], modified: Timestamp) {
        self.objects
            .borrow_mut()
            .insert(key.to_string(), bytes.to_vec());
        self.modified.borrow_mut().insert(key.to_string(), modified);
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<ArtifactHandle, ArtifactError> {
        if self.reject_puts.get() {
            return Err(ArtifactError::WriteFailed {
                key: key.to_string(),
                source: io_error("artifact store unreachable"),
            });
        }
        if self.objects.borrow().contains_key(key) {
            return Err(ArtifactError::AlreadyExists(key.to_string()));
        }

        let now = Timestamp::now();
        self.objects
            .borrow_mut()
            .insert(key.to_string(), bytes.to_vec());
        self.content_types
            .borrow_mut()
            .insert(key.to_string(), content_type.to_string());
        self.modified.borrow_mut().insert(key.to_string(), now);
        self.puts.set(self.puts.get() + 1);

        Ok(ArtifactHandle {
            key: key.to_string(),
            size: bytes.len() as u64,
            modified: Some(now),
        })
    }

    fn resolve_url(&self, handle: &ArtifactHandle) -> Result<String, ArtifactError> {
        if self.reject_resolves.get() {
            return Err(ArtifactError::ResolveFailed {
                key: handle.key.clone(),
                source: io_error("artifact store unreachable"),
            });
        }
        if !self.objects.borrow().contains_key(&handle.key) {
            return Err(ArtifactError::NotFound(handle.key.clone()));
        }
        Ok(Self::url_for(&handle.key))
    }

    fn list(&self) -> Result<Vec<ArtifactHandle>, ArtifactError> {
        let modified = self.modified.borrow();
        Ok(self
            .objects
            .borrow()
            .iter()
            .map(|(key, bytes)| ArtifactHandle {
                key: key.clone(),
                size: bytes.len() as u64,
                modified: modified.get(key).copied(),
            })
            .collect())
    }

    fn delete(&self, handle: &ArtifactHandle) -> Result<(), ArtifactError> {
        self.objects
            .borrow_mut()
            .remove(&handle.key)
            .map(|_| ())
            .ok_or_else(|| ArtifactError::NotFound(handle.key.clone()))
    }
}

/// Serves canned responses; any other URL answers 404.
#[derive(Default)]
pub struct StaticFetcher {
    pub responses: HashMap<String, Vec<u8>>,
    pub calls: RefCell<Vec<String>>,
}

impl StaticFetcher {
    pub fn with(responses: &[(&str, &str)]) -> Self {
        Self {
            responses: responses
                .iter()
                .map(|(url, body)| (url.to_string(), body.as_bytes().to_vec()))
                .collect(),
            ..Self::default()
        }
    }
}

impl ArtifactFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.borrow_mut().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}
