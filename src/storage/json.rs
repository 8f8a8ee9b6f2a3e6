use std::{
    fs::{self, File, OpenOptions, rename, write},
    path::PathBuf,
};

use fs2::FileExt;
use serde_json::to_string_pretty;
use tracing::debug;
use uuid::Uuid;

use crate::{
    models::{
        project::{NewProject, Project, ProjectId},
        store::{CURRENT_VERSION, Store},
    },
    storage::{
        MetadataStore, StorageError,
        migrations::{apply_migrations, detect_version},
    },
};

/// Metadata collection persisted as a single pretty-printed JSON document.
///
/// Writers serialize on an exclusive lock file next to the document, and
/// replace the document with a rename so readers never see a partial write.
pub struct JsonFileMetadataStore {
    path: PathBuf,
}

impl JsonFileMetadataStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn lock(&self) -> Result<File, StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StorageError::SaveFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let lock_file_path = self.lock_path();
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_file_path)
            .map_err(|e| StorageError::LockFailed {
                path: lock_file_path.clone(),
                source: e,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::LockFailed {
                path: lock_file_path,
                source: e,
            })?;

        Ok(lock_file)
    }

    fn read(&self) -> Result<Store, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Store::default()),
            Err(e) => {
                return Err(StorageError::LoadFailed {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        let mut data: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| StorageError::ParseFailed {
                path: self.path.clone(),
                source: e,
            })?;

        let file_version = detect_version(&self.path, &data)?;
        if file_version > CURRENT_VERSION {
            return Err(StorageError::FutureVersion(file_version));
        }
        if file_version < CURRENT_VERSION {
            data = apply_migrations(data, file_version, CURRENT_VERSION)?;
        }

        if let Some(obj) = data.as_object_mut() {
            obj.insert("version".to_string(), serde_json::json!(CURRENT_VERSION));
        }

        serde_json::from_value(data).map_err(|e| StorageError::ParseFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    fn write(&self, store: &Store) -> Result<(), StorageError> {
        let json =
            to_string_pretty(store).map_err(|e| StorageError::SerializeFailed { source: e })?;

        let temp_path = PathBuf::from(format!("{}.tmp.{}", self.path.display(), Uuid::new_v4()));
        write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::SaveFailed {
                path: self.path.clone(),
                source: e,
            }
        })
    }
}

impl MetadataStore for JsonFileMetadataStore {
    fn list_all(&self) -> Result<Vec<Project>, StorageError> {
        Ok(self.read()?.projects)
    }

    fn insert(&self, project: NewProject) -> Result<ProjectId, StorageError> {
        let lock_file = self.lock()?;

        // Read under the lock so the slug check and the write are one step.
        let mut store = self.read()?;
        if store.find_by_slug(&project.slug).is_some() {
            return Err(StorageError::SlugConflict(project.slug));
        }

        let id = Uuid::new_v4();
        store.add_project(Project::from_new(id, project));
        self.write(&store)?;

        lock_file.unlock().map_err(|e| StorageError::LockFailed {
            path: self.lock_path(),
            source: e,
        })?;

        debug!(%id, path = %self.path.display(), "Inserted project record");
        Ok(id)
    }
}
