use std::{
    fs,
    path::{Path, PathBuf},
};

use jiff::Timestamp;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Invalid artifact key '{0}'")]
    InvalidKey(String),

    #[error("Artifact '{0}' does not exist")]
    NotFound(String),

    #[error("Artifact '{0}' already exists")]
    AlreadyExists(String),

    #[error("Failed to store artifact '{key}': {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to resolve URL for artifact '{key}': {source}")]
    ResolveFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list artifacts in '{dir}': {source}")]
    ListFailed {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to delete artifact '{key}': {source}")]
    DeleteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reference to a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// `/`-separated object key
    pub key: String,
    pub size: u64,
    /// Last modification time, when the backend knows it
    pub modified: Option<Timestamp>,
}

/// Key prefix shared by every object uploaded for `slug`
pub fn submission_prefix(slug: &str) -> String {
    format!("submissions/{}/", slug)
}

/// Key under which a submission's HTML file is stored
pub fn submission_key(slug: &str, file_name: &str) -> String {
    format!("{}{}", submission_prefix(slug), file_name)
}

/// A key-addressed blob store.
pub trait ArtifactStore {
    /// Stores `bytes` under `key`.
    ///
    /// An existing object is never replaced: the call fails with
    /// [`ArtifactError::AlreadyExists`] instead.
    fn put(&self, key: &str, bytes: &[u8], content_type: &str)
    -> Result<ArtifactHandle, ArtifactError>;

    /// A URL from which the object can be downloaded
    fn resolve_url(&self, handle: &ArtifactHandle) -> Result<String, ArtifactError>;

    /// Every stored object, ordered by key
    fn list(&self) -> Result<Vec<ArtifactHandle>, ArtifactError>;

    fn delete(&self, handle: &ArtifactHandle) -> Result<(), ArtifactError>;
}

/// Blob store backed by a local directory tree.
///
/// URLs are built from a public base URL when one is configured (the tree is
/// then expected to be served at that address), and are `file://` URLs
/// otherwise.
pub struct FsArtifactStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FsArtifactStore {
    pub fn new(root: PathBuf, public_base_url: Option<String>) -> Self {
        Self {
            root,
            public_base_url,
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ArtifactError> {
        let valid = !key.is_empty()
            && key
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
            && !key.contains('\\');
        if !valid {
            return Err(ArtifactError::InvalidKey(key.to_string()));
        }

        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Option<Vec<&str>> =
            relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(segments?.join("/"))
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().contains(".tmp."))
        .unwrap_or(false)
}

fn modified_at(metadata: &fs::Metadata) -> Option<Timestamp> {
    metadata
        .modified()
        .ok()
        .and_then(|time| Timestamp::try_from(time).ok())
}

impl ArtifactStore for FsArtifactStore {
    fn put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<ArtifactHandle, ArtifactError> {
        let path = self.path_for(key)?;
        let write_failed = |e| ArtifactError::WriteFailed {
            key: key.to_string(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        // Linking the complete temp file into place fails if the key is taken.
        let temp_path = PathBuf::from(format!("{}.tmp.{}", path.display(), Uuid::new_v4()));
        let linked = fs::write(&temp_path, bytes).and_then(|()| fs::hard_link(&temp_path, &path));
        let _ = fs::remove_file(&temp_path);
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ArtifactError::AlreadyExists(key.to_string()));
            }
            Err(e) => return Err(write_failed(e)),
        }

        debug!(key, content_type, size = bytes.len(), "Stored artifact");

        Ok(ArtifactHandle {
            key: key.to_string(),
            size: bytes.len() as u64,
            modified: Some(Timestamp::now()),
        })
    }

    fn resolve_url(&self, handle: &ArtifactHandle) -> Result<String, ArtifactError> {
        let path = self.path_for(&handle.key)?;
        if !path.is_file() {
            return Err(ArtifactError::NotFound(handle.key.clone()));
        }

        match &self.public_base_url {
            Some(base) => Ok(format!("{}/{}", base.trim_end_matches('/'), handle.key)),
            None => {
                let absolute = fs::canonicalize(&path).map_err(|e| ArtifactError::ResolveFailed {
                    key: handle.key.clone(),
                    source: e,
                })?;
                Ok(format!("file://{}", absolute.display()))
            }
        }
    }

    fn list(&self) -> Result<Vec<ArtifactHandle>, ArtifactError> {
        if !self.root.exists() {
            return Ok(vec![]);
        }

        let mut handles = vec![];
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| ArtifactError::ListFailed {
                dir: self.root.clone(),
                source: e,
            })?;
            if !entry.file_type().is_file() || is_temp_file(entry.path()) {
                continue;
            }
            let Some(key) = self.key_for(entry.path()) else {
                continue;
            };
            let metadata = entry.metadata().map_err(|e| ArtifactError::ListFailed {
                dir: self.root.clone(),
                source: e,
            })?;

            handles.push(ArtifactHandle {
                key,
                size: metadata.len(),
                modified: modified_at(&metadata),
            });
        }

        handles.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(handles)
    }

    fn delete(&self, handle: &ArtifactHandle) -> Result<(), ArtifactError> {
        let path = self.path_for(&handle.key)?;
        fs::remove_file(&path).map_err(|e| ArtifactError::DeleteFailed {
            key: handle.key.clone(),
            source: e,
        })?;

        // Drop directories the removal left empty, stopping at the root.
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root.as_path() || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_submission_key() {
        assert_eq!(
            submission_key("mon-projet", "index.html"),
            "submissions/mon-projet/index.html"
        );
    }

    #[test]
    fn test_put_and_resolve_file_url() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().join("blobs"), None);

        let handle = store
            .put("submissions/demo/index.html", b"<h1>hi</h1>", "text/html")
            .unwrap();
        let url = store.resolve_url(&handle).unwrap();

        assert_eq!(handle.size, 11);
        assert!(url.starts_with("file://"), "unexpected url {}", url);
        assert!(url.ends_with("submissions/demo/index.html"));
        let path = url.strip_prefix("file://").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"<h1>hi</h1>");
    }

    #[test]
    fn test_resolve_with_public_base_url() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(
            dir.path().to_path_buf(),
            Some(String::from("https://cdn.example/files/")),
        );

        let handle = store
            .put("submissions/demo/index.html", b"x", "text/html")
            .unwrap();

        assert_eq!(
            store.resolve_url(&handle).unwrap(),
            "https://cdn.example/files/submissions/demo/index.html"
        );
    }

    #[test]
    fn test_put_never_replaces_existing_object() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf(), None);

        store.put("submissions/a/index.html", b"first", "text/html").unwrap();
        let second = store.put("submissions/a/index.html", b"second", "text/html");

        assert!(matches!(
            second,
            Err(ArtifactError::AlreadyExists(key)) if key == "submissions/a/index.html"
        ));
        let stored = fs::read(dir.path().join("submissions/a/index.html")).unwrap();
        assert_eq!(stored, b"first");
        assert_eq!(fs::read_dir(dir.path().join("submissions/a")).unwrap().count(), 1);
    }

    #[test]
    fn test_submission_prefix_covers_its_keys() {
        let key = submission_key("mon-projet", "index.html");

        assert!(key.starts_with(&submission_prefix("mon-projet")));
        assert!(!key.starts_with(&submission_prefix("mon")));
    }

    #[test]
    fn test_rejects_traversal_keys() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf(), None);

        for key in ["", "../escape.html", "submissions//index.html", "a/./b", "a\\b"] {
            match store.put(key, b"x", "text/html") {
                Err(ArtifactError::InvalidKey(_)) => {}
                other => panic!("Expected InvalidKey for '{}', got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_resolve_missing_object() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf(), None);
        let handle = ArtifactHandle {
            key: String::from("submissions/ghost/index.html"),
            size: 0,
            modified: None,
        };

        assert!(matches!(
            store.resolve_url(&handle),
            Err(ArtifactError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("blobs");
        let store = FsArtifactStore::new(root.clone(), None);

        assert!(store.list().unwrap().is_empty());

        store.put("submissions/b/index.html", b"b", "text/html").unwrap();
        store.put("submissions/a/index.html", b"a", "text/html").unwrap();

        let handles = store.list().unwrap();
        let keys: Vec<_> = handles.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["submissions/a/index.html", "submissions/b/index.html"]
        );
        assert!(handles.iter().all(|h| h.modified.is_some()));

        store.delete(&handles[0]).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert!(!root.join("submissions/a").exists());
        assert!(root.join("submissions/b").exists());
    }
}
