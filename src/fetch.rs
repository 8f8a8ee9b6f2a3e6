use std::{fs, path::PathBuf, time::Duration};

use reqwest::blocking::Client;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Download of '{url}' failed with HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("Download of '{url}' timed out")]
    Timeout { url: String },

    #[error("Failed to download '{url}': {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to read '{path}': local files are only read from the artifact store")]
    LocalFileRejected { path: PathBuf },

    #[error("Unsupported artifact URL '{0}'")]
    UnsupportedUrl(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Downloads artifact bytes from their retrievable URL.
pub trait ArtifactFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetches `http(s)://` URLs with a bounded timeout per request.
///
/// `file://` URLs are refused unless [`HttpFetcher::allow_local_files`] names
/// a root, and are then read only when they resolve to a file under it.
pub struct HttpFetcher {
    client: Client,
    local_root: Option<PathBuf>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            client,
            local_root: None,
        })
    }

    pub fn allow_local_files(self, root: PathBuf) -> Self {
        Self {
            local_root: Some(root),
            ..self
        }
    }

    fn transport_error(url: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }

    fn read_local(&self, path: PathBuf) -> Result<Vec<u8>, FetchError> {
        let root = self
            .local_root
            .as_deref()
            .and_then(|root| fs::canonicalize(root).ok());
        let Some(root) = root else {
            return Err(FetchError::LocalFileRejected { path });
        };

        // Symlinks and `..` are resolved before the containment check.
        let resolved = match fs::canonicalize(&path) {
            Ok(resolved) => resolved,
            Err(e) => return Err(FetchError::LocalRead { path, source: e }),
        };
        if !resolved.starts_with(&root) {
            return Err(FetchError::LocalFileRejected { path });
        }

        fs::read(&resolved).map_err(|e| FetchError::LocalRead { path, source: e })
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            return self.read_local(PathBuf::from(path));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FetchError::UnsupportedUrl(url.to_string()));
        }

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Self::transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .map_err(|e| Self::transport_error(url, e))?;
        debug!(url, size = bytes.len(), "Downloaded artifact");

        Ok(bytes.to_vec())
    }
}
