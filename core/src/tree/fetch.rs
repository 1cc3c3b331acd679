use async_trait::async_trait;
use thiserror::Error;

use super::FsNode;

/// Virtual path whose children are the top-level nodes of the drive.
pub const ROOT_PATH: &str = "/";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no directory at `{0}`")]
    NotFound(String),
    #[error("`{0}` escapes the drive root")]
    OutsideRoot(String),
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Remote(String),
}

/// Loads one level of the remote namespace on demand.
///
/// Returned nodes may carry any `path`; the tree cache rebuilds paths under
/// the directory that requested them.
#[async_trait]
pub trait ChildFetcher: Send + Sync {
    async fn fetch_children(&self, path: &str) -> Result<Vec<FsNode>, FetchError>;

    async fn fetch_roots(&self) -> Result<Vec<FsNode>, FetchError> {
        self.fetch_children(ROOT_PATH).await
    }
}
