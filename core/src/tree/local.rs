use std::cmp::Ordering;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Local;
use tracing::warn;

use super::ChildFetcher;
use super::FetchError;
use super::FsNode;

const MAX_CHILDREN_PER_DIR: usize = 200;

/// Serves a local directory as the drive. Virtual `/a/b` maps to
/// `<root>/a/b`.
#[derive(Debug, Clone)]
pub struct LocalDirFetcher {
    root: PathBuf,
}

impl LocalDirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FetchError> {
        let mut resolved = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(FetchError::OutsideRoot(path.to_string()));
                }
            }
        }
        Ok(resolved)
    }
}

fn sort_rank(node: &FsNode) -> u8 {
    if node.is_dir() { 0 } else { 1 }
}

fn compare_nodes(a: &FsNode, b: &FsNode) -> Ordering {
    sort_rank(a)
        .cmp(&sort_rank(b))
        .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        .then_with(|| a.name().cmp(b.name()))
}

fn format_modified(modified: std::io::Result<std::time::SystemTime>) -> String {
    modified
        .map(|time| DateTime::<Local>::from(time).format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[async_trait]
impl ChildFetcher for LocalDirFetcher {
    async fn fetch_children(&self, path: &str) -> Result<Vec<FsNode>, FetchError> {
        let dir = self.resolve(path)?;
        let io_error = |source: std::io::Error| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(path.to_string())
            } else {
                FetchError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        };
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(io_error)?;

        let parent = Some(path).filter(|path| !path.is_empty());
        let mut nodes = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(path = %entry.path().display(), "skipping unreadable entry: {err}");
                    continue;
                }
            };
            let mut node = if metadata.is_dir() {
                FsNode::directory(name)
            } else {
                FsNode::file(name, metadata.len(), format_modified(metadata.modified()))
            };
            node.adopt(parent);
            nodes.push(node);
        }

        nodes.sort_by(compare_nodes);
        if nodes.len() > MAX_CHILDREN_PER_DIR {
            warn!(path, total = nodes.len(), "truncating directory listing");
            nodes.truncate(MAX_CHILDREN_PER_DIR);
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_directories_first_then_names() {
        let tmp = tempdir().expect("temp dir");
        std::fs::create_dir(tmp.path().join("world")).expect("world dir");
        std::fs::create_dir(tmp.path().join("Config")).expect("config dir");
        std::fs::write(tmp.path().join("server.jar"), vec![0u8; 42]).expect("jar");
        std::fs::write(tmp.path().join("Eula.txt"), "eula=true").expect("eula");

        let fetcher = LocalDirFetcher::new(tmp.path());
        let roots = fetcher.fetch_roots().await.expect("list root");
        let names: Vec<_> = roots.iter().map(FsNode::name).collect();
        assert_eq!(names, vec!["Config", "world", "Eula.txt", "server.jar"]);
        assert_eq!(roots[0].path(), "/Config");
        assert_matches!(&roots[3], FsNode::File(file) if file.size == 42 && file.modified.len() == 10);
    }

    #[tokio::test]
    async fn nested_paths_map_onto_the_root() {
        let tmp = tempdir().expect("temp dir");
        std::fs::create_dir_all(tmp.path().join("plugins/WorldEdit")).expect("dirs");
        std::fs::write(tmp.path().join("plugins/WorldEdit/config.yml"), "a: 1").expect("file");

        let fetcher = LocalDirFetcher::new(tmp.path());
        let children = fetcher
            .fetch_children("/plugins/WorldEdit")
            .await
            .expect("list nested");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].path(), "/plugins/WorldEdit/config.yml");
    }

    #[tokio::test]
    async fn rejects_escapes_and_missing_directories() {
        let tmp = tempdir().expect("temp dir");
        let fetcher = LocalDirFetcher::new(tmp.path());
        assert_matches!(
            fetcher.fetch_children("/../etc").await,
            Err(FetchError::OutsideRoot(_))
        );
        assert_matches!(
            fetcher.fetch_children("/missing").await,
            Err(FetchError::NotFound(path)) if path == "/missing"
        );
    }

    #[tokio::test]
    async fn caps_large_directories() {
        let tmp = tempdir().expect("temp dir");
        for idx in 0..(MAX_CHILDREN_PER_DIR + 5) {
            std::fs::write(tmp.path().join(format!("f{idx:03}")), "").expect("file");
        }
        let fetcher = LocalDirFetcher::new(tmp.path());
        let roots = fetcher.fetch_roots().await.expect("list");
        assert_eq!(roots.len(), MAX_CHILDREN_PER_DIR);
        assert_eq!(roots[0].name(), "f000");
    }
}
