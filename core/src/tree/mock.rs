use std::time::Duration;

use async_trait::async_trait;

use super::ChildFetcher;
use super::FetchError;
use super::FsNode;
use super::ROOT_PATH;
use super::TreeCache;

pub const DEFAULT_MOCK_LATENCY: Duration = Duration::from_millis(1500);

/// In-memory drive used offline. Serves one level per request after a
/// simulated network delay.
#[derive(Debug)]
pub struct MockFileSystem {
    tree: TreeCache,
    latency: Duration,
}

impl MockFileSystem {
    pub fn new(roots: Vec<FsNode>) -> Self {
        Self {
            tree: TreeCache::new(roots),
            latency: DEFAULT_MOCK_LATENCY,
        }
    }

    /// A small game-server layout.
    pub fn sample() -> Self {
        Self::new(vec![FsNode::directory_with(
            "server",
            vec![
                FsNode::directory_with("mods", Vec::new()),
                FsNode::directory_with(
                    "config",
                    vec![
                        FsNode::file("server.properties", 1024, "2023-05-15"),
                        FsNode::file("bukkit.yml", 2048, "2023-05-14"),
                    ],
                ),
                FsNode::directory_with(
                    "plugins",
                    vec![
                        FsNode::file("EssentialsX.jar", 5120, "2023-05-10"),
                        FsNode::file("WorldEdit.jar", 4096, "2023-05-09"),
                    ],
                ),
                FsNode::file("server.jar", 102_400, "2023-05-01"),
                FsNode::file("eula.txt", 256, "2023-05-01"),
            ],
        )])
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Copy of `node` without its children, as the remote would send it.
fn shallow(node: &FsNode) -> FsNode {
    match node {
        FsNode::File(_) => node.clone(),
        FsNode::Directory(dir) => FsNode::directory(dir.name.clone()),
    }
}

#[async_trait]
impl ChildFetcher for MockFileSystem {
    async fn fetch_children(&self, path: &str) -> Result<Vec<FsNode>, FetchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if path == ROOT_PATH {
            return Ok(self.tree.roots().iter().map(shallow).collect());
        }
        let children = self
            .tree
            .find(path)
            .and_then(FsNode::as_dir)
            .and_then(|dir| dir.children.as_ref())
            .ok_or_else(|| FetchError::NotFound(path.to_string()))?;
        Ok(children.iter().map(shallow).collect())
    }
}
