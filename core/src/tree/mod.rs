//! Lazily materialized file tree for the drive browser.
//!
//! The cache holds a forest of [`FsNode`]s. Directories start unloaded and
//! are filled one level at a time by a [`ChildFetcher`]; a fetch is
//! identified by a [`FetchTicket`] so its result can be applied later, after
//! the tree may have been renamed around it.

mod fetch;
pub mod local;
pub mod mock;

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub use fetch::ChildFetcher;
pub use fetch::FetchError;
pub use fetch::ROOT_PATH;
pub use local::LocalDirFetcher;
pub use mock::MockFileSystem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FsNode {
    Directory(DirectoryNode),
    File(FileNode),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FsNode>>,
    #[serde(default)]
    pub loaded: bool,
    #[serde(skip)]
    pub expanded: bool,
    #[serde(skip)]
    pub load_state: LoadState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub modified: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Failed(String),
}

impl FsNode {
    pub fn directory(name: impl Into<String>) -> Self {
        FsNode::Directory(DirectoryNode {
            name: name.into(),
            ..DirectoryNode::default()
        })
    }

    pub fn directory_with(name: impl Into<String>, children: Vec<FsNode>) -> Self {
        FsNode::Directory(DirectoryNode {
            name: name.into(),
            children: Some(children),
            loaded: true,
            ..DirectoryNode::default()
        })
    }

    pub fn file(name: impl Into<String>, size: u64, modified: impl Into<String>) -> Self {
        FsNode::File(FileNode {
            name: name.into(),
            path: String::new(),
            size,
            modified: modified.into(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            FsNode::Directory(dir) => &dir.name,
            FsNode::File(file) => &file.name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FsNode::Directory(dir) => &dir.path,
            FsNode::File(file) => &file.path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FsNode::Directory(_))
    }

    pub fn as_dir(&self) -> Option<&DirectoryNode> {
        match self {
            FsNode::Directory(dir) => Some(dir),
            FsNode::File(_) => None,
        }
    }

    fn as_dir_mut(&mut self) -> Option<&mut DirectoryNode> {
        match self {
            FsNode::Directory(dir) => Some(dir),
            FsNode::File(_) => None,
        }
    }

    fn set_name(&mut self, name: &str) {
        match self {
            FsNode::Directory(dir) => dir.name = name.to_string(),
            FsNode::File(file) => file.name = name.to_string(),
        }
    }

    /// Place the node under `parent`, rebuilding every path in the subtree.
    /// A directory that arrives with children counts as loaded.
    fn adopt(&mut self, parent: Option<&str>) {
        let path = child_path(parent, self.name());
        match self {
            FsNode::File(file) => file.path = path,
            FsNode::Directory(dir) => {
                dir.path = path;
                if let Some(children) = dir.children.as_mut() {
                    dir.loaded = true;
                    for child in children.iter_mut() {
                        child.adopt(Some(&dir.path));
                    }
                } else {
                    dir.loaded = false;
                }
            }
        }
    }

    /// Swap the `old` prefix for `new` in this subtree's paths.
    fn rebase(&mut self, old: &str, new: &str) {
        let rebased = rebase_path(self.path(), old, new);
        match self {
            FsNode::File(file) => {
                if let Some(path) = rebased {
                    file.path = path;
                }
            }
            FsNode::Directory(dir) => {
                if let Some(path) = rebased {
                    dir.path = path;
                }
                for child in dir.children.iter_mut().flatten() {
                    child.rebase(old, new);
                }
            }
        }
    }
}

/// `/name` at top level, `parent/name` below.
pub fn child_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        None => format!("/{name}"),
        Some(parent) if parent.is_empty() || parent == ROOT_PATH => format!("/{name}"),
        Some(parent) => format!("{parent}/{name}"),
    }
}

/// Parent directory of `path`, `None` for top-level nodes.
pub fn parent_path(path: &str) -> Option<&str> {
    match path.rfind('/') {
        Some(0) | None => None,
        Some(idx) => Some(&path[..idx]),
    }
}

fn rebase_path(path: &str, old: &str, new: &str) -> Option<String> {
    if path == old {
        return Some(new.to_string());
    }
    path.strip_prefix(old)
        .filter(|rest| rest.starts_with('/'))
        .map(|rest| format!("{new}{rest}"))
}

fn is_at_or_under(path: &str, root: &str) -> bool {
    rebase_path(path, root, root).is_some()
}

fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.trim().is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("no node at `{0}`")]
    NotFound(String),
    #[error("`{0}` is not a directory")]
    NotADirectory(String),
    #[error("invalid name `{0}`")]
    InvalidName(String),
    #[error("`{0}` already exists")]
    NameConflict(String),
    #[error("contents of `{0}` are not loaded yet")]
    NotLoaded(String),
    #[error("cannot move `{0}` into itself")]
    InvalidMove(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub id: u64,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandAction {
    /// Children were already loaded; the directory is now expanded.
    Ready,
    /// A fetch for this directory is still running.
    InFlight,
    /// The caller must fetch children and hand them to `complete_fetch`.
    Fetch(FetchTicket),
    Collapsed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Directory { expanded: bool },
    File { size: u64, modified: String },
    Loading,
    Failed(String),
}

/// One line of the flattened, expanded tree. Placeholder rows (`Loading`,
/// `Failed`) carry the path of the directory they belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub depth: usize,
    pub name: String,
    pub path: String,
    pub kind: RowKind,
}

#[derive(Debug, Default)]
pub struct TreeCache {
    roots: Vec<FsNode>,
    tickets: HashMap<u64, String>,
    next_ticket: u64,
}

impl TreeCache {
    pub fn new(roots: Vec<FsNode>) -> Self {
        let mut cache = Self::default();
        cache.replace_roots(roots);
        cache
    }

    pub fn replace_roots(&mut self, mut roots: Vec<FsNode>) {
        for node in roots.iter_mut() {
            node.adopt(None);
        }
        self.roots = roots;
        self.tickets.clear();
    }

    pub fn roots(&self) -> &[FsNode] {
        &self.roots
    }

    pub fn find(&self, path: &str) -> Option<&FsNode> {
        find_node(&self.roots, path)
    }

    pub fn pending_fetches(&self) -> usize {
        self.tickets.len()
    }

    fn dir_mut(&mut self, path: &str) -> Result<&mut DirectoryNode, TreeError> {
        find_node_mut(&mut self.roots, path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?
            .as_dir_mut()
            .ok_or_else(|| TreeError::NotADirectory(path.to_string()))
    }

    /// Children list that `parent` owns, the root list for `None`.
    fn siblings_mut(&mut self, parent: Option<&str>) -> Result<&mut Vec<FsNode>, TreeError> {
        match parent {
            None => Ok(&mut self.roots),
            Some(path) => {
                let dir = self.dir_mut(path)?;
                dir.children
                    .as_mut()
                    .ok_or_else(|| TreeError::NotLoaded(path.to_string()))
            }
        }
    }

    pub fn request_expand(&mut self, path: &str) -> Result<ExpandAction, TreeError> {
        let dir = self.dir_mut(path)?;
        dir.expanded = true;
        if dir.loaded {
            return Ok(ExpandAction::Ready);
        }
        if dir.load_state == LoadState::Loading {
            return Ok(ExpandAction::InFlight);
        }
        dir.load_state = LoadState::Loading;

        let id = self.next_ticket;
        self.next_ticket += 1;
        self.tickets.insert(id, path.to_string());
        debug!(path, ticket = id, "fetching children");
        Ok(ExpandAction::Fetch(FetchTicket {
            id,
            path: path.to_string(),
        }))
    }

    /// Apply the result of a fetch. Returns `false` for tickets that no
    /// longer point at a directory.
    pub fn complete_fetch(&mut self, ticket: u64, result: Result<Vec<FsNode>, FetchError>) -> bool {
        let Some(path) = self.tickets.remove(&ticket) else {
            debug!(ticket, "ignoring stale fetch");
            return false;
        };
        let Ok(dir) = self.dir_mut(&path) else {
            return false;
        };
        match result {
            Ok(mut children) => {
                for child in children.iter_mut() {
                    child.adopt(Some(&dir.path));
                }
                dir.children = Some(children);
                dir.loaded = true;
                dir.load_state = LoadState::Idle;
            }
            Err(err) => {
                dir.load_state = LoadState::Failed(err.to_string());
            }
        }
        true
    }

    /// Expand `path`, fetching its children through `fetcher` when needed.
    pub async fn expand(
        &mut self,
        path: &str,
        fetcher: &dyn ChildFetcher,
    ) -> Result<ExpandAction, TreeError> {
        let action = self.request_expand(path)?;
        if let ExpandAction::Fetch(ticket) = &action {
            let result = fetcher.fetch_children(&ticket.path).await;
            self.complete_fetch(ticket.id, result);
        }
        Ok(action)
    }

    pub fn collapse(&mut self, path: &str) -> Result<(), TreeError> {
        self.dir_mut(path)?.expanded = false;
        Ok(())
    }

    pub fn toggle(&mut self, path: &str) -> Result<ExpandAction, TreeError> {
        if self.dir_mut(path)?.expanded {
            self.collapse(path)?;
            Ok(ExpandAction::Collapsed)
        } else {
            self.request_expand(path)
        }
    }

    /// Rename the node at `path`; returns its new path.
    pub fn rename(&mut self, path: &str, new_name: &str) -> Result<String, TreeError> {
        validate_name(new_name)?;
        if self.find(path).is_none() {
            return Err(TreeError::NotFound(path.to_string()));
        }
        let parent = parent_path(path).map(str::to_string);
        let new_path = child_path(parent.as_deref(), new_name);
        if new_path == path {
            return Ok(new_path);
        }

        let siblings = self.siblings_mut(parent.as_deref())?;
        if siblings.iter().any(|node| node.name() == new_name) {
            return Err(TreeError::NameConflict(new_path));
        }
        let Some(node) = siblings.iter_mut().find(|node| node.path() == path) else {
            return Err(TreeError::NotFound(path.to_string()));
        };
        node.set_name(new_name);
        node.rebase(path, &new_path);
        self.rebase_tickets(path, &new_path);
        Ok(new_path)
    }

    /// Move the node at `path` under `new_parent` (top level for `None`).
    /// The target directory must already be loaded.
    pub fn move_node(&mut self, path: &str, new_parent: Option<&str>) -> Result<String, TreeError> {
        let name = self
            .find(path)
            .map(|node| node.name().to_string())
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        if new_parent.is_some_and(|target| is_at_or_under(target, path)) {
            return Err(TreeError::InvalidMove(path.to_string()));
        }
        let new_path = child_path(new_parent, &name);
        if new_path == path {
            return Ok(new_path);
        }
        if self
            .siblings_mut(new_parent)?
            .iter()
            .any(|node| node.name() == name)
        {
            return Err(TreeError::NameConflict(new_path));
        }

        let mut node = self.detach(path)?;
        node.rebase(path, &new_path);
        self.siblings_mut(new_parent)?.push(node);
        self.rebase_tickets(path, &new_path);
        Ok(new_path)
    }

    /// Remove the node and its subtree. Fetches still running below it are
    /// forgotten.
    pub fn delete(&mut self, path: &str) -> Result<FsNode, TreeError> {
        let node = self.detach(path)?;
        self.tickets.retain(|_, pending| !is_at_or_under(pending, path));
        Ok(node)
    }

    /// Add a new node under `parent` (top level for `None`); returns its path.
    pub fn insert(&mut self, parent: Option<&str>, mut node: FsNode) -> Result<String, TreeError> {
        validate_name(node.name())?;
        node.adopt(parent);
        let path = node.path().to_string();
        let siblings = self.siblings_mut(parent)?;
        if siblings.iter().any(|existing| existing.name() == node.name()) {
            return Err(TreeError::NameConflict(path));
        }
        siblings.push(node);
        Ok(path)
    }

    /// Forget the loaded contents of a directory so the next expand
    /// fetches them again.
    pub fn invalidate(&mut self, path: &str) -> Result<(), TreeError> {
        let dir = self.dir_mut(path)?;
        dir.children = None;
        dir.loaded = false;
        dir.expanded = false;
        dir.load_state = LoadState::Idle;
        self.tickets.retain(|_, pending| !is_at_or_under(pending, path));
        Ok(())
    }

    /// Pre-order flattening of the expanded part of the forest.
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        for node in &self.roots {
            collect_rows(node, 0, &mut rows);
        }
        rows
    }

    fn detach(&mut self, path: &str) -> Result<FsNode, TreeError> {
        let parent = parent_path(path).map(str::to_string);
        let siblings = self
            .siblings_mut(parent.as_deref())
            .map_err(|_| TreeError::NotFound(path.to_string()))?;
        let idx = siblings
            .iter()
            .position(|node| node.path() == path)
            .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
        Ok(siblings.remove(idx))
    }

    fn rebase_tickets(&mut self, old: &str, new: &str) {
        for pending in self.tickets.values_mut() {
            if let Some(path) = rebase_path(pending, old, new) {
                *pending = path;
            }
        }
    }
}

fn find_node<'a>(nodes: &'a [FsNode], path: &str) -> Option<&'a FsNode> {
    nodes.iter().find_map(|node| {
        if node.path() == path {
            return Some(node);
        }
        match node {
            FsNode::Directory(dir) => dir
                .children
                .as_deref()
                .and_then(|children| find_node(children, path)),
            FsNode::File(_) => None,
        }
    })
}

fn find_node_mut<'a>(nodes: &'a mut [FsNode], path: &str) -> Option<&'a mut FsNode> {
    nodes.iter_mut().find_map(|node| {
        if node.path() == path {
            return Some(node);
        }
        match node {
            FsNode::Directory(dir) => dir
                .children
                .as_deref_mut()
                .and_then(|children| find_node_mut(children, path)),
            FsNode::File(_) => None,
        }
    })
}

fn collect_rows(node: &FsNode, depth: usize, rows: &mut Vec<VisibleRow>) {
    match node {
        FsNode::File(file) => rows.push(VisibleRow {
            depth,
            name: file.name.clone(),
            path: file.path.clone(),
            kind: RowKind::File {
                size: file.size,
                modified: file.modified.clone(),
            },
        }),
        FsNode::Directory(dir) => {
            rows.push(VisibleRow {
                depth,
                name: dir.name.clone(),
                path: dir.path.clone(),
                kind: RowKind::Directory {
                    expanded: dir.expanded,
                },
            });
            if !dir.expanded {
                return;
            }
            let placeholder = match &dir.load_state {
                LoadState::Loading => Some(("loading…".to_string(), RowKind::Loading)),
                LoadState::Failed(message) => {
                    Some((message.clone(), RowKind::Failed(message.clone())))
                }
                LoadState::Idle => None,
            };
            if let Some((name, kind)) = placeholder {
                rows.push(VisibleRow {
                    depth: depth + 1,
                    name,
                    path: dir.path.clone(),
                    kind,
                });
            }
            for child in dir.children.iter().flatten() {
                collect_rows(child, depth + 1, rows);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    fn sample() -> TreeCache {
        TreeCache::new(vec![
            FsNode::directory_with(
                "server",
                vec![
                    FsNode::directory_with(
                        "config",
                        vec![FsNode::file("server.properties", 1024, "2023-05-15")],
                    ),
                    FsNode::directory("plugins"),
                    FsNode::file("eula.txt", 256, "2023-05-01"),
                ],
            ),
            FsNode::directory("backups"),
        ])
    }

    fn paths(cache: &TreeCache) -> Vec<String> {
        cache.visible_rows().into_iter().map(|row| row.path).collect()
    }

    fn expand_all(cache: &mut TreeCache, dirs: &[&str]) {
        for dir in dirs {
            assert_eq!(cache.request_expand(dir), Ok(ExpandAction::Ready));
        }
    }

    #[test]
    fn paths_are_built_from_names() {
        let cache = sample();
        let node = cache.find("/server/config/server.properties");
        assert_matches!(node, Some(FsNode::File(file)) if file.size == 1024);
        assert_eq!(cache.find("/backups").map(FsNode::path), Some("/backups"));
        assert!(cache.find("/server/config").and_then(FsNode::as_dir).is_some_and(|dir| dir.loaded));
        assert!(cache.find("/server/plugins").and_then(FsNode::as_dir).is_some_and(|dir| !dir.loaded));
    }

    #[test]
    fn expand_issues_one_fetch_per_directory() {
        let mut cache = sample();
        let ticket = match cache.request_expand("/backups") {
            Ok(ExpandAction::Fetch(ticket)) => ticket,
            other => panic!("expected fetch, got {other:?}"),
        };
        assert_eq!(ticket.path, "/backups");
        assert_eq!(cache.request_expand("/backups"), Ok(ExpandAction::InFlight));
        assert_eq!(cache.pending_fetches(), 1);

        let rows = cache.visible_rows();
        assert_eq!(rows[1].kind, RowKind::Directory { expanded: true });
        assert_eq!(rows[2].kind, RowKind::Loading);

        let children = vec![FsNode::file("world.zip", 4096, "2023-06-01")];
        assert!(cache.complete_fetch(ticket.id, Ok(children)));
        assert_eq!(
            cache.find("/backups/world.zip").map(FsNode::path),
            Some("/backups/world.zip")
        );
        assert_eq!(cache.request_expand("/backups"), Ok(ExpandAction::Ready));
        assert!(!cache.complete_fetch(ticket.id, Ok(Vec::new())), "ticket used up");
    }

    #[test]
    fn failed_fetch_is_shown_and_retried() {
        let mut cache = sample();
        let Ok(ExpandAction::Fetch(first)) = cache.request_expand("/backups") else {
            panic!("expected fetch");
        };
        assert!(cache.complete_fetch(first.id, Err(FetchError::Remote("timeout".to_string()))));

        let rows = cache.visible_rows();
        assert_eq!(rows[2].kind, RowKind::Failed("timeout".to_string()));
        assert_eq!(rows[2].path, "/backups");

        assert_matches!(cache.request_expand("/backups"), Ok(ExpandAction::Fetch(second)) if second.id != first.id);
    }

    #[test]
    fn expanding_a_file_or_missing_path_fails() {
        let mut cache = sample();
        expand_all(&mut cache, &["/server"]);
        assert_eq!(
            cache.request_expand("/server/eula.txt"),
            Err(TreeError::NotADirectory("/server/eula.txt".to_string()))
        );
        assert_eq!(
            cache.request_expand("/nope"),
            Err(TreeError::NotFound("/nope".to_string()))
        );
    }

    #[test]
    fn visible_rows_follow_expansion_in_pre_order() {
        let mut cache = sample();
        assert_eq!(paths(&cache), vec!["/server", "/backups"]);
        expand_all(&mut cache, &["/server", "/server/config"]);
        assert_eq!(
            paths(&cache),
            vec![
                "/server",
                "/server/config",
                "/server/config/server.properties",
                "/server/plugins",
                "/server/eula.txt",
                "/backups",
            ]
        );
        let depths: Vec<_> = cache.visible_rows().iter().map(|row| row.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 1, 1, 0]);

        assert_eq!(cache.toggle("/server"), Ok(ExpandAction::Collapsed));
        assert_eq!(paths(&cache), vec!["/server", "/backups"]);
    }

    #[test]
    fn rename_rewrites_descendants_and_pending_tickets() {
        let mut cache = sample();
        let Ok(ExpandAction::Fetch(ticket)) = cache.request_expand("/server/plugins") else {
            panic!("expected fetch");
        };

        assert_eq!(cache.rename("/server", "srv"), Ok("/srv".to_string()));
        assert!(cache.find("/server").is_none());
        assert_eq!(
            cache.find("/srv/config/server.properties").map(FsNode::name),
            Some("server.properties")
        );

        let children = vec![FsNode::file("EssentialsX.jar", 5120, "2023-05-10")];
        assert!(cache.complete_fetch(ticket.id, Ok(children)));
        assert_eq!(
            cache.find("/srv/plugins/EssentialsX.jar").map(FsNode::path),
            Some("/srv/plugins/EssentialsX.jar")
        );
    }

    #[test]
    fn rename_does_not_touch_lookalike_prefixes() {
        let mut cache = TreeCache::new(vec![
            FsNode::directory_with("a", vec![FsNode::file("x", 1, "")]),
            FsNode::directory_with("ab", vec![FsNode::file("y", 1, "")]),
        ]);
        assert_eq!(cache.rename("/a", "c"), Ok("/c".to_string()));
        assert!(cache.find("/ab/y").is_some());
        assert!(cache.find("/c/x").is_some());
    }

    #[test]
    fn rename_validates_names() {
        let mut cache = sample();
        assert_eq!(
            cache.rename("/server", "backups"),
            Err(TreeError::NameConflict("/backups".to_string()))
        );
        assert_eq!(
            cache.rename("/server", "a/b"),
            Err(TreeError::InvalidName("a/b".to_string()))
        );
        assert_eq!(
            cache.rename("/server", "  "),
            Err(TreeError::InvalidName("  ".to_string()))
        );
        assert_eq!(
            cache.rename("/missing", "x"),
            Err(TreeError::NotFound("/missing".to_string()))
        );
        assert_eq!(cache.rename("/server", "server"), Ok("/server".to_string()));
    }

    #[test]
    fn move_reparents_subtree() {
        let mut cache = sample();
        let Ok(ExpandAction::Fetch(ticket)) = cache.request_expand("/backups") else {
            panic!("expected fetch");
        };
        assert!(cache.complete_fetch(ticket.id, Ok(Vec::new())));

        assert_eq!(
            cache.move_node("/server/config", Some("/backups")),
            Ok("/backups/config".to_string())
        );
        assert!(cache.find("/server/config").is_none());
        assert!(cache.find("/backups/config/server.properties").is_some());

        assert_eq!(
            cache.move_node("/backups/config", None),
            Ok("/config".to_string())
        );
        assert_eq!(
            cache.move_node("/server", Some("/server/plugins")),
            Err(TreeError::InvalidMove("/server".to_string()))
        );
        assert_eq!(
            cache.move_node("/config", Some("/server/plugins")),
            Err(TreeError::NotLoaded("/server/plugins".to_string()))
        );
    }

    #[test]
    fn delete_prunes_subtree_and_stale_fetches() {
        let mut cache = sample();
        let Ok(ExpandAction::Fetch(ticket)) = cache.request_expand("/server/plugins") else {
            panic!("expected fetch");
        };
        let removed = cache.delete("/server");
        assert_matches!(removed, Ok(FsNode::Directory(dir)) if dir.name == "server");
        assert!(cache.find("/server/config").is_none());
        assert_eq!(cache.pending_fetches(), 0);
        assert!(!cache.complete_fetch(ticket.id, Ok(Vec::new())));
        assert_eq!(
            cache.delete("/server"),
            Err(TreeError::NotFound("/server".to_string()))
        );
    }

    #[test]
    fn insert_places_new_nodes() {
        let mut cache = sample();
        assert_eq!(
            cache.insert(None, FsNode::file("upload.zip", 10, "2024-01-01")),
            Ok("/upload.zip".to_string())
        );
        assert_eq!(
            cache.insert(
                Some("/server"),
                FsNode::directory_with("logs", vec![FsNode::file("latest.log", 3, "")])
            ),
            Ok("/server/logs".to_string())
        );
        assert!(cache.find("/server/logs/latest.log").is_some());
        assert_eq!(
            cache.insert(Some("/server"), FsNode::directory("logs")),
            Err(TreeError::NameConflict("/server/logs".to_string()))
        );
        assert_eq!(
            cache.insert(Some("/backups"), FsNode::directory("x")),
            Err(TreeError::NotLoaded("/backups".to_string()))
        );
    }

    #[test]
    fn invalidate_forces_a_refetch() {
        let mut cache = sample();
        expand_all(&mut cache, &["/server"]);
        assert_eq!(cache.invalidate("/server"), Ok(()));
        assert!(cache.find("/server/config").is_none());
        assert_matches!(cache.request_expand("/server"), Ok(ExpandAction::Fetch(_)));
    }

    #[tokio::test]
    async fn expand_drives_the_fetcher() {
        let fetcher = MockFileSystem::sample().with_latency(std::time::Duration::ZERO);
        let roots = fetcher.fetch_roots().await.unwrap_or_default();
        let mut cache = TreeCache::new(roots);
        assert_eq!(paths(&cache), vec!["/server"]);

        let action = cache.expand("/server", &fetcher).await;
        assert_matches!(action, Ok(ExpandAction::Fetch(_)));
        assert!(cache.find("/server/server.jar").is_some());
        assert_eq!(cache.expand("/server", &fetcher).await, Ok(ExpandAction::Ready));
    }

    struct CountingFetcher {
        inner: MockFileSystem,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ChildFetcher for CountingFetcher {
        async fn fetch_children(&self, path: &str) -> Result<Vec<FsNode>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_children(path).await
        }
    }

    #[tokio::test]
    async fn collapse_then_expand_reuses_loaded_children() {
        let fetcher = CountingFetcher {
            inner: MockFileSystem::sample().with_latency(std::time::Duration::ZERO),
            calls: AtomicUsize::new(0),
        };
        let mut cache = TreeCache::new(vec![FsNode::directory("server")]);

        assert_matches!(cache.expand("/server", &fetcher).await, Ok(ExpandAction::Fetch(_)));
        assert_eq!(cache.toggle("/server"), Ok(ExpandAction::Collapsed));
        assert_eq!(paths(&cache), vec!["/server"]);
        assert_eq!(cache.expand("/server", &fetcher).await, Ok(ExpandAction::Ready));

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(cache.find("/server/server.jar").is_some());
    }

    #[test]
    fn nested_rename_rewrites_every_descendant() {
        let mut cache = TreeCache::new(vec![FsNode::directory_with(
            "root",
            vec![FsNode::directory_with(
                "old",
                vec![
                    FsNode::directory_with(
                        "world",
                        vec![FsNode::directory_with(
                            "region",
                            vec![FsNode::file("r.0.0.mca", 8, "")],
                        )],
                    ),
                    FsNode::file("level.dat", 4, ""),
                ],
            )],
        )]);

        assert_eq!(cache.rename("/root/old", "new"), Ok("/root/new".to_string()));
        for path in [
            "/root/new",
            "/root/new/world",
            "/root/new/world/region",
            "/root/new/world/region/r.0.0.mca",
            "/root/new/level.dat",
        ] {
            assert_eq!(cache.find(path).map(FsNode::path), Some(path));
        }
        assert!(cache.find("/root/old/world/region/r.0.0.mca").is_none());
    }

    #[test]
    fn wire_format_tags_node_type() {
        let node: FsNode = serde_json::from_str(
            r#"{"type":"directory","name":"mods","path":"/server/mods","children":[]}"#,
        )
        .unwrap_or_else(|err| panic!("decode: {err}"));
        let mut cache = TreeCache::new(vec![node]);
        assert_eq!(cache.request_expand("/mods"), Ok(ExpandAction::Ready));

        let encoded = serde_json::to_value(FsNode::file("a.txt", 1, "2024-01-01")).ok();
        assert_eq!(
            encoded,
            Some(serde_json::json!({
                "type": "file", "name": "a.txt", "path": "", "size": 1, "modified": "2024-01-01"
            }))
        );
    }
}
