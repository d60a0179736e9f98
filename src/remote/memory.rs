//! In-memory remote tree
//!
//! A `MemoryTree` behaves like a remote server: it can be listed through
//! sessions, records every listing it serves, and can be told to fail
//! specific listings or connection attempts. Clones share the same tree, so
//! a test can keep a handle while the crawler owns the connector.

use crate::error::{RemoteError, RemoteResult};
use crate::remote::types::{join_path, RemoteEntry};
use crate::remote::{Connector, RemoteSource};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    /// Directory path -> children in listing order
    dirs: HashMap<String, Vec<RemoteEntry>>,

    /// Listings that fail with the given error
    failures: HashMap<String, RemoteError>,

    /// Error returned by every connect attempt, if set
    connect_failure: Option<RemoteError>,

    /// Listings served before the session drops, if set
    listings_before_drop: Option<usize>,

    /// Every path listed, in order
    history: Vec<String>,

    sessions_opened: usize,
    sessions_closed: usize,
}

/// Shared, mutable in-memory remote tree
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryTree {
    /// Create a tree containing only "/"
    pub fn new() -> Self {
        let tree = Self::default();
        tree.inner.lock().dirs.insert("/".to_string(), Vec::new());
        tree
    }

    /// Add a directory (and any missing ancestors)
    pub fn add_dir(&self, path: &str) {
        let mut inner = self.inner.lock();
        ensure_dir(&mut inner, path);
    }

    /// Add a file with size and Unix mtime (and any missing ancestors)
    pub fn add_file(&self, path: &str, size: u64, mtime: i64) {
        let (parent, name) = split_parent(path);
        let mut inner = self.inner.lock();
        ensure_dir(&mut inner, &parent);
        let children = inner.dirs.entry(parent).or_default();
        children.retain(|c| c.name != name);
        children.push(RemoteEntry::file(name, size, mtime));
    }

    /// Add a child of an arbitrary kind (symlinks, devices)
    pub fn add_entry(&self, dir: &str, entry: RemoteEntry) {
        let mut inner = self.inner.lock();
        ensure_dir(&mut inner, dir);
        if entry.kind.is_dir() {
            inner.dirs.entry(join_path(dir, &entry.name)).or_default();
        }
        let children = inner.dirs.entry(dir.to_string()).or_default();
        children.retain(|c| c.name != entry.name);
        children.push(entry);
    }

    /// Remove a file or a whole subtree
    pub fn remove(&self, path: &str) {
        let (parent, name) = split_parent(path);
        let mut inner = self.inner.lock();
        if let Some(children) = inner.dirs.get_mut(&parent) {
            children.retain(|c| c.name != name);
        }
        let prefix = format!("{}/", path.trim_end_matches('/'));
        inner
            .dirs
            .retain(|dir, _| dir != path && !dir.starts_with(&prefix));
    }

    /// Make every listing of `path` fail with `error`
    pub fn fail_listing(&self, path: &str, error: RemoteError) {
        self.inner.lock().failures.insert(path.to_string(), error);
    }

    /// Make every connect attempt fail with `error`
    pub fn fail_connect(&self, error: RemoteError) {
        self.inner.lock().connect_failure = Some(error);
    }

    /// Drop the session after `count` successful listings (across sessions)
    pub fn drop_session_after(&self, count: usize) {
        self.inner.lock().listings_before_drop = Some(count);
    }

    /// Clear injected failures
    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.failures.clear();
        inner.connect_failure = None;
        inner.listings_before_drop = None;
    }

    /// Every path listed so far, in order
    pub fn listed(&self) -> Vec<String> {
        self.inner.lock().history.clone()
    }

    /// Whether `path` was ever listed
    pub fn was_listed(&self, path: &str) -> bool {
        self.inner.lock().history.iter().any(|p| p == path)
    }

    pub fn clear_history(&self) {
        self.inner.lock().history.clear();
    }

    /// (opened, closed) session counts
    pub fn session_counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.sessions_opened, inner.sessions_closed)
    }

    /// Open a session directly, bypassing connect failures
    pub fn session(&self) -> MemorySession {
        self.inner.lock().sessions_opened += 1;
        MemorySession {
            tree: self.clone(),
            open: true,
        }
    }

    /// Connector handing out sessions on this tree
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector { tree: self.clone() }
    }

    fn list(&self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        let mut inner = self.inner.lock();
        inner.history.push(path.to_string());

        if let Some(remaining) = inner.listings_before_drop.as_mut() {
            if *remaining == 0 {
                return Err(RemoteError::SessionLost {
                    reason: "connection reset by peer".into(),
                });
            }
            *remaining -= 1;
        }

        if let Some(err) = inner.failures.get(path) {
            return Err(err.clone());
        }

        inner
            .dirs
            .get(path)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                path: path.to_string(),
            })
    }
}

fn split_parent(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/".to_string(), trimmed[1..].to_string()),
        Some(pos) => (trimmed[..pos].to_string(), trimmed[pos + 1..].to_string()),
        None => ("/".to_string(), trimmed.to_string()),
    }
}

fn ensure_dir(inner: &mut Inner, path: &str) {
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    if inner.dirs.contains_key(path) {
        return;
    }
    if path == "/" || path.is_empty() {
        inner.dirs.insert("/".to_string(), Vec::new());
        return;
    }
    let (parent, name) = split_parent(path);
    ensure_dir(inner, &parent);
    inner.dirs.insert(path.to_string(), Vec::new());
    let siblings = inner.dirs.entry(parent).or_default();
    if !siblings.iter().any(|c| c.name == name) {
        siblings.push(RemoteEntry::directory(name));
    }
}

/// Session over a `MemoryTree`
#[derive(Debug)]
pub struct MemorySession {
    tree: MemoryTree,
    open: bool,
}

impl RemoteSource for MemorySession {
    fn list(&mut self, path: &str) -> RemoteResult<Vec<RemoteEntry>> {
        if !self.open {
            return Err(RemoteError::SessionLost {
                reason: "session already closed".into(),
            });
        }
        let entries = self.tree.list(path)?;
        Ok(entries.into_iter().filter(|e| !e.is_special()).collect())
    }

    fn close(&mut self) -> RemoteResult<()> {
        if self.open {
            self.open = false;
            self.tree.inner.lock().sessions_closed += 1;
        }
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Connector for a `MemoryTree`
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    tree: MemoryTree,
}

impl Connector for MemoryConnector {
    type Source = MemorySession;

    fn connect(&self) -> RemoteResult<MemorySession> {
        if let Some(err) = self.tree.inner.lock().connect_failure.clone() {
            return Err(err);
        }
        Ok(self.tree.session())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}
