//! Process-wide workspace state.
//!
//! Holds the directory new terminal sessions spawn in. The session core only
//! ever reads the value; updating it (workspace selection, folder pickers)
//! is the embedding application's concern. Sessions snapshot the directory
//! at spawn time, so a change applies to the next session, never to ones
//! already running.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Shared handle to the current workspace directory.
///
/// Cloning the handle shares the underlying value. Reads are
/// last-write-wins with respect to concurrent `set` calls, which is
/// acceptable: sessions are long-lived relative to workspace changes and
/// each new session simply observes whatever directory is current.
#[derive(Debug, Clone)]
pub struct WorkspaceState {
    dir: Arc<RwLock<PathBuf>>,
}

impl WorkspaceState {
    /// Creates a handle rooted at the given directory.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir: Arc::new(RwLock::new(dir)),
        }
    }

    /// Creates a handle rooted at the daemon's own working directory.
    pub fn from_process_cwd() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// Snapshot of the current workspace directory.
    pub fn current(&self) -> PathBuf {
        self.dir.read().unwrap().clone()
    }

    /// Replaces the workspace directory. Called by the embedding
    /// application, never by the session core.
    pub fn set(&self, dir: PathBuf) {
        *self.dir.write().unwrap() = dir;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_returns_initial_dir() {
        let state = WorkspaceState::new(PathBuf::from("/tmp"));
        assert_eq!(state.current(), PathBuf::from("/tmp"));
    }

    #[test]
    fn test_set_is_visible_through_clones() {
        let state = WorkspaceState::new(PathBuf::from("/tmp"));
        let clone = state.clone();

        state.set(PathBuf::from("/var"));
        assert_eq!(clone.current(), PathBuf::from("/var"));
    }

    #[test]
    fn test_snapshots_are_independent() {
        let state = WorkspaceState::new(PathBuf::from("/tmp"));
        let snapshot = state.current();

        state.set(PathBuf::from("/var"));
        // The earlier snapshot is a copy, not a live reference.
        assert_eq!(snapshot, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_from_process_cwd() {
        let state = WorkspaceState::from_process_cwd().unwrap();
        assert!(state.current().is_absolute());
    }
}
