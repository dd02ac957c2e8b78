//! Plugin discovery on disk.

use crate::dylib::DylibLoader;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// How deep below each search path the scanner descends.
const MAX_DEPTH: usize = 4;

/// A candidate plugin library found on disk. Not opened yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScannedPlugin {
    pub path: PathBuf,
    /// File stem, used as a display name until the plugin is loaded.
    pub name: String,
}

/// Finds plugin libraries under a set of search paths.
///
/// Nothing is loaded while scanning. Blacklisted paths (plugins that crashed
/// or failed to load before) are skipped.
#[derive(Debug, Clone, Default)]
pub struct PluginScanner {
    search_paths: Vec<PathBuf>,
    blacklist: HashSet<PathBuf>,
}

impl PluginScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanner preloaded with the platform's conventional plugin folders.
    pub fn with_default_paths() -> Self {
        let mut scanner = Self::new();
        for path in default_search_paths() {
            scanner.add_path(path);
        }
        scanner
    }

    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        let path = path.into();
        if !self.search_paths.contains(&path) {
            self.search_paths.push(path);
        }
        self
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn blacklist(&mut self, path: impl Into<PathBuf>) {
        self.blacklist.insert(path.into());
    }

    pub fn is_blacklisted(&self, path: &Path) -> bool {
        self.blacklist.contains(path)
    }

    /// Walks every search path. Missing or unreadable directories are
    /// logged and skipped.
    pub fn scan(&self) -> Vec<ScannedPlugin> {
        let mut found = Vec::new();
        for root in &self.search_paths {
            if !root.is_dir() {
                tracing::debug!(path = %root.display(), "Plugin search path does not exist");
                continue;
            }
            self.scan_dir(root, 0, &mut found);
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found.dedup();
        tracing::info!(count = found.len(), "Plugin scan complete");
        found
    }

    fn scan_dir(&self, dir: &Path, depth: usize, found: &mut Vec<ScannedPlugin>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to read plugin directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if depth + 1 < MAX_DEPTH {
                    self.scan_dir(&path, depth + 1, found);
                }
                continue;
            }
            if !DylibLoader::is_plugin_file(&path) {
                continue;
            }
            if self.is_blacklisted(&path) {
                tracing::debug!(path = %path.display(), "Skipping blacklisted plugin");
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                found.push(ScannedPlugin {
                    name: name.to_string(),
                    path: path.clone(),
                });
            }
        }
    }
}

/// Conventional per-user and system plugin folders for this platform.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(data) = dirs::data_dir() {
        paths.push(data.join("concerto").join("plugins"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".concerto").join("plugins"));
    }
    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/lib/concerto/plugins"));
        paths.push(PathBuf::from("/usr/local/lib/concerto/plugins"));
    }
    #[cfg(target_os = "macos")]
    paths.push(PathBuf::from("/Library/Audio/Plug-Ins/Concerto"));
    #[cfg(target_os = "windows")]
    paths.push(PathBuf::from(r"C:\Program Files\Common Files\Concerto"));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_not_empty() {
        assert!(!default_search_paths().is_empty());
    }

    #[test]
    fn test_add_path_dedups() {
        let mut scanner = PluginScanner::new();
        scanner.add_path("/a").add_path("/a").add_path("/b");
        assert_eq!(scanner.search_paths().len(), 2);
    }

    #[test]
    fn test_missing_directory_scans_empty() {
        let mut scanner = PluginScanner::new();
        scanner.add_path("/definitely/not/here");
        assert!(scanner.scan().is_empty());
    }
}
