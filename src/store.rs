// src/store.rs
//! Write-once artifacts under the data directory.
//!
//! Layout:
//!   <data_dir>/<event>/rules.json
//!   <data_dir>/<event>/project_NNN_<title>.json
//!   <data_dir>/<event>/ideas.txt
//!   <data_dir>/<reports_dir>/fraud_report_<name>_<timestamp>.txt
//!
//! A file's existence is the cross-run cache; nothing here is re-read except
//! to serve that cache or an API read.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::scout::StorageConfig;
use crate::event::RulesDocument;
use crate::extract::ProjectDetail;

pub const RULES_FILE: &str = "rules.json";
pub const IDEAS_FILE: &str = "ideas.txt";

const MAX_TITLE_CHARS: usize = 40;

/// `Cool App! (v2)` -> `Cool_App_v2`, at most 40 chars.
pub fn safe_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim()
        .replace(' ', "_")
        .replace("__", "_")
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

pub fn project_file_name(index: usize, title: &str) -> String {
    format!("project_{index:03}_{}.json", safe_title(title))
}

fn is_project_file(name: &str) -> bool {
    name.starts_with("project_") && name.ends_with(".json")
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(tmp, path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let s = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomic(path, s.as_bytes())
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    reports: PathBuf,
}

impl ArtifactStore {
    pub fn new(cfg: &StorageConfig) -> Self {
        Self {
            root: cfg.data_dir.clone(),
            reports: cfg.data_dir.join(&cfg.reports_dir),
        }
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            reports: root.join("reports"),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn event_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    pub fn rules_path(&self, slug: &str) -> PathBuf {
        self.event_dir(slug).join(RULES_FILE)
    }

    pub fn ideas_path(&self, slug: &str) -> PathBuf {
        self.event_dir(slug).join(IDEAS_FILE)
    }

    // ---- rules ----

    /// Cached rules, or `None` when absent or unreadable.
    pub fn load_rules(&self, slug: &str) -> Option<RulesDocument> {
        let p = self.rules_path(slug);
        let raw = fs::read_to_string(&p).ok()?;
        match serde_json::from_str(&raw) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "ignoring unreadable rules cache");
                None
            }
        }
    }

    pub fn save_rules(&self, slug: &str, rules: &RulesDocument) -> io::Result<PathBuf> {
        let p = self.rules_path(slug);
        write_json(&p, rules)?;
        tracing::info!(path = %p.display(), sections = rules.rules_data.len(), "rules saved");
        Ok(p)
    }

    /// Schedule text from a stored `rules.json` inside `folder`, if any.
    pub fn schedule_text(&self, folder: &str) -> Option<String> {
        let dir = self.resolve_artifact(folder)?;
        let raw = fs::read_to_string(dir.join(RULES_FILE)).ok()?;
        let doc: RulesDocument = serde_json::from_str(&raw).ok()?;
        let text = doc.rules_data.get("schedule")?.text.clone();
        (!text.trim().is_empty()).then_some(text)
    }

    // ---- winners ----

    /// Every stored project of an event, in file-name order. `None` when the
    /// folder is missing or holds no project files.
    pub fn load_winners(&self, slug: &str) -> Option<Vec<ProjectDetail>> {
        let dir = self.event_dir(slug);
        let mut names: Vec<PathBuf> = fs::read_dir(&dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(is_project_file)
                    .unwrap_or(false)
            })
            .collect();
        names.sort();

        let projects: Vec<ProjectDetail> = names
            .iter()
            .filter_map(|p| {
                let raw = fs::read_to_string(p).ok()?;
                serde_json::from_str(&raw)
                    .map_err(|e| tracing::warn!(path = %p.display(), error = %e, "skipping unreadable project"))
                    .ok()
            })
            .collect();
        (!projects.is_empty()).then_some(projects)
    }

    pub fn save_winner(&self, slug: &str, index: usize, title: &str, detail: &ProjectDetail) -> io::Result<PathBuf> {
        let p = self.event_dir(slug).join(project_file_name(index, title));
        write_json(&p, detail)?;
        Ok(p)
    }

    /// Remove an event folder that ended up empty.
    pub fn remove_if_empty(&self, slug: &str) {
        let dir = self.event_dir(slug);
        let empty = fs::read_dir(&dir)
            .map(|mut it| it.next().is_none())
            .unwrap_or(false);
        if empty {
            match fs::remove_dir(&dir) {
                Ok(()) => tracing::info!(dir = %dir.display(), "removed empty event folder"),
                Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "could not remove empty folder"),
            }
        }
    }

    // ---- ideas ----

    pub fn save_ideas(&self, slug: &str, contents: &str) -> io::Result<PathBuf> {
        let p = self.ideas_path(slug);
        write_atomic(&p, contents.as_bytes())?;
        tracing::info!(path = %p.display(), bytes = contents.len(), "ideas saved");
        Ok(p)
    }

    /// Map a caller-supplied artifact path onto the data dir. Paths may be
    /// given with or without the data-dir prefix; parent components and
    /// absolute paths are refused.
    pub fn resolve_artifact(&self, requested: &str) -> Option<PathBuf> {
        let raw = Path::new(requested);
        let rel = match raw.strip_prefix(&self.root) {
            Ok(r) => r,
            Err(_) => raw.strip_prefix("/").unwrap_or(raw),
        };
        let rel = rel.strip_prefix(&self.root).unwrap_or(rel);
        if rel.as_os_str().is_empty() || rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(rel))
    }

    pub fn read_artifact(&self, requested: &str) -> Option<String> {
        fs::read_to_string(self.resolve_artifact(requested)?).ok()
    }

    // ---- reports ----

    pub fn save_report(&self, project_name: &str, contents: &str) -> io::Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let p = self
            .reports
            .join(format!("fraud_report_{}_{stamp}.txt", safe_title(project_name)));
        write_atomic(&p, contents.as_bytes())?;
        tracing::info!(path = %p.display(), "report saved");
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_filesystem_safe() {
        assert_eq!(safe_title("Cool App! (v2)"), "Cool_App_v2");
        assert_eq!(project_file_name(3, "a/b"), "project_003_ab.json");
        assert_eq!(safe_title(&"x".repeat(60)).len(), 40);
    }

    #[test]
    fn winners_round_trip_and_empty_folder_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::at(tmp.path());
        assert!(store.load_winners("ev").is_none());

        let detail = ProjectDetail {
            title: "Alpha".into(),
            url: "https://devpost.com/software/alpha".into(),
            ..Default::default()
        };
        store.save_winner("ev", 2, "Alpha", &detail).unwrap();
        store.save_winner("ev", 1, "Beta", &ProjectDetail { title: "Beta".into(), ..Default::default() }).unwrap();
        fs::write(store.event_dir("ev").join("notes.txt"), "x").unwrap();

        let loaded = store.load_winners("ev").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].title, "Beta");

        fs::create_dir_all(store.event_dir("empty")).unwrap();
        store.remove_if_empty("empty");
        assert!(!store.event_dir("empty").exists());
        store.remove_if_empty("ev");
        assert!(store.event_dir("ev").exists());
    }

    #[test]
    fn artifact_paths_stay_inside_root() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ArtifactStore::at(tmp.path().join("data"));
        store.save_ideas("ev", "### Idea 1: X").unwrap();

        assert!(store.read_artifact("ev/ideas.txt").is_some());
        let prefixed = format!("{}/ev/ideas.txt", store.root().display());
        assert!(store.read_artifact(&prefixed).is_some());
        assert!(store.resolve_artifact("../secrets").is_none());
        assert!(store.resolve_artifact("ev/../../x").is_none());
        assert!(store.read_artifact("ev/missing.txt").is_none());
    }
}
