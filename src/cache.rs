use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use crate::models::RepoActivity;

/// Flat-file JSON cache for collected snapshots, one file per collection run.
pub struct ActivityCache {
    dir: PathBuf,
}

impl ActivityCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_owned();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data dir {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a snapshot as `{owner_repo}_{timestamp}.json`.
    pub fn save(&self, activity: &RepoActivity) -> Result<PathBuf> {
        let repo = activity.repo_name.replace('/', "_");
        let timestamp = activity.collection_date.format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("{}_{}.json", repo, timestamp));

        std::fs::write(&path, serde_json::to_string_pretty(activity)?)
            .with_context(|| format!("failed to write snapshot {:?}", path))?;
        info!(repo = %activity.repo_name, path = ?path, "saved snapshot");
        Ok(path)
    }

    /// All snapshot files, newest first by modification time.
    pub fn latest_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<(PathBuf, std::time::SystemTime)> = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path().extension().and_then(|x| x.to_str()) == Some("json")
            })
            .filter_map(|e| {
                let mtime = e.metadata().ok()?.modified().ok()?;
                Some((e.into_path(), mtime))
            })
            .collect();

        files.sort_by(|a, b| b.1.cmp(&a.1));
        files.into_iter().map(|(path, _)| path).collect()
    }

    pub fn load(&self, path: &Path) -> Result<RepoActivity> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("snapshot {:?} is not valid JSON", path))
    }

    /// Load the newest snapshot per repository, at most one for each slug.
    pub fn load_latest(&self) -> Result<Vec<RepoActivity>> {
        let mut seen = std::collections::HashSet::new();
        let mut activities = Vec::new();

        for path in self.latest_files() {
            let activity = self.load(&path)?;
            if seen.insert(activity.repo_name.clone()) {
                activities.push(activity);
            }
        }

        Ok(activities)
    }
}
