use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tend_core::Task;

pub fn tend_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TEND_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".tend"))
}

pub fn ensure_tend_home() -> Result<PathBuf> {
    let dir = tend_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Task collection persisted as one pretty-printed JSON array.
#[derive(Debug, Clone)]
pub struct TaskStore {
    path: PathBuf,
}

impl TaskStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<Task>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("read {}", self.path.display()))?;
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&s).with_context(|| format!("parse {}", self.path.display()))
    }

    /// Write to a sibling temp file, then rename over the store.
    pub fn save(&self, tasks: &[Task]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(tasks)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}
