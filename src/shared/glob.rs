//! Glob pattern utilities
//!
//! Step `glob`/`exclude` lists are compiled once into a [`FileMatcher`].
//! Patterns without a `/` match the file name anywhere in the tree
//! (`*.rs` matches `src/main.rs`); patterns with a `/` match the path
//! relative to the repository root.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileMatcher {
    include: Option<PatternSet>,
    exclude: Option<PatternSet>,
}

#[derive(Debug, Clone)]
struct PatternSet {
    by_name: GlobSet,
    by_path: GlobSet,
}

impl PatternSet {
    fn build(patterns: &[String]) -> Result<Option<Self>, globset::Error> {
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut by_name = GlobSetBuilder::new();
        let mut by_path = GlobSetBuilder::new();
        for pattern in patterns {
            let trimmed = pattern.trim_start_matches("./");
            let glob = GlobBuilder::new(trimmed).literal_separator(true).build()?;
            if trimmed.contains('/') {
                by_path.add(glob);
            } else {
                by_name.add(glob);
            }
        }

        Ok(Some(Self {
            by_name: by_name.build()?,
            by_path: by_path.build()?,
        }))
    }

    fn is_match(&self, path: &Path) -> bool {
        let name_match = path
            .file_name()
            .map(|name| self.by_name.is_match(name))
            .unwrap_or(false);
        name_match || self.by_path.is_match(path)
    }
}

impl FileMatcher {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, globset::Error> {
        Ok(Self {
            include: PatternSet::build(include)?,
            exclude: PatternSet::build(exclude)?,
        })
    }

    /// Whether an include list was configured at all
    pub fn has_include(&self) -> bool {
        self.include.is_some()
    }

    pub fn is_match(&self, path: &Path) -> bool {
        let included = self.include.as_ref().map(|set| set.is_match(path)).unwrap_or(true);
        let excluded = self.exclude.as_ref().map(|set| set.is_match(path)).unwrap_or(false);
        included && !excluded
    }

    /// Keep the files this matcher accepts, preserving order
    pub fn filter(&self, files: &[PathBuf]) -> Vec<PathBuf> {
        files.iter().filter(|f| self.is_match(f)).cloned().collect()
    }
}
