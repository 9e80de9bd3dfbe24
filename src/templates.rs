//! Template lookup and the JSON renderer.
//!
//! Templates are addressed by relative path (`duty/month_report.html`).
//! The set of available names comes either from a directory tree or from
//! the built-in list below; selection picks the first candidate that
//! exists. Rendering itself is left to whatever consumes the output: the
//! built-in renderer hands back the chosen template names and the context
//! as JSON.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use quick_cache::sync::Cache;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, TemplateError};

const SELECTION_CACHE_CAPACITY: usize = 1024;

static BUILTIN_TEMPLATES: Lazy<Vec<String>> = Lazy::new(|| {
    let generic = [
        "base",
        "landing",
        "index",
        "browse_year",
        "browse_month",
        "browse_week",
        "browse_day",
        "reserve",
        "update",
        "details",
        "remove",
        "forbidden",
    ];
    generic
        .iter()
        .map(|name| format!("lyra/{name}.html"))
        .chain([
            "duty/month_report.html".to_string(),
            "food/reserve_week.html".to_string(),
            "food/week_print.html".to_string(),
        ])
        .collect()
});

/// Available templates plus a memo of past selections.
#[derive(Clone)]
pub struct TemplateSet {
    available: Arc<HashSet<String>>,
    selections: Arc<Cache<Vec<String>, String>>,
}

impl TemplateSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available: Arc::new(names.into_iter().map(Into::into).collect()),
            selections: Arc::new(Cache::new(SELECTION_CACHE_CAPACITY)),
        }
    }

    /// The templates every application kind needs.
    pub fn builtin() -> Self {
        Self::new(BUILTIN_TEMPLATES.iter().cloned())
    }

    /// Every file below `root`, named by its `/`-separated relative path.
    pub fn from_dir(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut names = Vec::new();
        collect_files(root, root, &mut names)?;
        tracing::info!(count = names.len(), root = %root.display(), "loaded templates");
        Ok(Self::new(names))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.available.contains(name)
    }

    /// First existing candidate.
    pub fn select(&self, candidates: &[String]) -> Result<String> {
        if candidates.is_empty() {
            return Err(TemplateError::NothingSelected.into());
        }

        let key = candidates.to_vec();
        if let Some(name) = self.selections.get(&key) {
            return Ok(name);
        }

        let Some(name) = candidates.iter().find(|name| self.contains(name)) else {
            return Err(TemplateError::NotFound(key).into());
        };
        self.selections.insert(key, name.clone());
        Ok(name.clone())
    }
}

fn collect_files(root: &Path, dir: &Path, names: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, names)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            names.push(name);
        }
    }
    Ok(())
}

/// What the renderer produces for a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rendered {
    pub template: String,
    pub base: String,
    pub current_app: String,
    pub context: Value,
}
