use crate::decode::config_decoder;
use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use tfguard_domain::ConfigValue;
use tfguard_domain::scope::{ScopeError, ScopeId, ScopeTree, SourceFile, is_local_source, normalize};
use tfguard_types::{Diagnostic, UNKNOWN_LOCATION};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into.
pub const SKIP_DIRS: &[&str] = &[".git", ".terraform", ".terragrunt-cache"];

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    /// Globs matched against paths relative to the scan root.
    pub exclude: Vec<String>,
}

/// A scope tree plus the file-level errors met while building it.
#[derive(Debug)]
pub struct LoadedTree {
    pub tree: ScopeTree,
    pub errors: Vec<Diagnostic>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("root directory {path} cannot be read")]
    Root {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a directory")]
    NotADirectory(Utf8PathBuf),
    #[error("{0} is not valid UTF-8")]
    NonUtf8(PathBuf),
    #[error("invalid exclude pattern `{pattern}`")]
    Exclude {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Build the scope tree for `root`.
///
/// Every directory below `root` becomes a scope. Local module sources are followed
/// even when they leave `root`; the tree then grows upwards to cover them.
pub fn load_tree(root: &Utf8Path, options: &LoadOptions) -> Result<LoadedTree, LoadError> {
    let canonical = std::fs::canonicalize(root).map_err(|source| LoadError::Root {
        path: root.to_path_buf(),
        source,
    })?;
    let root = Utf8PathBuf::from_path_buf(canonical).map_err(LoadError::NonUtf8)?;
    if !root.is_dir() {
        return Err(LoadError::NotADirectory(root));
    }

    let mut loader = Loader {
        tree: ScopeTree::new(root.clone())?,
        errors: Vec::new(),
        excludes: build_globset(&options.exclude)?,
        walk_root: root.clone(),
        walked: HashSet::new(),
    };

    let mut pending = VecDeque::from([root]);
    while let Some(dir) = pending.pop_front() {
        if loader.walked.contains(&dir) {
            continue;
        }
        loader.walk(&dir, &mut pending)?;
    }

    Ok(LoadedTree {
        tree: loader.tree,
        errors: loader.errors,
    })
}

struct Loader {
    tree: ScopeTree,
    errors: Vec<Diagnostic>,
    excludes: GlobSet,
    walk_root: Utf8PathBuf,
    walked: HashSet<Utf8PathBuf>,
}

impl Loader {
    fn walk(
        &mut self,
        dir: &Utf8Path,
        pending: &mut VecDeque<Utf8PathBuf>,
    ) -> Result<(), LoadError> {
        let entries: Vec<Utf8PathBuf> = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || self.keep(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir() || e.file_type().is_file())
            .filter_map(|e| Utf8PathBuf::from_path_buf(e.into_path()).ok())
            .collect();

        let mut files: Vec<(ScopeId, Utf8PathBuf)> = Vec::new();
        for path in entries {
            if path.is_dir() {
                self.tree.ensure_dir(&path)?;
                self.walked.insert(normalize(&path));
            } else if config_decoder(&path).is_some() {
                let parent = path.parent().unwrap_or(dir);
                let scope = self.tree.ensure_dir(parent)?;
                files.push((scope, path));
            }
        }

        let decoded: Vec<(ScopeId, Utf8PathBuf, Result<Option<Value>, String>)> = files
            .into_par_iter()
            .map(|(scope, path)| {
                let result = read_and_decode(&path);
                (scope, path, result)
            })
            .collect();

        for (scope, path, result) in decoded {
            match result {
                Ok(Some(json)) => {
                    self.follow_modules(scope, &path, &json, pending)?;
                    self.tree.add_file(
                        scope,
                        SourceFile {
                            path,
                            body: ConfigValue::from_json(json),
                        },
                    );
                }
                Ok(None) => debug!(file = %path, "skipping empty file"),
                Err(message) => {
                    warn!(file = %path, "{message}");
                    self.errors
                        .push(Diagnostic::error(message, UNKNOWN_LOCATION, path.as_str()));
                }
            }
        }
        Ok(())
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref()) {
            return false;
        }
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            return false;
        };
        if self.walked.contains(path) {
            return false;
        }
        let rel = path.strip_prefix(&self.walk_root).unwrap_or(path);
        !self.excludes.is_match(rel.as_str())
    }

    /// Queue the directories named by local `module { source = ... }` blocks.
    fn follow_modules(
        &mut self,
        scope: ScopeId,
        file: &Utf8Path,
        json: &Value,
        pending: &mut VecDeque<Utf8PathBuf>,
    ) -> Result<(), LoadError> {
        for source in module_sources(json) {
            if !is_local_source(source) {
                debug!(file = %file, source, "skipping remote module source");
                continue;
            }
            let dir = self.tree.get(scope).dir.clone();
            let target = normalize(&dir.join(source));
            if !target.is_dir() {
                self.errors.push(Diagnostic::error(
                    format!("Module source not found: {source}"),
                    self.tree.get(scope).name.as_str(),
                    file.as_str(),
                ));
                continue;
            }
            self.tree.ensure_dir(&target)?;
            if !self.walked.contains(&target) {
                pending.push_back(target);
            }
        }
        Ok(())
    }
}

fn read_and_decode(path: &Utf8Path) -> Result<Option<Value>, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("Failed to read file: {e}"))?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    let Some(decoder) = config_decoder(path) else {
        return Ok(None);
    };
    decoder
        .decode(&text)
        .map(Some)
        .map_err(|e| format!("Failed to parse file: {e}"))
}

/// `source` attributes of the module blocks in one decoded file.
///
/// HCL yields `{"module": {"name": {...}}}`; JSON syntax may also use a list of such objects.
pub fn module_sources(json: &Value) -> Vec<&str> {
    let mut out = Vec::new();
    let blocks: Vec<&Value> = match json.get("module") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
        None => Vec::new(),
    };
    for block in blocks {
        let Some(calls) = block.as_object() else {
            continue;
        };
        for call in calls.values() {
            let bodies: Vec<&Value> = match call {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            out.extend(
                bodies
                    .into_iter()
                    .filter_map(|b| b.get("source").and_then(Value::as_str)),
            );
        }
    }
    out
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, LoadError> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        let glob = Glob::new(p).map_err(|source| LoadError::Exclude {
            pattern: p.clone(),
            source,
        })?;
        b.add(glob);
    }
    b.build().map_err(|source| LoadError::Exclude {
        pattern: patterns.join(","),
        source,
    })
}
