//! Arena of module scopes, one per directory.

use crate::value::ConfigValue;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;

/// Stable index of a scope in its [`ScopeTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SourceFile {
    pub path: Utf8PathBuf,
    pub body: ConfigValue,
}

#[derive(Clone, Debug)]
pub struct ScopeNode {
    pub id: ScopeId,
    /// Last path segment of the directory.
    pub name: String,
    pub dir: Utf8PathBuf,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub files: Vec<SourceFile>,
}

impl ScopeNode {
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("directory {0} is not absolute")]
    NotAbsolute(Utf8PathBuf),
    #[error("cannot ascend above {0}")]
    NoParent(Utf8PathBuf),
}

/// Directory scopes addressed by [`ScopeId`]; ids follow creation (discovery) order.
#[derive(Clone, Debug)]
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
    root: ScopeId,
    by_dir: HashMap<Utf8PathBuf, ScopeId>,
}

impl ScopeTree {
    pub fn new(root_dir: impl Into<Utf8PathBuf>) -> Result<Self, ScopeError> {
        let dir = normalize(&root_dir.into());
        if !dir.is_absolute() {
            return Err(ScopeError::NotAbsolute(dir));
        }
        let mut tree = Self {
            nodes: Vec::new(),
            root: ScopeId(0),
            by_dir: HashMap::new(),
        };
        tree.root = tree.push_node(dir, None);
        Ok(tree)
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn get(&self, id: ScopeId) -> &ScopeNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All scopes in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ScopeNode> {
        self.nodes.iter()
    }

    pub fn by_dir(&self, dir: &Utf8Path) -> Option<ScopeId> {
        self.by_dir.get(&normalize(dir)).copied()
    }

    pub fn add_file(&mut self, id: ScopeId, file: SourceFile) {
        self.nodes[id.0].files.push(file);
    }

    /// Find or create the scope for `dir`, creating intermediate scopes on the way.
    ///
    /// A directory outside the current root grows the tree upwards: the root's parent
    /// directory becomes the new root until `dir` is covered.
    pub fn ensure_dir(&mut self, dir: &Utf8Path) -> Result<ScopeId, ScopeError> {
        let dir = normalize(dir);
        if !dir.is_absolute() {
            return Err(ScopeError::NotAbsolute(dir));
        }
        while !dir.starts_with(&self.get(self.root).dir) {
            self.grow_root()?;
        }
        self.ensure_within_root(&dir)
    }

    fn ensure_within_root(&mut self, dir: &Utf8Path) -> Result<ScopeId, ScopeError> {
        if let Some(id) = self.by_dir.get(dir) {
            return Ok(*id);
        }
        let parent_dir = dir
            .parent()
            .ok_or_else(|| ScopeError::NoParent(dir.to_path_buf()))?;
        let parent = self.ensure_within_root(parent_dir)?;
        Ok(self.push_node(dir.to_path_buf(), Some(parent)))
    }

    fn grow_root(&mut self) -> Result<(), ScopeError> {
        let old_root = self.root;
        let root_dir = self.get(old_root).dir.clone();
        let parent_dir = root_dir
            .parent()
            .ok_or_else(|| ScopeError::NoParent(root_dir.clone()))?
            .to_path_buf();
        let new_root = self.push_node(parent_dir, None);
        self.nodes[old_root.0].parent = Some(new_root);
        self.nodes[new_root.0].children.push(old_root);
        self.root = new_root;
        Ok(())
    }

    fn push_node(&mut self, dir: Utf8PathBuf, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.nodes.len());
        let name = dir
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| dir.to_string());
        self.nodes.push(ScopeNode {
            id,
            name,
            dir: dir.clone(),
            parent,
            children: Vec::new(),
            files: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        self.by_dir.insert(dir, id);
        id
    }

    pub fn child(&self, id: ScopeId, name: &str) -> Option<ScopeId> {
        self.get(id)
            .children
            .iter()
            .copied()
            .find(|c| self.get(*c).name == name)
    }

    /// Follow a relative module source (`../modules/vpc`) through the arena.
    pub fn resolve_source(&self, from: ScopeId, source: &str) -> Option<ScopeId> {
        let mut current = from;
        for segment in source.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => current = self.get(current).parent?,
                name => current = self.child(current, name)?,
            }
        }
        Some(current)
    }

    /// Depth-first (pre-order) search by directory name; first match wins.
    pub fn find_by_name(&self, name: &str) -> Option<ScopeId> {
        self.pre_order().into_iter().find(|id| self.get(*id).name == name)
    }

    /// Every scope whose directory name is `name`, in depth-first order.
    pub fn all_named(&self, name: &str) -> Vec<ScopeId> {
        self.pre_order()
            .into_iter()
            .filter(|id| self.get(*id).name == name)
            .collect()
    }

    pub fn pre_order(&self) -> Vec<ScopeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.get(id).children.iter().rev().copied());
        }
        out
    }

    /// Children before parents, siblings in discovery order.
    pub fn post_order(&self) -> Vec<ScopeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.post_order_from(self.root, &mut out);
        out
    }

    fn post_order_from(&self, id: ScopeId, out: &mut Vec<ScopeId>) {
        for child in &self.get(id).children {
            self.post_order_from(*child, out);
        }
        out.push(id);
    }
}

/// Lexically normalize `.` and `..` segments without touching the filesystem.
/// Whether a module `source` names a directory relative to the calling module.
pub fn is_local_source(source: &str) -> bool {
    source == "." || source == ".." || source.starts_with("./") || source.starts_with("../")
}

pub fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    use camino::Utf8Component;

    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_str()),
        }
    }
    out
}
