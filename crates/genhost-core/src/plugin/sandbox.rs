//! Module sandbox: the allow-list of roots dynamic loading may resolve into.
//!
//! A single [`SandboxContext`] lives for the whole process. The scanner is its
//! only writer (through `&mut`), every later load attempt reads it through a
//! [`ModuleResolver`]. Roots are only ever added.

use std::path::{Component, Path, PathBuf};

use crate::error::SandboxError;

/// Allowed filesystem roots for dynamic module resolution.
#[derive(Debug, Clone, Default)]
pub struct SandboxContext {
    roots: Vec<PathBuf>,
}

impl SandboxContext {
    /// Create a context seeded with the bootstrap's own install root.
    pub fn new(install_root: impl AsRef<Path>) -> Self {
        let mut ctx = Self::default();
        ctx.add_allowed_root(install_root);
        ctx
    }

    /// Create a context seeded with the directory holding the running binary.
    pub fn for_current_exe() -> std::io::Result<Self> {
        let exe = std::env::current_exe()?;
        let root = exe.parent().unwrap_or(Path::new("/"));
        Ok(Self::new(root))
    }

    /// Allow modules under `path`. Adding the same root twice is a no-op.
    pub fn add_allowed_root(&mut self, path: impl AsRef<Path>) {
        let root = normalize(path.as_ref());
        if !self.roots.contains(&root) {
            tracing::debug!(root = %root.display(), "Sandbox root added");
            self.roots.push(root);
        }
    }

    /// Registered roots, in registration order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Whether `path` lies under one of the allowed roots.
    pub fn is_allowed(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.roots.iter().any(|root| path.starts_with(root))
    }

    /// Keep only the candidates under an allowed root, preserving order.
    pub fn filter_search_paths<I, P>(&self, candidates: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        candidates
            .into_iter()
            .filter(|p| self.is_allowed(p.as_ref()))
            .map(|p| p.as_ref().to_path_buf())
            .collect()
    }
}

/// Resolves a requested module path against a sandbox.
///
/// Every dynamic load goes through a resolver; there is no other route to a
/// library on disk.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, requested: &Path, ctx: &SandboxContext) -> Result<PathBuf, SandboxError>;
}

/// Default resolver: anchors relative paths at a base directory, then checks
/// the lexically normalized result against the sandbox.
#[derive(Debug, Clone)]
pub struct SandboxResolver {
    base: PathBuf,
}

impl SandboxResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl ModuleResolver for SandboxResolver {
    fn resolve(&self, requested: &Path, ctx: &SandboxContext) -> Result<PathBuf, SandboxError> {
        let absolute = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.base.join(requested)
        };
        let resolved = normalize(&absolute);

        ctx.filter_search_paths([&resolved])
            .into_iter()
            .next()
            .ok_or(SandboxError::Denied(resolved))
    }
}

/// Lexically normalize a path: drop `.` and fold `..` into its parent.
///
/// Does not touch the filesystem, so it works for paths that do not exist yet.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` never climbs above the root
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
