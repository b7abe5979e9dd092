//! Path confinement.
//!
//! Every client-supplied path goes through [`Sandbox::resolve`] before any
//! I/O. A path is accepted only if it lies inside an allowed root both
//! lexically and after symlink resolution. For a path that does not exist
//! yet, its nearest existing ancestor must resolve inside a root instead.

use std::{
    io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

/// Reasons a requested path is refused.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Empty path or a path containing a NUL byte.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
    /// The cleaned path is outside every allowed root.
    #[error("access denied - path {path} is not within allowed directories")]
    PathNotAllowed { path: String },
    /// The path, or its nearest existing ancestor, is a symlink resolving
    /// outside every allowed root.
    #[error("access denied - symlink target {target} of {path} is not within allowed directories")]
    SymlinkEscape { path: String, target: PathBuf },
    /// No existing directory ancestor could be resolved.
    #[error("parent directory of {path} does not exist or is not a directory: {source}")]
    ParentMissing {
        path: String,
        #[source]
        source: io::Error,
    },
    /// Symlink resolution failed for another reason.
    #[error("cannot resolve {path}: {source}")]
    Resolution {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Reasons an operator-declared root is unusable at startup.
#[derive(Error, Debug)]
pub enum RootError {
    #[error("allowed directory {0} does not exist")]
    Missing(PathBuf),
    #[error("allowed directory {0} is not a directory")]
    NotDirectory(PathBuf),
    #[error("cannot access allowed directory {path}: {source}")]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An operator-declared directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoot {
    /// Home-expanded, absolute, lexically cleaned form.
    path: PathBuf,
    /// Symlink-resolved form of `path`.
    resolved: PathBuf,
}

impl AllowedRoot {
    /// Validate a root given on the command line.
    pub fn new(raw: &str, base_dir: &Path, home: Option<&Path>) -> Result<Self, RootError> {
        let path = clean(&absolutize(&expand_home(raw, home), base_dir));
        let meta = std::fs::metadata(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => RootError::Missing(path.clone()),
            _ => RootError::Inaccessible {
                path: path.clone(),
                source,
            },
        })?;
        if !meta.is_dir() {
            return Err(RootError::NotDirectory(path));
        }
        let resolved = std::fs::canonicalize(&path).map_err(|source| RootError::Inaccessible {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, resolved })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resolved(&self) -> &Path {
        &self.resolved
    }
}

/// The fixed set of allowed roots plus the context needed to interpret
/// relative and `~` paths.
#[derive(Debug, Clone)]
pub struct Sandbox {
    roots: Vec<AllowedRoot>,
    base_dir: PathBuf,
    home: Option<PathBuf>,
}

impl Sandbox {
    /// Build a sandbox from raw root strings. `base_dir` is the process's
    /// starting directory; relative paths are always resolved against it.
    pub fn new<S: AsRef<str>>(roots: &[S], base_dir: PathBuf) -> Result<Self, RootError> {
        Self::with_home(roots, base_dir, dirs::home_dir())
    }

    pub fn with_home<S: AsRef<str>>(
        roots: &[S],
        base_dir: PathBuf,
        home: Option<PathBuf>,
    ) -> Result<Self, RootError> {
        let roots = roots
            .iter()
            .map(|raw| AllowedRoot::new(raw.as_ref(), &base_dir, home.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            roots,
            base_dir,
            home,
        })
    }

    pub fn roots(&self) -> &[AllowedRoot] {
        &self.roots
    }

    /// Map a requested path to the path handlers must use, or refuse it.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, SandboxError> {
        if requested.is_empty() {
            return Err(SandboxError::InvalidPath {
                path: requested.to_string(),
                reason: "path is empty",
            });
        }
        if requested.contains('\0') {
            return Err(SandboxError::InvalidPath {
                path: requested.escape_default().to_string(),
                reason: "path contains a NUL byte",
            });
        }

        let candidate = clean(&absolutize(
            &expand_home(requested, self.home.as_deref()),
            &self.base_dir,
        ));
        if !self.lexically_allowed(&candidate) {
            return Err(SandboxError::PathNotAllowed {
                path: requested.to_string(),
            });
        }

        match std::fs::canonicalize(&candidate) {
            Ok(real) if self.resolved_allowed(&real) => Ok(real),
            Ok(real) => Err(SandboxError::SymlinkEscape {
                path: requested.to_string(),
                target: real,
            }),
            Err(e) if is_missing(&e) => self.resolve_missing(requested, candidate),
            Err(source) => Err(SandboxError::Resolution {
                path: requested.to_string(),
                source,
            }),
        }
    }

    /// Resolution for a path that does not exist yet: the nearest existing
    /// ancestor must resolve inside a root. The cleaned path is returned.
    fn resolve_missing(&self, requested: &str, candidate: PathBuf) -> Result<PathBuf, SandboxError> {
        let mut current = Some(candidate.as_path());
        while let Some(path) = current {
            if path != candidate {
                match std::fs::canonicalize(path) {
                    Ok(real) if !self.resolved_allowed(&real) => {
                        return Err(SandboxError::SymlinkEscape {
                            path: requested.to_string(),
                            target: real,
                        });
                    }
                    Ok(real) if !real.is_dir() => {
                        return Err(SandboxError::ParentMissing {
                            path: requested.to_string(),
                            source: io::Error::new(
                                io::ErrorKind::NotADirectory,
                                format!("{} is not a directory", real.display()),
                            ),
                        });
                    }
                    Ok(real) => {
                        debug!(path = %candidate.display(), ancestor = %real.display(), "new path");
                        return Ok(candidate);
                    }
                    Err(e) if is_missing(&e) => {}
                    Err(source) => {
                        return Err(SandboxError::ParentMissing {
                            path: requested.to_string(),
                            source,
                        });
                    }
                }
            }
            // An entry that exists but does not resolve is a dangling
            // symlink; its target cannot be checked.
            if let Ok(meta) = std::fs::symlink_metadata(path) {
                if meta.file_type().is_symlink() {
                    return Err(SandboxError::SymlinkEscape {
                        path: requested.to_string(),
                        target: std::fs::read_link(path).unwrap_or_default(),
                    });
                }
            }
            current = path.parent();
        }
        Err(SandboxError::ParentMissing {
            path: requested.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no existing ancestor"),
        })
    }

    fn lexically_allowed(&self, candidate: &Path) -> bool {
        self.roots
            .iter()
            .any(|root| within(candidate, &root.path) || within(candidate, &root.resolved))
    }

    fn resolved_allowed(&self, real: &Path) -> bool {
        self.roots.iter().any(|root| within(real, &root.resolved))
    }

    /// Whether an already-resolved path lies inside a root. Used to vet
    /// entries discovered while walking a tree.
    pub fn contains(&self, real: &Path) -> bool {
        self.resolved_allowed(real)
    }
}

/// The path, or one of its ancestors, does not exist as a directory.
fn is_missing(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory
    )
}

/// Component-wise containment: `/a/bc` is not inside `/a/b`.
fn within(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Expand a leading `~` or `~/`. Other tilde forms are left alone, as is
/// everything when the home directory is unknown.
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (home, path) {
        (Some(home), "~") => home.to_path_buf(),
        (Some(home), p) if p.starts_with("~/") => home.join(&p[2..]),
        _ => PathBuf::from(path),
    }
}

fn absolutize(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Lexically collapse `.`, `..` and repeated separators without touching
/// the filesystem. `..` at the root stays at the root.
pub fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(name) => out.push(name),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
