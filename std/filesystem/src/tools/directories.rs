//! Tools operating on directories and directory trees.

use super::{ToolError, params::*, resolve};
use crate::sandbox::Sandbox;
use futures::{FutureExt, future::BoxFuture};
use glob::Pattern;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Levels `directory_tree` descends when the client gives no depth.
const DEFAULT_TREE_DEPTH: usize = 3;

pub(super) async fn create_directory(
    sandbox: &Sandbox,
    params: CreateDirectoryParams,
) -> Result<String, ToolError> {
    let path = resolve(sandbox, "create_directory", &params.path)?;
    tokio::fs::create_dir_all(&path)
        .await
        .map_err(ToolError::io("create_directory", &path))?;
    Ok(format!("Successfully created directory {}", params.path))
}

pub(super) async fn list_directory(
    sandbox: &Sandbox,
    params: ListDirectoryParams,
) -> Result<String, ToolError> {
    let path = resolve(sandbox, "list_directory", &params.path)?;
    let mut read_dir = tokio::fs::read_dir(&path)
        .await
        .map_err(ToolError::io("list_directory", &path))?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(ToolError::io("list_directory", &path))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|ft| ft.is_dir())
            .unwrap_or(false);
        entries.push((entry.file_name().to_string_lossy().into_owned(), is_dir));
    }
    entries.sort();
    Ok(entries
        .into_iter()
        .map(|(name, is_dir)| {
            let tag = if is_dir { "[DIR]" } else { "[FILE]" };
            format!("{tag} {name}")
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

#[derive(Debug, Serialize)]
struct TreeNode {
    name: String,
    #[serde(rename = "type")]
    node_type: &'static str,
    /// Absent for files and for directories at the depth limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<TreeNode>>,
}

pub(super) async fn directory_tree(
    sandbox: &Sandbox,
    params: DirectoryTreeParams,
) -> Result<String, ToolError> {
    let path = resolve(sandbox, "directory_tree", &params.path)?;
    let depth = params.depth.unwrap_or(DEFAULT_TREE_DEPTH);
    let tree = build_tree(&path, depth)
        .await
        .map_err(ToolError::io("directory_tree", &path))?;
    serde_json::to_string_pretty(&tree).map_err(|source| ToolError::Json {
        tool: "directory_tree",
        source,
    })
}

/// Symlinks are reported as files and never followed.
fn build_tree(path: &Path, depth: usize) -> BoxFuture<'_, std::io::Result<TreeNode>> {
    async move {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let meta = tokio::fs::symlink_metadata(path).await?;
        if !meta.is_dir() {
            return Ok(TreeNode {
                name,
                node_type: "file",
                children: None,
            });
        }
        if depth == 0 {
            return Ok(TreeNode {
                name,
                node_type: "directory",
                children: None,
            });
        }

        let mut children = Vec::new();
        let mut read_dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let child_path = entry.path();
            match build_tree(&child_path, depth - 1).await {
                Ok(child) => children.push(child),
                Err(e) => debug!(path = %child_path.display(), "skipping unreadable entry: {e}"),
            }
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(TreeNode {
            name,
            node_type: "directory",
            children: Some(children),
        })
    }
    .boxed()
}

pub(super) async fn move_file(sandbox: &Sandbox, params: MoveFileParams) -> Result<String, ToolError> {
    let source = resolve(sandbox, "move_file", &params.source)?;
    let destination = resolve(sandbox, "move_file", &params.destination)?;
    let exists = tokio::fs::try_exists(&destination)
        .await
        .map_err(ToolError::io("move_file", &destination))?;
    if exists {
        return Err(ToolError::DestinationExists {
            tool: "move_file",
            path: params.destination,
        });
    }
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(ToolError::io("move_file", parent))?;
    }
    tokio::fs::rename(&source, &destination)
        .await
        .map_err(|e| ToolError::Move {
            tool: "move_file",
            from: source.display().to_string(),
            to: destination.display().to_string(),
            source: e,
        })?;
    Ok(format!(
        "Successfully moved {} to {}",
        params.source, params.destination
    ))
}

pub(super) async fn search_files(
    sandbox: &Sandbox,
    params: SearchFilesParams,
) -> Result<String, ToolError> {
    let root = resolve(sandbox, "search_files", &params.path)?;
    let excludes = params
        .exclude_patterns
        .iter()
        .map(|raw| {
            Pattern::new(raw).map_err(|source| ToolError::Pattern {
                tool: "search_files",
                pattern: raw.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let needle = params.pattern.to_lowercase();

    let hits = tokio::task::spawn_blocking(move || walk_matches(&root, &needle, &excludes))
        .await
        .map_err(|source| ToolError::Task {
            tool: "search_files",
            source,
        })?;

    // The walk does not follow links, but a hit may itself be a link.
    let hits: Vec<String> = hits
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|p| sandbox.resolve(p).is_ok())
        .collect();
    if hits.is_empty() {
        return Ok("No matches found".to_string());
    }
    Ok(hits.join("\n"))
}

/// Entries below `root` whose name contains `needle`, skipping anything an
/// exclude pattern matches by name or by path relative to `root`.
fn walk_matches(root: &Path, needle: &str, excludes: &[Pattern]) -> Vec<PathBuf> {
    let excluded = |path: &Path| {
        let rel = path.strip_prefix(root).unwrap_or(path);
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        excludes
            .iter()
            .any(|p| p.matches(&name) || p.matches_path(rel))
    };
    WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !excluded(entry.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("search walk: {e}");
                None
            }
        })
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .contains(needle)
        })
        .map(|entry| entry.into_path())
        .collect()
}

pub(super) fn list_allowed_directories(sandbox: &Sandbox) -> String {
    let roots: Vec<String> = sandbox
        .roots()
        .iter()
        .map(|root| root.path().display().to_string())
        .collect();
    format!("Allowed directories:\n{}", roots.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;
    use tempfile::TempDir;

    fn sandbox(dir: &TempDir) -> Sandbox {
        let root = dir.path().to_string_lossy().into_owned();
        Sandbox::with_home(&[root], dir.path().to_path_buf(), None).unwrap()
    }

    fn at(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn create_directory_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let sb = sandbox(&dir);
        let path = at(&dir, "x/y/z");
        for _ in 0..2 {
            let msg = create_directory(&sb, CreateDirectoryParams { path: path.clone() })
                .await
                .unwrap();
            assert_eq!(msg, format!("Successfully created directory {path}"));
        }
        assert!(dir.path().join("x/y/z").is_dir());
    }

    #[tokio::test]
    async fn list_directory_tags_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        let out = list_directory(
            &sandbox(&dir),
            ListDirectoryParams {
                path: at(&dir, ""),
            },
        )
        .await
        .unwrap();
        assert_eq!(out, "[FILE] a.txt\n[FILE] b.txt\n[DIR] sub");
    }

    #[tokio::test]
    async fn tree_respects_depth() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b/c")).unwrap();
        fs::write(dir.path().join("a/f.txt"), "").unwrap();
        let sb = sandbox(&dir);

        let out = directory_tree(
            &sb,
            DirectoryTreeParams {
                path: at(&dir, "a"),
                depth: Some(1),
            },
        )
        .await
        .unwrap();
        let tree: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(tree["name"], "a");
        assert_eq!(tree["type"], "directory");
        let children = tree["children"].as_array().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0]["name"], "b");
        assert!(children[0].get("children").is_none());
        assert_eq!(children[1]["type"], "file");

        let full = directory_tree(
            &sb,
            DirectoryTreeParams {
                path: at(&dir, "a"),
                depth: None,
            },
        )
        .await
        .unwrap();
        let tree: Value = serde_json::from_str(&full).unwrap();
        assert_eq!(tree["children"][0]["children"][0]["name"], "c");
    }

    #[tokio::test]
    async fn move_refuses_existing_destination() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("src.txt"), "s").unwrap();
        fs::write(dir.path().join("dst.txt"), "d").unwrap();
        let sb = sandbox(&dir);
        let err = move_file(
            &sb,
            MoveFileParams {
                source: at(&dir, "src.txt"),
                destination: at(&dir, "dst.txt"),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::DestinationExists { .. }));

        move_file(
            &sb,
            MoveFileParams {
                source: at(&dir, "src.txt"),
                destination: at(&dir, "moved/here.txt"),
            },
        )
        .await
        .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("moved/here.txt")).unwrap(), "s");
        assert!(!dir.path().join("src.txt").exists());
    }

    #[tokio::test]
    async fn move_validates_destination() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("src.txt"), "s").unwrap();
        let err = move_file(
            &sandbox(&dir),
            MoveFileParams {
                source: at(&dir, "src.txt"),
                destination: "/tmp/../etc/escaped.txt".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Sandbox { .. }));
        assert!(dir.path().join("src.txt").exists());
    }

    #[tokio::test]
    async fn failed_rename_names_both_paths() {
        let dir = TempDir::new().unwrap();
        let err = move_file(
            &sandbox(&dir),
            MoveFileParams {
                source: at(&dir, "gone.txt"),
                destination: at(&dir, "target.txt"),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Move { .. }));
        let msg = err.to_string();
        assert!(msg.starts_with("move_file "));
        assert!(msg.contains("gone.txt -> "));
        assert!(msg.contains("target.txt: "));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn search_drops_links_leaving_the_root() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("inner")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("evil_link")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("inner"), dir.path().join("evil_inner")).unwrap();

        let out = search_files(
            &sandbox(&dir),
            SearchFilesParams {
                path: at(&dir, ""),
                pattern: "evil".into(),
                exclude_patterns: Vec::new(),
            },
        )
        .await
        .unwrap();
        assert!(!out.contains("evil_link"));
        assert!(out.ends_with("evil_inner"));
        assert_eq!(out.lines().count(), 1);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_and_prunes_excludes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("src/Main.rs"), "").unwrap();
        fs::write(dir.path().join("target/debug/main.d"), "").unwrap();
        let sb = sandbox(&dir);

        let out = search_files(
            &sb,
            SearchFilesParams {
                path: at(&dir, ""),
                pattern: "MAIN".into(),
                exclude_patterns: vec!["target".into()],
            },
        )
        .await
        .unwrap();
        let expected = fs::canonicalize(dir.path()).unwrap().join("src/Main.rs");
        assert_eq!(out, expected.to_string_lossy());

        let none = search_files(
            &sb,
            SearchFilesParams {
                path: at(&dir, ""),
                pattern: "absent".into(),
                exclude_patterns: Vec::new(),
            },
        )
        .await
        .unwrap();
        assert_eq!(none, "No matches found");
    }

    #[tokio::test]
    async fn search_rejects_bad_exclude_pattern() {
        let dir = TempDir::new().unwrap();
        let err = search_files(
            &sandbox(&dir),
            SearchFilesParams {
                path: at(&dir, ""),
                pattern: "x".into(),
                exclude_patterns: vec!["[".into()],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolError::Pattern { .. }));
    }

    #[test]
    fn allowed_directories_listing() {
        let dir = TempDir::new().unwrap();
        let out = list_allowed_directories(&sandbox(&dir));
        let (head, rest) = out.split_once('\n').unwrap();
        assert_eq!(head, "Allowed directories:");
        assert_eq!(rest, dir.path().to_string_lossy());
    }
}
