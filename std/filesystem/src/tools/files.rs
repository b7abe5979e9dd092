//! Tools operating on single files.

use super::{ToolError, params::*, resolve};
use crate::{
    edit::{apply_edits, normalize_line_endings, unified_diff},
    sandbox::Sandbox,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fs::Metadata, io, time::SystemTime};

pub(super) async fn read_file(sandbox: &Sandbox, params: ReadFileParams) -> Result<String, ToolError> {
    let path = resolve(sandbox, "read_file", &params.path)?;
    tokio::fs::read_to_string(&path)
        .await
        .map_err(ToolError::io("read_file", &path))
}

/// Each path is reported on its own; one failure does not fail the batch.
pub(super) async fn read_multiple_files(
    sandbox: &Sandbox,
    params: ReadMultipleFilesParams,
) -> Result<String, ToolError> {
    let mut blocks = Vec::with_capacity(params.paths.len());
    for raw in &params.paths {
        let block = match read_file(sandbox, ReadFileParams { path: raw.clone() }).await {
            Ok(content) => format!("{raw}:\n{content}\n"),
            Err(e) => format!("{raw}: Error - {e}"),
        };
        blocks.push(block);
    }
    Ok(blocks.join("\n---\n"))
}

pub(super) async fn write_file(sandbox: &Sandbox, params: WriteFileParams) -> Result<String, ToolError> {
    let path = resolve(sandbox, "write_file", &params.path)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(ToolError::io("write_file", parent))?;
    }
    tokio::fs::write(&path, &params.content)
        .await
        .map_err(ToolError::io("write_file", &path))?;
    Ok(format!("Successfully wrote to {}", params.path))
}

/// Returns the diff in both modes; only writes when not a dry run.
pub(super) async fn edit_file(sandbox: &Sandbox, params: EditFileParams) -> Result<String, ToolError> {
    let path = resolve(sandbox, "edit_file", &params.path)?;
    let original = tokio::fs::read_to_string(&path)
        .await
        .map_err(ToolError::io("edit_file", &path))?;
    let modified = apply_edits(&original, &params.edits).map_err(|source| ToolError::Edit {
        tool: "edit_file",
        path: params.path.clone(),
        source,
    })?;
    let diff = unified_diff(&normalize_line_endings(&original), &modified, &params.path);
    if !params.dry_run {
        tokio::fs::write(&path, &modified)
            .await
            .map_err(ToolError::io("edit_file", &path))?;
    }
    Ok(diff)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileInfo {
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accessed: Option<String>,
    is_directory: bool,
    is_file: bool,
    is_symlink: bool,
    permissions: String,
}

impl FileInfo {
    fn from_metadata(meta: &Metadata) -> Self {
        Self {
            size: meta.len(),
            created: timestamp(meta.created()),
            modified: timestamp(meta.modified()),
            accessed: timestamp(meta.accessed()),
            is_directory: meta.is_dir(),
            is_file: meta.is_file(),
            is_symlink: meta.file_type().is_symlink(),
            permissions: permissions(meta),
        }
    }
}

/// RFC 3339 rendering; platforms without the timestamp yield `None`.
fn timestamp(time: io::Result<SystemTime>) -> Option<String> {
    time.ok().map(|t| DateTime::<Utc>::from(t).to_rfc3339())
}

#[cfg(unix)]
fn permissions(meta: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permissions(meta: &Metadata) -> String {
    let mode = if meta.permissions().readonly() { "readonly" } else { "readwrite" };
    mode.to_string()
}

pub(super) async fn get_file_info(
    sandbox: &Sandbox,
    params: GetFileInfoParams,
) -> Result<String, ToolError> {
    let path = resolve(sandbox, "get_file_info", &params.path)?;
    let meta = tokio::fs::symlink_metadata(&path)
        .await
        .map_err(ToolError::io("get_file_info", &path))?;
    serde_json::to_string_pretty(&FileInfo::from_metadata(&meta)).map_err(|source| ToolError::Json {
        tool: "get_file_info",
        source,
    })
}
