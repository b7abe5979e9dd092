//! Typed tool parameters.
//!
//! Each struct documents its tool's input schema (via `JsonSchema`) and is
//! filled from the raw arguments with [`mcpd::Arguments::parse`].

use crate::edit::EditOperation;
use schemars::JsonSchema;
use serde::Deserialize;

/// Parameters for reading a single file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    /// Path to the file to read.
    pub path: String,
}

/// Parameters for reading multiple files.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadMultipleFilesParams {
    /// Paths to the files to read.
    pub paths: Vec<String>,
}

/// Parameters for writing a file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    /// Path to the file to write.
    pub path: String,
    /// Content to write to the file.
    pub content: String,
}

/// Parameters for editing a file.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditFileParams {
    /// Path to the file to edit.
    pub path: String,
    /// Edit operations, applied in order.
    pub edits: Vec<EditOperation>,
    /// Preview the diff without writing changes.
    #[serde(default)]
    pub dry_run: bool,
}

/// Parameters for creating a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateDirectoryParams {
    /// Path of the directory to create.
    pub path: String,
}

/// Parameters for listing a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDirectoryParams {
    /// Path to the directory to list.
    pub path: String,
}

/// Parameters for getting a directory tree.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DirectoryTreeParams {
    /// Path to the root directory for the tree.
    pub path: String,
    /// Levels of subdirectories to descend into (default 3).
    pub depth: Option<usize>,
}

/// Parameters for moving a file or directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveFileParams {
    /// Source path.
    pub source: String,
    /// Destination path. Must not exist yet.
    pub destination: String,
}

/// Parameters for searching files.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilesParams {
    /// Base directory to search in.
    pub path: String,
    /// Case-insensitive substring to look for in entry names.
    pub pattern: String,
    /// Glob patterns for entries to skip; matching directories are not
    /// descended into.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Parameters for getting file info.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetFileInfoParams {
    /// Path to the file or directory.
    pub path: String,
}

/// `list_allowed_directories` takes no arguments.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoParams {}
