//! Filesystem tools.
//!
//! Every handler follows the same shape: extract typed arguments, pass each
//! client path through the [`Sandbox`], perform one filesystem operation,
//! and render text. Any failure becomes a [`ToolError`] whose message is
//! returned to the client as an `isError` result.

use crate::{
    edit::EditError,
    sandbox::{Sandbox, SandboxError},
};
use futures::{FutureExt, future::BoxFuture};
use mcpd::{ArgumentError, Arguments, Registry, RegistryError, Tool, ToolDescriptor, ToolResult};
use params::*;
use schemars::{JsonSchema, r#gen::SchemaSettings};
use serde_json::{Value, json};
use std::{io, path::Path, path::PathBuf, sync::Arc};
use thiserror::Error;

mod directories;
mod files;
pub mod params;

/// Failures of a single tool invocation.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),
    #[error("{tool}: {source}")]
    Sandbox {
        tool: &'static str,
        #[source]
        source: SandboxError,
    },
    #[error("{tool} {path}: {source}")]
    Io {
        tool: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{tool} {path}: {source}")]
    Edit {
        tool: &'static str,
        path: String,
        #[source]
        source: EditError,
    },
    #[error("{tool} {from} -> {to}: {source}")]
    Move {
        tool: &'static str,
        from: String,
        to: String,
        #[source]
        source: io::Error,
    },
    #[error("{tool}: destination {path} already exists")]
    DestinationExists { tool: &'static str, path: String },
    #[error("{tool}: invalid exclude pattern {pattern:?}: {source}")]
    Pattern {
        tool: &'static str,
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("{tool}: {source}")]
    Json {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{tool}: background task failed: {source}")]
    Task {
        tool: &'static str,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl ToolError {
    /// Adapter for `map_err` on I/O results touching `path`.
    pub(crate) fn io(tool: &'static str, path: &Path) -> impl FnOnce(io::Error) -> Self {
        let path = path.display().to_string();
        move |source| Self::Io { tool, path, source }
    }
}

/// Pass a client path through the sandbox on behalf of `tool`.
pub(crate) fn resolve(sandbox: &Sandbox, tool: &'static str, raw: &str) -> Result<PathBuf, ToolError> {
    sandbox
        .resolve(raw)
        .map_err(|source| ToolError::Sandbox { tool, source })
}

/// The tool catalogue, in the order clients see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsTool {
    ReadFile,
    ReadMultipleFiles,
    WriteFile,
    EditFile,
    CreateDirectory,
    ListDirectory,
    DirectoryTree,
    MoveFile,
    SearchFiles,
    GetFileInfo,
    ListAllowedDirectories,
}

impl FsTool {
    pub const ALL: [FsTool; 11] = [
        FsTool::ReadFile,
        FsTool::ReadMultipleFiles,
        FsTool::WriteFile,
        FsTool::EditFile,
        FsTool::CreateDirectory,
        FsTool::ListDirectory,
        FsTool::DirectoryTree,
        FsTool::MoveFile,
        FsTool::SearchFiles,
        FsTool::GetFileInfo,
        FsTool::ListAllowedDirectories,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FsTool::ReadFile => "read_file",
            FsTool::ReadMultipleFiles => "read_multiple_files",
            FsTool::WriteFile => "write_file",
            FsTool::EditFile => "edit_file",
            FsTool::CreateDirectory => "create_directory",
            FsTool::ListDirectory => "list_directory",
            FsTool::DirectoryTree => "directory_tree",
            FsTool::MoveFile => "move_file",
            FsTool::SearchFiles => "search_files",
            FsTool::GetFileInfo => "get_file_info",
            FsTool::ListAllowedDirectories => "list_allowed_directories",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FsTool::ReadFile => {
                "Read the complete contents of a file from the filesystem. \
                 Only works within allowed directories."
            }
            FsTool::ReadMultipleFiles => {
                "Read the contents of multiple files at once. A file that cannot be \
                 read is reported inline and does not stop the others."
            }
            FsTool::WriteFile => {
                "Create a new file or overwrite an existing file with the given content, \
                 creating missing parent directories."
            }
            FsTool::EditFile => {
                "Make line-based edits to a text file. Each edit replaces the first match \
                 of oldText with newText. Returns a unified diff; set dryRun to preview \
                 without writing."
            }
            FsTool::CreateDirectory => {
                "Create a directory, including missing parents. Succeeds silently if the \
                 directory already exists."
            }
            FsTool::ListDirectory => {
                "List the entries of a directory, marking each as [DIR] or [FILE]."
            }
            FsTool::DirectoryTree => {
                "Get a recursive tree of files and directories as JSON. Each node has a \
                 name, a type (file or directory) and, for directories, children."
            }
            FsTool::MoveFile => {
                "Move or rename a file or directory. Fails if the destination exists."
            }
            FsTool::SearchFiles => {
                "Recursively search for files and directories whose name contains the \
                 pattern (case-insensitive). Returns full paths of all matches."
            }
            FsTool::GetFileInfo => {
                "Get metadata about a file or directory: size, timestamps, type and \
                 permissions."
            }
            FsTool::ListAllowedDirectories => {
                "List the directories this server is allowed to access."
            }
        }
    }

    pub fn input_schema(self) -> Value {
        match self {
            FsTool::ReadFile => schema::<ReadFileParams>(),
            FsTool::ReadMultipleFiles => schema::<ReadMultipleFilesParams>(),
            FsTool::WriteFile => schema::<WriteFileParams>(),
            FsTool::EditFile => schema::<EditFileParams>(),
            FsTool::CreateDirectory => schema::<CreateDirectoryParams>(),
            FsTool::ListDirectory => schema::<ListDirectoryParams>(),
            FsTool::DirectoryTree => schema::<DirectoryTreeParams>(),
            FsTool::MoveFile => schema::<MoveFileParams>(),
            FsTool::SearchFiles => schema::<SearchFilesParams>(),
            FsTool::GetFileInfo => schema::<GetFileInfoParams>(),
            FsTool::ListAllowedDirectories => schema::<NoParams>(),
        }
    }

    pub fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Inline JSON schema for a parameter struct, without meta-schema or title.
fn schema<T: JsonSchema>() -> Value {
    let root = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator()
        .into_root_schema_for::<T>();
    let mut value = serde_json::to_value(root).unwrap_or_else(|_| json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("title");
        obj.entry("properties").or_insert_with(|| json!({}));
    }
    value
}

/// A catalogue entry bound to the sandbox it operates in.
pub struct FsToolHandler {
    kind: FsTool,
    sandbox: Arc<Sandbox>,
}

impl FsToolHandler {
    pub fn new(kind: FsTool, sandbox: Arc<Sandbox>) -> Self {
        Self { kind, sandbox }
    }

    async fn run(&self, args: &Arguments) -> Result<String, ToolError> {
        let sandbox = &self.sandbox;
        match self.kind {
            FsTool::ReadFile => files::read_file(sandbox, args.parse()?).await,
            FsTool::ReadMultipleFiles => files::read_multiple_files(sandbox, args.parse()?).await,
            FsTool::WriteFile => files::write_file(sandbox, args.parse()?).await,
            FsTool::EditFile => files::edit_file(sandbox, args.parse()?).await,
            FsTool::GetFileInfo => files::get_file_info(sandbox, args.parse()?).await,
            FsTool::CreateDirectory => directories::create_directory(sandbox, args.parse()?).await,
            FsTool::ListDirectory => directories::list_directory(sandbox, args.parse()?).await,
            FsTool::DirectoryTree => directories::directory_tree(sandbox, args.parse()?).await,
            FsTool::MoveFile => directories::move_file(sandbox, args.parse()?).await,
            FsTool::SearchFiles => directories::search_files(sandbox, args.parse()?).await,
            FsTool::ListAllowedDirectories => {
                let NoParams {} = args.parse()?;
                Ok(directories::list_allowed_directories(sandbox))
            }
        }
    }
}

impl Tool for FsToolHandler {
    fn descriptor(&self) -> ToolDescriptor {
        self.kind.descriptor()
    }

    fn call(&self, args: Arguments) -> BoxFuture<'_, ToolResult> {
        async move { ToolResult::from(self.run(&args).await) }.boxed()
    }
}

/// Registry holding the full catalogue over one sandbox.
pub fn registry(sandbox: Arc<Sandbox>) -> Result<Registry, RegistryError> {
    let mut registry = Registry::new();
    for kind in FsTool::ALL {
        registry.register(FsToolHandler::new(kind, Arc::clone(&sandbox)))?;
    }
    Ok(registry)
}
