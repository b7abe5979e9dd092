//! MCP server providing sandboxed filesystem tools.
//!
//! All operations are restricted to the allowed directories fixed at
//! startup; see [`sandbox`]. The eleven tools live in [`tools`].

use mcpd::{Dispatcher, Implementation, Registry};
use sandbox::Sandbox;
use std::sync::Arc;

pub mod config;
pub mod edit;
pub mod error;
pub mod logging;
pub mod sandbox;
pub mod tools;

pub use error::Error;

/// Filesystem tool server over a fixed sandbox.
#[derive(Debug, Clone)]
pub struct FilesystemServer {
    sandbox: Arc<Sandbox>,
}

impl FilesystemServer {
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox: Arc::new(sandbox),
        }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// The full tool catalogue bound to this server's sandbox.
    pub fn registry(&self) -> Result<Registry, Error> {
        Ok(tools::registry(Arc::clone(&self.sandbox))?)
    }

    pub fn dispatcher(&self) -> Result<Dispatcher, Error> {
        Ok(Dispatcher::new(self.registry()?, Self::server_info()))
    }

    pub fn server_info() -> Implementation {
        Implementation {
            name: "mcpd-filesystem".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}
