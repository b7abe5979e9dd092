use crate::sandbox::RootError;
use std::net::SocketAddr;
use thiserror::Error;

/// Failures that stop the server before or while it runs.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no allowed directories given")]
    NoRoots,

    #[error("invalid allowed directory: {0}")]
    Root(#[from] RootError),

    #[error("tool registration error: {0}")]
    Registry(#[from] mcpd::RegistryError),

    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
