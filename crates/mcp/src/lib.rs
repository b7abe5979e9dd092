//! Core of a JSON-RPC tool server speaking the MCP dialect.
//!
//! - [`protocol`]: envelopes, tool descriptors and tool results.
//! - [`args`]: typed extraction of tool arguments.
//! - [`registry`]: the [`Tool`] trait and the ordered tool catalogue.
//! - [`dispatch`]: the per-connection request loop.
//! - [`transport`]: line-delimited stdio and HTTP + SSE adapters.
//!
//! ```rust,ignore
//! let mut registry = mcpd::Registry::new();
//! registry.register(MyTool)?;
//! let dispatcher = mcpd::Dispatcher::new(registry, server_info);
//! mcpd::serve(&dispatcher, mcpd::transport::stdio(), shutdown).await?;
//! ```

pub mod args;
pub mod dispatch;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use args::{ArgumentError, Arguments};
pub use dispatch::{Dispatcher, serve};
pub use protocol::{Content, Implementation, ToolDescriptor, ToolResult};
pub use registry::{Registry, RegistryError, Tool};
