//! Tool catalogue and name-based dispatch table.

use crate::{
    args::Arguments,
    protocol::{ToolDescriptor, ToolResult},
};
use futures::future::BoxFuture;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;

/// A named operation exposed to clients.
///
/// Implementations recover every failure into a [`ToolResult`] with
/// `isError` set; the dispatcher never sees a tool error.
pub trait Tool: Send + Sync + 'static {
    /// Static catalogue entry for this tool.
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool with the client's arguments.
    fn call(&self, args: Arguments) -> BoxFuture<'_, ToolResult>;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool already registered: {0}")]
    Duplicate(String),
}

/// Insertion-ordered tool catalogue. Built once, then shared read-only.
#[derive(Default)]
pub struct Registry {
    entries: Vec<(ToolDescriptor, Arc<dyn Tool>)>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Names are unique; the catalogue keeps insertion order.
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<(), RegistryError> {
        let descriptor = tool.descriptor();
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::Duplicate(descriptor.name));
        }
        self.index
            .insert(descriptor.name.clone(), self.entries.len());
        self.entries.push((descriptor, Arc::new(tool)));
        Ok(())
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<&ToolDescriptor> {
        self.entries.iter().map(|(d, _)| d).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index
            .get(name)
            .map(|&i| Arc::clone(&self.entries[i].1))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(d, _)| &d.name))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;

    /// Echoes its `text` argument back.
    pub(crate) struct Echo(pub &'static str);

    impl Tool for Echo {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: self.0.to_string(),
                description: format!("echo as {}", self.0),
                input_schema: json!({"type": "object"}),
            }
        }

        fn call(&self, args: Arguments) -> BoxFuture<'_, ToolResult> {
            async move {
                #[derive(serde::Deserialize)]
                struct EchoParams {
                    text: String,
                }
                ToolResult::from(args.parse::<EchoParams>().map(|p| p.text))
            }
            .boxed()
        }
    }

    #[test]
    fn keeps_insertion_order() {
        let mut registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(Echo(name)).unwrap();
        }
        let names: Vec<_> = registry.list().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn rejects_duplicates() {
        let mut registry = Registry::new();
        registry.register(Echo("a")).unwrap();
        assert_eq!(
            registry.register(Echo("a")),
            Err(RegistryError::Duplicate("a".into()))
        );
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let mut registry = Registry::new();
        registry.register(Echo("echo")).unwrap();
        assert!(registry.get("missing").is_none());

        let tool = registry.get("echo").unwrap();
        let args = Arguments::new(json!({"text": "hi"}).as_object().cloned().unwrap());
        let result = tool.call(args).await;
        assert_eq!(result, ToolResult::text("hi"));

        let result = tool.call(Arguments::default()).await;
        assert!(result.is_error());
    }
}
