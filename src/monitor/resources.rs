//! Cloud resource enumeration
//!
//! Each configured resource type has one enumerator. The registry is an
//! explicit list built at startup; listing fails as a whole if any
//! enumerator fails.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::daemon::config::ResourceSource;
use crate::tooling::process::run_command;
use crate::tooling::ToolingError;

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("Listing failed for resource type {resource_type}: {source}")]
    Tool {
        resource_type: String,
        #[source]
        source: ToolingError,
    },

    #[error("Listing failed for resource type {resource_type} ({status}): {output}")]
    Failed {
        resource_type: String,
        status: String,
        output: String,
    },
}

/// A resource as reported by one enumerator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    pub id: String,
    pub details: String,
}

impl DiscoveredResource {
    pub fn new(id: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            details: details.into(),
        }
    }
}

/// A discovered resource tagged with its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedResource {
    pub resource_type: String,
    pub resource_id: String,
    pub details: String,
}

/// Lists every live instance of one resource type
#[async_trait]
pub trait ResourceEnumerator: Send + Sync {
    async fn list(&self) -> Result<Vec<DiscoveredResource>, EnumerationError>;
}

/// Runs a command printing one resource per line as `<id>` or `<id>\t<details>`
#[derive(Debug, Clone)]
pub struct CommandEnumerator {
    resource_type: String,
    command: Vec<String>,
    timeout: Duration,
}

impl CommandEnumerator {
    pub fn new(resource_type: impl Into<String>, command: Vec<String>, timeout: Duration) -> Self {
        Self {
            resource_type: resource_type.into(),
            command,
            timeout,
        }
    }
}

/// Parse enumerator output; blank lines and lines without an id are skipped
pub fn parse_listing(output: &str) -> Vec<DiscoveredResource> {
    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .map(|line| match line.split_once('\t') {
            Some((id, details)) => DiscoveredResource::new(id.trim(), details),
            None => DiscoveredResource::new(line.trim(), ""),
        })
        .filter(|resource| !resource.id.is_empty())
        .collect()
}

#[async_trait]
impl ResourceEnumerator for CommandEnumerator {
    async fn list(&self) -> Result<Vec<DiscoveredResource>, EnumerationError> {
        let output = run_command(&self.command, &[], self.timeout)
            .await
            .map_err(|source| EnumerationError::Tool {
                resource_type: self.resource_type.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EnumerationError::Failed {
                resource_type: self.resource_type.clone(),
                status: output.status.to_string(),
                output: output.combined,
            });
        }

        Ok(parse_listing(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Returns a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticEnumerator {
    resources: Vec<DiscoveredResource>,
}

impl StaticEnumerator {
    pub fn new(resources: Vec<DiscoveredResource>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl ResourceEnumerator for StaticEnumerator {
    async fn list(&self) -> Result<Vec<DiscoveredResource>, EnumerationError> {
        Ok(self.resources.clone())
    }
}

/// Ordered set of `(type name, enumerator)` pairs
#[derive(Default)]
pub struct ResourceRegistry {
    enumerators: Vec<(String, Box<dyn ResourceEnumerator>)>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `CommandEnumerator` per configured source
    pub fn from_sources(sources: &[ResourceSource], timeout: Duration) -> Self {
        let mut registry = Self::new();
        for source in sources {
            registry.register(
                &source.resource_type,
                Box::new(CommandEnumerator::new(
                    source.resource_type.clone(),
                    source.command.clone(),
                    timeout,
                )),
            );
        }
        registry
    }

    pub fn register(&mut self, resource_type: &str, enumerator: Box<dyn ResourceEnumerator>) {
        self.enumerators.push((resource_type.to_string(), enumerator));
    }

    pub fn is_empty(&self) -> bool {
        self.enumerators.is_empty()
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.enumerators.iter().map(|(name, _)| name.as_str())
    }

    /// List every registered type in registration order
    pub async fn list_all(&self) -> Result<Vec<ListedResource>, EnumerationError> {
        let mut listed = Vec::new();
        for (resource_type, enumerator) in &self.enumerators {
            for resource in enumerator.list().await? {
                listed.push(ListedResource {
                    resource_type: resource_type.clone(),
                    resource_id: resource.id,
                    details: resource.details,
                });
            }
        }
        Ok(listed)
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.types()).finish()
    }
}
