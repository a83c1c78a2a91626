//! Connector dispatch by locator kind.

use crate::mcp_client::{
    adapters::stdio::StdioConnector,
    domain::{LocatorKind, ServerDescriptor},
    ports::{McpSession, SessionConnector, SessionError, SessionResult},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Routes each descriptor to the connector registered for its locator kind.
///
/// New transports plug in by registering another connector; callers only
/// ever see the [`SessionConnector`] port.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<LocatorKind, Arc<dyn SessionConnector>>,
}

impl ConnectorRegistry {
    /// Creates an empty registry; every locator is unsupported.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that opens every locator kind over process STDIO.
    #[must_use]
    pub fn with_stdio(stdio: StdioConnector) -> Self {
        let shared: Arc<dyn SessionConnector> = Arc::new(stdio);
        [LocatorKind::Stdio, LocatorKind::Python, LocatorKind::Node]
            .into_iter()
            .fold(Self::new(), |registry, kind| {
                registry.register(kind, Arc::clone(&shared))
            })
    }

    /// Registers `connector` for `kind`, replacing any previous entry.
    #[must_use]
    pub fn register(mut self, kind: LocatorKind, connector: Arc<dyn SessionConnector>) -> Self {
        self.connectors.insert(kind, connector);
        self
    }

    /// Returns whether a connector handles `kind`.
    #[must_use]
    pub fn supports(&self, kind: LocatorKind) -> bool {
        self.connectors.contains_key(&kind)
    }
}

#[async_trait]
impl SessionConnector for ConnectorRegistry {
    async fn open(&self, descriptor: &ServerDescriptor) -> SessionResult<Arc<dyn McpSession>> {
        let kind = descriptor.locator().kind();
        let connector = self
            .connectors
            .get(&kind)
            .ok_or(SessionError::UnsupportedLocator(kind))?;
        connector.open(descriptor).await
    }
}
