use std::sync::Arc;

use tracing::warn;

use super::{builtin, Tool, ToolDefinition};
use crate::api::ChatToolDefinition;
use crate::core::error::AgentError;

/// Immutable catalogue of tools, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistryBuilder {
    /// First registration of a name wins.
    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        let name = tool.definition().name;
        if self.tools.iter().any(|t| t.definition().name == name) {
            warn!(tool = name, "duplicate tool registration ignored");
        } else {
            self.tools.push(tool);
        }
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// The standard catalogue. `client` is shared by network tools.
    pub fn builtin(client: reqwest::Client) -> Self {
        builtin::register_all(Self::builder(), client).build()
    }

    pub fn lookup(&self, name: &str) -> Result<&Arc<dyn Tool>, AgentError> {
        self.tools
            .iter()
            .find(|tool| tool.definition().name == name)
            .ok_or_else(|| AgentError::tool_not_found(name))
    }

    pub fn definition(&self, name: &str) -> Result<&ToolDefinition, AgentError> {
        self.lookup(name).map(|tool| tool.definition())
    }

    pub fn list(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition())
    }

    pub fn function_definitions(&self) -> Vec<ChatToolDefinition> {
        self.list()
            .map(ToolDefinition::function_definition)
            .collect()
    }

    /// Name, safety, synopsis and description per tool, for listings.
    pub fn summary_rows(&self) -> Vec<Vec<String>> {
        self.list()
            .map(|definition| {
                vec![
                    definition.name.to_string(),
                    definition.safety.label().to_string(),
                    definition.synopsis(),
                    definition.description.to_string(),
                ]
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{SafetyClass, ToolPayload};
    use async_trait::async_trait;

    struct Named(ToolDefinition);

    #[async_trait]
    impl Tool for Named {
        fn definition(&self) -> &ToolDefinition {
            &self.0
        }

        async fn run(&self, _args: &crate::tools::ToolArgs) -> Result<ToolPayload, String> {
            Ok(ToolPayload::Text(self.0.description.to_string()))
        }
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let registry = ToolRegistry::builder()
            .register(Arc::new(Named(ToolDefinition::new("alpha", "first"))))
            .build();
        assert!(registry.lookup("alpha").is_ok());
        assert_eq!(
            registry.lookup("beta").err(),
            Some(AgentError::tool_not_found("beta"))
        );
    }

    #[test]
    fn duplicate_names_keep_the_first_registration() {
        let registry = ToolRegistry::builder()
            .register(Arc::new(Named(ToolDefinition::new("alpha", "first"))))
            .register(Arc::new(Named(ToolDefinition::new("beta", "second"))))
            .register(Arc::new(Named(ToolDefinition::new("alpha", "third"))))
            .build();
        let names: Vec<_> = registry.list().map(|d| (d.name, d.description)).collect();
        assert_eq!(names, vec![("alpha", "first"), ("beta", "second")]);
    }

    #[test]
    fn builtin_catalogue_is_complete_and_classified() {
        let registry = ToolRegistry::builtin(reqwest::Client::new());
        let executing: Vec<_> = registry
            .list()
            .filter(|d| d.safety == SafetyClass::Executing)
            .map(|d| d.name)
            .collect();
        assert_eq!(executing, vec!["shell", "write_file"]);

        for name in ["ping", "fetch_url"] {
            let definition = registry.definition(name).expect("registered");
            assert!(definition.network_bound, "{name} should be network bound");
            assert!(definition.timeout.is_some());
            assert_eq!(definition.safety, SafetyClass::ReadOnly);
        }
        for definition in registry.list() {
            if definition.network_bound {
                assert!(definition.timeout.is_some());
            }
        }
        assert_eq!(registry.function_definitions().len(), registry.len());
    }
}
