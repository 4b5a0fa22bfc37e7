use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::types::{ChunkStream, CompletionRequest, LlmProvider, ProviderError};

/// Name-keyed provider table. Requests without a provider go to the default.
pub struct LLMRouter {
    default_provider: String,
    providers: BTreeMap<String, Arc<dyn LlmProvider>>,
}

impl LLMRouter {
    pub fn new(default_provider: &str) -> Self {
        Self {
            default_provider: default_provider.to_string(),
            providers: BTreeMap::new(),
        }
    }

    pub fn register_provider(&mut self, name: &str, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(name.to_string(), provider);
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let name = name.unwrap_or(&self.default_provider);
        self.providers.get(name).cloned().ok_or_else(|| {
            ProviderError::new("provider_missing", &format!("provider not registered: {}", name), false)
        })
    }
}

#[async_trait]
impl LlmProvider for LLMRouter {
    fn name(&self) -> &str {
        &self.default_provider
    }

    async fn stream_with_tools(&self, request: CompletionRequest) -> Result<ChunkStream, ProviderError> {
        let provider = self.resolve(request.provider.as_deref())?;
        provider.stream_with_tools(request).await
    }
}
