//! Model registry: builds the configured chat-completions service

use super::{LlmService, LoggingService, OpenAIEndpoint, OpenAIService};
use std::sync::Arc;

const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for the LLM provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_deployment: Option<String>,
    pub azure_api_version: Option<String>,
    pub azure_api_key: Option<String>,
    /// Model name sent with each request
    pub model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            azure_endpoint: get("AZURE_ENDPOINT"),
            azure_deployment: get("AZURE_DEPLOYMENT"),
            azure_api_version: get("API_VERSION"),
            azure_api_key: get("API_KEY"),
            model: get("MODEL"),
        }
    }

    fn model(&self) -> String {
        self.model
            .clone()
            .or_else(|| self.azure_deployment.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }
}

/// Holds the service used for agent turns and title generation
pub struct ModelRegistry {
    default: Option<Arc<dyn LlmService>>,
}

impl ModelRegistry {
    /// Azure takes precedence when its endpoint, deployment and key are all set
    pub fn new(config: &LlmConfig) -> Self {
        let default = Self::try_create(config).and_then(|service| match service {
            Ok(service) => Some(Arc::new(LoggingService::new(service)) as Arc<dyn LlmService>),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create LLM service");
                None
            }
        });

        if let Some(service) = &default {
            tracing::info!(model = %service.model_id(), "LLM service configured");
        } else {
            tracing::warn!("No LLM credentials configured; agent turns will fail");
        }

        Self { default }
    }

    pub fn new_empty() -> Self {
        Self { default: None }
    }

    fn try_create(
        config: &LlmConfig,
    ) -> Option<Result<Arc<dyn LlmService>, super::LlmError>> {
        let model = config.model();
        let (api_key, endpoint) = match (
            &config.azure_endpoint,
            &config.azure_deployment,
            &config.azure_api_key,
        ) {
            (Some(endpoint), Some(deployment), Some(key)) => (
                key.clone(),
                OpenAIEndpoint::Azure {
                    endpoint: endpoint.clone(),
                    deployment: deployment.clone(),
                    api_version: config
                        .azure_api_version
                        .clone()
                        .unwrap_or_else(|| "2024-06-01".to_string()),
                },
            ),
            _ => (
                config.openai_api_key.clone()?,
                OpenAIEndpoint::OpenAI {
                    base_url: config.openai_base_url.clone(),
                },
            ),
        };

        Some(
            OpenAIService::new(api_key, model, endpoint)
                .map(|service| Arc::new(service) as Arc<dyn LlmService>),
        )
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.default.clone()
    }

    pub fn has_models(&self) -> bool {
        self.default.is_some()
    }
}
