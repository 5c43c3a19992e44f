//! rig-core integration for the reasoning completion call.
//!
//! Uses rig-core's provider clients for multi-provider support.
//! Currently supports: DeepSeek (the default), OpenAI, Anthropic, and
//! any OpenAI-compatible API.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::{ProviderConfig, ProviderName};

use super::{Message, ProviderError, ReasoningProvider, Role};

/// Maximum tokens per completion response. The reasoning output is a
/// small JSON object; this leaves ample headroom for verbose models.
const MAX_TOKENS: u64 = 8192;

/// Build an agent from a rig-core client and prompt it.
///
/// Always sets `max_tokens` — all rig-core providers support it and
/// without it some default to a low limit that truncates responses.
macro_rules! complete_with {
    ($client:expr, $model:expr, $system:expr, $user:expr, $label:expr) => {{
        let agent = $client
            .agent($model)
            .preamble($system)
            .temperature(0.0)
            .max_tokens(MAX_TOKENS)
            .build();
        agent
            .prompt($user)
            .await
            .map_err(|e| ProviderError::ApiError(format!("{} API error: {e}", $label)))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            ProviderError::ApiError(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based reasoning provider.
///
/// The provider name in config selects which rig-core client to use.
pub struct RigProvider {
    config: ProviderConfig,
}

impl RigProvider {
    /// Create a new RigProvider with the given configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_none() {
            return Err(ProviderError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or the provider-specific env var.",
                config.name,
                crate::constants::ENV_API_KEY
            )));
        }
        Ok(Self { config })
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("missing API key".to_string()))
    }

    /// Build an OpenAI-style client, optionally with a custom base URL.
    fn build_openai_client(
        &self,
        api_key: &str,
    ) -> Result<providers::openai::CompletionsClient, ProviderError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        builder
            .build()
            .map_err(|e| ProviderError::ApiError(format!("failed to create OpenAI client: {e}")))
    }

    /// Require `base_url` for OpenAI-compatible providers.
    fn require_base_url(&self) -> Result<&str, ProviderError> {
        self.config.base_url.as_deref().ok_or_else(|| {
            ProviderError::NotConfigured(
                "openai-compatible provider requires a base URL to be set".to_string(),
            )
        })
    }
}

/// Flatten an ordered message list into rig-core's preamble + prompt
/// shape: system messages become the preamble, user messages the prompt.
fn split_messages(messages: &[Message]) -> (String, String) {
    let mut system = Vec::new();
    let mut user = Vec::new();
    for message in messages {
        match message.role {
            Role::System => system.push(message.content.as_str()),
            Role::User => user.push(message.content.as_str()),
        }
    }
    (system.join("\n\n"), user.join("\n\n"))
}

#[async_trait]
impl ReasoningProvider for RigProvider {
    async fn completions(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let api_key = self.api_key()?;
        let model = self.config.model.as_str();
        let (system, user) = split_messages(messages);

        match self.config.name {
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                complete_with!(client, model, &system, &user, "DeepSeek")
            }
            ProviderName::OpenAI => {
                let client = self.build_openai_client(api_key)?;
                complete_with!(client, model, &system, &user, "OpenAI")
            }
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        ProviderError::ApiError(format!("failed to create Anthropic client: {e}"))
                    })?;
                complete_with!(client, model, &system, &user, "Anthropic")
            }
            ProviderName::OpenAICompatible => {
                let base_url = self.require_base_url()?;
                let client: providers::openai::CompletionsClient =
                    providers::openai::CompletionsClient::builder()
                        .api_key(api_key)
                        .base_url(base_url)
                        .build()
                        .map_err(|e| {
                            ProviderError::ApiError(format!(
                                "failed to create OpenAI-compatible client: {e}"
                            ))
                        })?;
                complete_with!(client, model, &system, &user, "OpenAI-compatible")
            }
        }
    }
}
