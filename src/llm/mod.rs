//! Multi-provider LLM adapter for the diagram pipeline.
//!
//! DESIGN
//! ======
//! `LLM_PROVIDER` picks Gemini (default) or Anthropic at startup; both are
//! asked for schema-constrained JSON. Callers above this module depend on
//! the [`LlmChat`] trait only, which is what the pipeline tests mock.

pub mod anthropic;
pub mod config;
pub mod gemini;
pub mod types;

use config::{LlmConfig, LlmProviderKind};
pub use types::LlmChat;
use types::{ChatResponse, LlmError, Message, ResponseSchema};

/// The configured provider client plus the model it calls.
pub struct LlmClient {
    backend: Backend,
    model: String,
}

enum Backend {
    Gemini(gemini::GeminiClient),
    Anthropic(anthropic::AnthropicClient),
}

impl LlmClient {
    /// Read [`LlmConfig`] from the environment and build the client.
    ///
    /// # Errors
    ///
    /// `MissingApiKey`, `ConfigParse`, or `HttpClientBuild`.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_config(LlmConfig::from_env()?)
    }

    /// # Errors
    ///
    /// `HttpClientBuild` when the provider's HTTP client cannot be built.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let LlmConfig { provider, api_key, model, gemini_base_url, timeouts } = config;
        let backend = match provider {
            LlmProviderKind::Gemini => Backend::Gemini(gemini::GeminiClient::new(api_key, gemini_base_url, timeouts)?),
            LlmProviderKind::Anthropic => Backend::Anthropic(anthropic::AnthropicClient::new(api_key, timeouts)?),
        };
        Ok(Self { backend, model })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn provider(&self) -> LlmProviderKind {
        match self.backend {
            Backend::Gemini(_) => LlmProviderKind::Gemini,
            Backend::Anthropic(_) => LlmProviderKind::Anthropic,
        }
    }
}

#[async_trait::async_trait]
impl LlmChat for LlmClient {
    async fn chat(
        &self,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
        schema: Option<&ResponseSchema>,
    ) -> Result<ChatResponse, LlmError> {
        let model = self.model.as_str();
        match &self.backend {
            Backend::Gemini(client) => client.chat(model, max_tokens, system, messages, schema).await,
            Backend::Anthropic(client) => client.chat(model, max_tokens, system, messages, schema).await,
        }
    }
}
