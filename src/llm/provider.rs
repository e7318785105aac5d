use crate::config::LLMConfig;
use crate::llm::anthropic::AnthropicAdapter;
use crate::llm::openai::OpenAIAdapter;
use crate::types::{AppError, AppResult, LLMProvider, LLMRequest, LLMResponse};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;

    /// Incremental text deltas. Adapters that cannot stream keep the default.
    async fn create_chat_completion_stream(
        &self,
        _request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        Err(AppError::LLMApi("Streaming not supported by this provider".to_string()))
    }
}

/// Configuration for building an LLM client
pub struct LLMProviderConfig {
    pub provider: LLMProvider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl LLMProviderConfig {
    pub fn from_config(config: &LLMConfig) -> AppResult<Self> {
        let provider = LLMProvider::from_id(&config.provider)
            .ok_or_else(|| AppError::Config(format!("Unsupported provider: {}", config.provider)))?;
        let api_key = config.active_api_key().ok_or_else(|| {
            AppError::Config(format!("No API key configured for provider {}", provider))
        })?;
        let base_url = match provider {
            LLMProvider::OpenAI => config.openai_base_url.clone(),
            LLMProvider::Anthropic => config.anthropic_base_url.clone(),
        };
        Ok(Self {
            provider,
            api_key,
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

/// Provider-agnostic client used by every agent
pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
    provider_name: String,
    model: String,
    temperature: f32,
}

impl LLM {
    pub fn new(config: LLMProviderConfig) -> Self {
        let adapter: Box<dyn LLMAdapter> = match config.provider {
            LLMProvider::OpenAI => Box::new(OpenAIAdapter::with_base_url(
                &config.api_key,
                &config.base_url,
            )),
            LLMProvider::Anthropic => Box::new(AnthropicAdapter::with_base_url(
                &config.api_key,
                &config.base_url,
            )),
        };

        Self {
            adapter,
            provider_name: config.provider.to_string(),
            model: config.model,
            temperature: config.temperature,
        }
    }

    /// Wrap an arbitrary adapter, e.g. a scripted one in tests
    pub fn from_adapter(adapter: Box<dyn LLMAdapter>, model: impl Into<String>) -> Self {
        Self {
            adapter,
            provider_name: "custom".to_string(),
            model: model.into(),
            temperature: 0.3,
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request pre-filled with this client's model and temperature
    pub fn request(&self, system: &str, prompt: impl Into<String>) -> LLMRequest {
        LLMRequest::new(self.model.clone(), prompt)
            .with_system(system)
            .with_temperature(self.temperature)
    }

    pub async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }

    pub async fn generate_text(&self, request: &LLMRequest) -> AppResult<String> {
        let response = self.adapter.create_chat_completion(request).await?;
        debug!(
            provider = %self.provider_name,
            finish_reason = %response.finish_reason,
            total_tokens = response.usage.total_tokens,
            "Completion received"
        );
        Ok(response.content)
    }

    /// Stream text to `on_chunk`, falling back to a plain completion when the
    /// provider cannot stream or the stream yields nothing.
    pub async fn stream_text<F>(&self, request: &LLMRequest, mut on_chunk: F) -> AppResult<String>
    where
        F: FnMut(&str) + Send,
    {
        match self.adapter.create_chat_completion_stream(request).await {
            Ok(mut stream) => {
                let mut full = String::new();
                while let Some(chunk) = stream.next().await {
                    match chunk {
                        Ok(delta) => {
                            if !delta.is_empty() {
                                on_chunk(&delta);
                                full.push_str(&delta);
                            }
                        }
                        Err(e) if full.is_empty() => {
                            warn!(error = %e, "Streaming failed before any output, falling back");
                            return self.generate_text(request).await;
                        }
                        Err(e) => return Err(e),
                    }
                }

                if full.is_empty() {
                    warn!("Streaming returned empty response, falling back");
                    return self.generate_text(request).await;
                }
                Ok(full)
            }
            Err(e) => {
                debug!(error = %e, "Streaming not available, using standard completion");
                self.generate_text(request).await
            }
        }
    }

    /// Ask for JSON and deserialize it into `T`
    pub async fn generate_object<T: DeserializeOwned>(&self, request: &LLMRequest) -> AppResult<T> {
        let mut request = request.clone();
        request.json_output = true;
        let text = self.generate_text(&request).await?;
        crate::llm::structured::parse_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenUsage;
    use futures::stream;

    struct EchoAdapter {
        stream_chunks: Option<Vec<&'static str>>,
    }

    #[async_trait]
    impl LLMAdapter for EchoAdapter {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            Ok(LLMResponse {
                content: format!("echo: {}", request.prompt_text()),
                finish_reason: "stop".to_string(),
                usage: TokenUsage::default(),
            })
        }

        async fn create_chat_completion_stream(
            &self,
            _request: &LLMRequest,
        ) -> AppResult<BoxStream<'static, AppResult<String>>> {
            match &self.stream_chunks {
                Some(chunks) => {
                    let items: Vec<AppResult<String>> =
                        chunks.iter().map(|c| Ok(c.to_string())).collect();
                    Ok(stream::iter(items).boxed())
                }
                None => Err(AppError::LLMApi("no stream".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_stream_text_collects_chunks() {
        let adapter = EchoAdapter {
            stream_chunks: Some(vec!["Plan ", "the ", "search"]),
        };
        let llm = LLM::from_adapter(Box::new(adapter), "test-model");
        let mut seen = Vec::new();
        let text = llm
            .stream_text(&llm.request("system", "hi"), |c| seen.push(c.to_string()))
            .await
            .unwrap();
        assert_eq!(text, "Plan the search");
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn test_stream_text_falls_back_without_streaming() {
        let adapter = EchoAdapter {
            stream_chunks: None,
        };
        let llm = LLM::from_adapter(Box::new(adapter), "test-model");
        let text = llm.stream_text(&llm.request("system", "hi"), |_| {}).await.unwrap();
        assert_eq!(text, "echo: hi");
    }

    #[tokio::test]
    async fn test_stream_text_falls_back_on_empty_stream() {
        let adapter = EchoAdapter {
            stream_chunks: Some(vec![]),
        };
        let llm = LLM::from_adapter(Box::new(adapter), "test-model");
        let text = llm.stream_text(&llm.request("system", "hi"), |_| {}).await.unwrap();
        assert_eq!(text, "echo: hi");
    }

    #[test]
    fn test_provider_config_requires_key() {
        let config = LLMConfig {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            openai_api_key: String::new(),
            anthropic_api_key: "sk-ant".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            anthropic_base_url: "https://api.anthropic.com".to_string(),
            temperature: 0.3,
        };
        assert!(matches!(LLMProviderConfig::from_config(&config), Err(AppError::Config(_))));

        let config = LLMConfig {
            provider: "anthropic".to_string(),
            ..config
        };
        let provider = LLMProviderConfig::from_config(&config).unwrap();
        assert_eq!(provider.provider, LLMProvider::Anthropic);
        assert_eq!(provider.base_url, "https://api.anthropic.com");
        assert_eq!(LLM::new(provider).provider_name(), "anthropic");
    }
}
