// OpenAI-compatible chat completions adapter built on async-openai
// Works against api.openai.com or any endpoint speaking the same protocol.

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

pub struct OpenAIAdapter {
    client: Client<OpenAIConfig>,
}

impl From<OpenAIError> for AppError {
    fn from(e: OpenAIError) -> Self {
        AppError::LLMApi(format!("OpenAI API error: {}", e))
    }
}

impl OpenAIAdapter {
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url.trim_end_matches('/'));
        Self {
            client: Client::with_config(config),
        }
    }

    fn build_messages(request: &LLMRequest) -> AppResult<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.as_str())
                    .build()?
                    .into(),
            );
        }

        for message in &request.messages {
            let message: ChatCompletionRequestMessage = match message.role.as_str() {
                "assistant" => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.as_str())
                    .build()?
                    .into(),
                "system" => ChatCompletionRequestSystemMessageArgs::default()
                    .content(message.content.as_str())
                    .build()?
                    .into(),
                _ => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.as_str())
                    .build()?
                    .into(),
            };
            messages.push(message);
        }
        Ok(messages)
    }

    fn build_request(request: &LLMRequest, stream: bool) -> AppResult<CreateChatCompletionRequest> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(request.model.as_str())
            .messages(Self::build_messages(request)?);

        if let Some(max_tokens) = request.max_tokens {
            args.max_completion_tokens(max_tokens);
        }
        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }
        if request.json_output {
            args.response_format(ResponseFormat::JsonObject);
        }
        if stream {
            args.stream(true);
        }

        Ok(args.build()?)
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let response = self
            .client
            .chat()
            .create(Self::build_request(request, false)?)
            .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMApi("OpenAI returned no choices".to_string()))?;

        let usage = response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let finish_reason = choice
            .finish_reason
            .and_then(|reason| serde_json::to_value(reason).ok())
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| "stop".to_string());

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason,
            usage,
        })
    }

    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let stream = self
            .client
            .chat()
            .create_stream(Self::build_request(request, true)?)
            .await?;

        let deltas = stream.filter_map(|chunk| async move {
            match chunk {
                Ok(chunk) => chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .filter(|text| !text.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(AppError::from(e))),
            }
        });
        Ok(deltas.boxed())
    }
}
