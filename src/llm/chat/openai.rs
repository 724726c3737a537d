use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ http_stream_lines, send_checked, ChatClient, ChatStream, StreamLine };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::ConversationMessage;
use log::debug;

/// llama.cpp's `llama-server` default listen address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug)]
pub struct OpenAIChatClient {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>, completion_model: String) -> Self {
        let url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            completion_model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::OpenAI {
            return Err(LlmError::Config("Invalid config type for OpenAIChatClient".into()));
        }
        if config.completion_model.trim().is_empty() {
            return Err(LlmError::Config("model name must not be empty".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.api_key.clone(), config.completion_model.clone()))
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request(&self, body: &ChatRequest<'_>) -> reqwest::RequestBuilder {
        let req = self.http.post(self.chat_url()).json(body);
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    fn parse_stream_line(line: &str) -> Result<StreamLine, LlmError> {
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(StreamLine::Skip);
        };
        let data = data.trim();
        if data == "[DONE]" {
            return Ok(StreamLine::Done);
        }
        let chunk: StreamChunk = serde_json
            ::from_str(data)
            .map_err(|e| LlmError::Decode(format!("{} in stream line: {}", e, data)))?;
        let token = chunk.choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .unwrap_or_default();
        if token.is_empty() {
            Ok(StreamLine::Skip)
        } else {
            Ok(StreamLine::Token(token))
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, messages: &[ConversationMessage]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: false,
        };
        debug!("POST {} ({} messages)", self.chat_url(), messages.len());
        let resp = send_checked(self.request(&body)).await?;
        let data = resp
            .json::<ChatResponse>().await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyReply)
    }

    async fn complete_stream(&self, messages: &[ConversationMessage]) -> Result<ChatStream, LlmError> {
        let body = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: true,
        };
        http_stream_lines(self.request(&body), Self::parse_stream_line)
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
