use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use async_trait::async_trait;
use super::{ http_stream_lines, send_checked, ChatClient, ChatStream, StreamLine };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::models::chat::ConversationMessage;
use log::{ debug, info };

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct StreamChunk {
    message: Option<ReplyMessage>,
    #[serde(default)]
    done: bool,
    // Set instead of `message` when the runner fails mid-reply.
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, completion_model: String) -> Self {
        let url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            completion_model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.llm_type != LlmType::Ollama {
            return Err(LlmError::Config("Invalid config type for OllamaClient".into()));
        }
        if config.completion_model.trim().is_empty() {
            return Err(LlmError::Config("model name must not be empty".into()));
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn parse_stream_line(line: &str) -> Result<StreamLine, LlmError> {
        if line.is_empty() {
            return Ok(StreamLine::Skip);
        }
        match serde_json::from_str::<StreamChunk>(line) {
            Ok(chunk) => {
                if let Some(message) = chunk.error {
                    return Err(LlmError::Model(message));
                }
                let token = chunk.message.map(|m| m.content).unwrap_or_default();
                if !token.is_empty() {
                    Ok(StreamLine::Token(token))
                } else if chunk.done {
                    Ok(StreamLine::Done)
                } else {
                    Ok(StreamLine::Skip)
                }
            }
            Err(e) => {
                info!("JSON parse error: {} for line: {}", e, line);
                Ok(StreamLine::Skip)
            }
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn complete(&self, messages: &[ConversationMessage]) -> Result<String, LlmError> {
        let req = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: false,
        };
        debug!("POST {} ({} messages)", self.chat_url(), messages.len());
        let resp = send_checked(self.http.post(self.chat_url()).json(&req)).await?;
        let data = resp
            .json::<ChatResponse>().await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        Ok(data.message.content)
    }

    async fn complete_stream(&self, messages: &[ConversationMessage]) -> Result<ChatStream, LlmError> {
        let req = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: true,
        };
        let request = self.http.post(self.chat_url()).json(&req);
        http_stream_lines(request, Self::parse_stream_line)
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
