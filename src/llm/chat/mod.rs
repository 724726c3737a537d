pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, StreamExt, Future };
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::ConversationMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use log::debug;

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// A chat-style completion endpoint: ordered role-tagged messages in,
/// generated text out.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Runs one non-streaming completion and returns the assistant text.
    async fn complete(&self, messages: &[ConversationMessage]) -> Result<String, LlmError>;

    /// Streams assistant tokens as the model produces them.
    async fn complete_stream(&self, messages: &[ConversationMessage]) -> Result<ChatStream, LlmError> {
        let text = self.complete(messages).await?;
        full_response_as_stream(move || async move { Ok(text) })
    }

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

/// What a single line of a streamed reply carried.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamLine {
    Token(String),
    Done,
    Skip,
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> Result<ChatStream, LlmError>
    where
        F: FnOnce(mpsc::Sender<Result<String, LlmError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

pub fn full_response_as_stream<F, Fut>(response_fn: F) -> Result<ChatStream, LlmError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, LlmError>> + Send + 'static
{
    create_streaming_response(move |tx| async move {
        let _ = tx.send(response_fn().await).await;
    })
}

/// Sends an already-built streaming request and feeds every complete line of
/// the body through `line_parser`. Lines split across chunks are reassembled.
pub fn http_stream_lines(
    request: reqwest::RequestBuilder,
    line_parser: fn(&str) -> Result<StreamLine, LlmError>
) -> Result<ChatStream, LlmError> {
    create_streaming_response(move |tx| async move {
        let resp = match send_checked(request).await {
            Ok(resp) => resp,
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        let mut bytes = resp.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let buf = match chunk {
                Ok(buf) => buf,
                Err(e) => {
                    let _ = tx.send(Err(LlmError::Transport(e))).await;
                    return;
                }
            };
            pending.extend_from_slice(&buf);

            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line_bytes: Vec<u8> = pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line_bytes);
                if !forward_line(&tx, line_parser, &line).await {
                    return;
                }
            }
        }

        if !pending.is_empty() {
            let line = String::from_utf8_lossy(&pending).to_string();
            forward_line(&tx, line_parser, &line).await;
        }
    })
}

/// Parses one line and forwards what it carried. Returns false once the
/// stream should stop: end marker, parser error, or a dropped receiver.
async fn forward_line(
    tx: &mpsc::Sender<Result<String, LlmError>>,
    line_parser: fn(&str) -> Result<StreamLine, LlmError>,
    line: &str
) -> bool {
    match line_parser(line.trim()) {
        Ok(StreamLine::Token(tok)) => tx.send(Ok(tok)).await.is_ok(),
        Ok(StreamLine::Done) => false,
        Ok(StreamLine::Skip) => true,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

/// Sends `request` and turns a non-2xx reply into [`LlmError::Status`] with
/// the body attached.
pub async fn send_checked(request: reqwest::RequestBuilder) -> Result<reqwest::Response, LlmError> {
    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        debug!("Model server error body: {}", body);
        return Err(LlmError::Status { status: status.as_u16(), body });
    }
    Ok(resp)
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}
