use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::llm::{ LlmConfig, LlmError, LlmType };
use crate::llm::chat::{ ChatClient, ChatStream, new_client as new_chat_client };
use crate::models::chat::ConversationMessage;
use crate::sanitize::sanitize;

use log::{ info, warn, error, debug };
use std::error::Error;
use std::sync::Arc;

const DATA_CONTEXT_LOG_PREFIX: usize = 200;

/// Request-independent state shared by every handler: the chat client and the
/// prompt templates. Immutable once built.
#[derive(Clone)]
pub struct Advisor {
    chat_client: Arc<dyn ChatClient>,
    prompt_config: Arc<PromptConfig>,
}

impl Advisor {
    pub fn new(chat_client: Arc<dyn ChatClient>, prompt_config: Arc<PromptConfig>) -> Self {
        Self { chat_client, prompt_config }
    }

    fn initialize_chat_client(args: &Args) -> Result<Arc<dyn ChatClient>, Box<dyn Error + Send + Sync>> {
        let chat_llm_type: LlmType = args.chat_llm_type.parse()?;
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );
        Ok(chat_client)
    }

    fn load_prompt_config(args: &Args) -> Result<Arc<PromptConfig>, Box<dyn Error + Send + Sync>> {
        match &args.prompts_path {
            Some(path) if !path.trim().is_empty() => Ok(prompt::load_prompts(path)?),
            _ => {
                info!("Using built-in prompt templates");
                Ok(Arc::new(PromptConfig::default()))
            }
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_client = Self::initialize_chat_client(args)?;
        let prompt_config = Self::load_prompt_config(args)?;
        Ok(Self::new(chat_client, prompt_config))
    }

    pub fn model(&self) -> String {
        self.chat_client.get_model()
    }

    /// The one path both flows use to reach the model.
    async fn invoke_chat(&self, messages: &[ConversationMessage]) -> Result<String, LlmError> {
        debug!("Invoking model {} with {} messages", self.chat_client.get_model(), messages.len());
        let reply = self.chat_client.complete(messages).await?;
        debug!("Model replied with {} bytes", reply.len());
        Ok(reply)
    }

    /// Advice flow: policy prompt, model call, reasoning removed. Model
    /// failures are returned to the caller.
    pub async fn advise(&self, spending_data: &str) -> Result<String, LlmError> {
        let messages = prompt::build_advice_messages(&self.prompt_config, spending_data);
        let raw = self.invoke_chat(&messages).await?;
        Ok(sanitize(&raw))
    }

    /// Streams the raw advice-flow tokens, reasoning included. Callers are
    /// expected to run the collected text through [`sanitize`].
    pub async fn advise_stream(&self, spending_data: &str) -> Result<ChatStream, LlmError> {
        let messages = prompt::build_advice_messages(&self.prompt_config, spending_data);
        self.chat_client.complete_stream(&messages).await
    }

    /// Analysis flow: analyst prompt, model call, raw reply. Never fails; a
    /// model failure becomes an `Error: ...` message in the reply text.
    pub async fn analyze(&self, query: &str, data_context: &str) -> String {
        info!("Analysis query: {}", query);
        let prefix: String = data_context.chars().take(DATA_CONTEXT_LOG_PREFIX).collect();
        if prefix.len() < data_context.len() {
            info!("Data context: {}...", prefix);
        } else {
            info!("Data context: {}", prefix);
        }

        let messages = prompt::build_analysis_messages(&self.prompt_config, query, data_context);
        match self.invoke_chat(&messages).await {
            Ok(reply) => {
                if reply.trim().is_empty() {
                    warn!("Model returned an empty analysis");
                }
                reply
            }
            Err(e) => {
                error!("Analysis model call failed: {}", e);
                format!("Error: {}", e)
            }
        }
    }
}
