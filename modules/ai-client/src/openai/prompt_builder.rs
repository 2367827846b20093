use anyhow::Result;
use async_trait::async_trait;

use crate::error::AiError;
use crate::traits::PromptBuilder;

use super::types::*;
use super::OpenAi;

const PROMPT_MAX_TOKENS: u32 = 1024;

/// Single-turn free-text prompt.
pub struct OpenAiPromptBuilder {
    agent: OpenAi,
    input: String,
    preamble: Option<String>,
    temperature: Option<f32>,
}

impl OpenAiPromptBuilder {
    pub(crate) fn new(agent: OpenAi, input: String) -> Self {
        Self {
            agent,
            input,
            preamble: None,
            temperature: None,
        }
    }

    pub(crate) fn request(&self) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref preamble) = self.preamble {
            messages.push(WireMessage::system(preamble));
        }
        messages.push(WireMessage::user(&self.input));
        ChatRequest::new(&self.agent.model, messages, self.temperature, PROMPT_MAX_TOKENS)
    }
}

#[async_trait]
impl PromptBuilder for OpenAiPromptBuilder {
    fn preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = Some(preamble.into());
        self
    }

    fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    async fn send(self) -> Result<String> {
        let response = self.agent.client().chat(&self.request()).await?;
        Ok(response.first_content().ok_or(AiError::EmptyResponse)?)
    }
}
