// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SYNTHESIZER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Responde cada sub-pergunta usando apenas o conteúdo recuperado.
// Falha em uma pergunta gera um Finding marcado, não aborta o estágio.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;

use super::fan_out;
use crate::llm::{ChatMessage, LlmClient};
use crate::types::{Finding, RetrievedContent};
use crate::utils::{estimate_tokens, preview, truncate_to_tokens, UsageTracker};

/// Prompt de síntese para uma pergunta
pub fn synthesis_prompt(question: &str, context: &str) -> String {
    format!(
        "Using the following text, answer the question:\n\nQuestion: {}\n\nText:\n{}",
        question, context
    )
}

pub struct Synthesizer {
    llm: Arc<dyn LlmClient>,
    usage: Arc<UsageTracker>,
    concurrency: usize,
    max_context_tokens: usize,
}

impl Synthesizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        usage: Arc<UsageTracker>,
        concurrency: usize,
        max_context_tokens: usize,
    ) -> Self {
        Self {
            llm,
            usage,
            concurrency,
            max_context_tokens,
        }
    }

    /// Um Finding por bloco, na mesma ordem.
    pub async fn run(&self, retrieved: &[RetrievedContent]) -> Vec<Finding> {
        fan_out(retrieved.iter(), self.concurrency, |item| self.answer(item)).await
    }

    pub async fn answer(&self, item: &RetrievedContent) -> Finding {
        let context = truncate_to_tokens(&item.content, self.max_context_tokens);
        if context.len() < item.content.len() {
            log::debug!(
                "✂️ Contexto truncado: ~{} → {} tokens",
                estimate_tokens(&item.content),
                self.max_context_tokens
            );
        }

        let prompt = synthesis_prompt(&item.question, context);
        match self.llm.complete(&[ChatMessage::human(prompt)]).await {
            Ok(response) => {
                self.usage.track_llm(response.tokens_used);
                Finding::answered(item.question.clone(), response.text)
            }
            Err(e) => {
                log::warn!(
                    "🧩 Synthesis failed for question: {} Error: {}",
                    preview(&item.question, 100),
                    e
                );
                Finding::failed(item.question.clone(), e.to_string())
            }
        }
    }
}
