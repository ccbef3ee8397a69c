// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EXECUTIVE SUMMARIZER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::types::Finding;
use crate::utils::UsageTracker;

/// Respostas bem-sucedidas, em ordem, uma por linha
pub fn join_answers(findings: &[Finding]) -> String {
    findings
        .iter()
        .filter(|f| f.is_answered())
        .map(|f| f.answer.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ExecutiveSummarizer {
    llm: Arc<dyn LlmClient>,
    usage: Arc<UsageTracker>,
}

impl ExecutiveSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>, usage: Arc<UsageTracker>) -> Self {
        Self { llm, usage }
    }

    /// Resumo de 3 frases. Falha do LLM é fatal para a execução.
    pub async fn summarize(&self, findings: &[Finding]) -> Result<String, LlmError> {
        let prompt = format!(
            "Summarize the key findings in 3 sentences:\n\n{}",
            join_answers(findings)
        );

        let response = self.llm.complete(&[ChatMessage::human(prompt)]).await?;
        self.usage.track_llm(response.tokens_used);
        Ok(response.text)
    }
}
