// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// QUESTION PLANNER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Decompõe o tópico em sub-perguntas com uma única chamada ao LLM.
// A quantidade final é o que sobrevive ao parse das linhas, sem retry.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;

use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::utils::UsageTracker;

/// Persona do planner
pub const PLANNER_SYSTEM_PROMPT: &str = "You are a research assistant meant to answer complex \
questions with high levels of detail and accuracy. You must prioritize the most recent data and \
have full access to the internet.";

/// Planner de sub-perguntas
pub struct QuestionPlanner {
    llm: Arc<dyn LlmClient>,
    usage: Arc<UsageTracker>,
    question_count: usize,
}

impl QuestionPlanner {
    pub fn new(llm: Arc<dyn LlmClient>, usage: Arc<UsageTracker>, question_count: usize) -> Self {
        Self {
            llm,
            usage,
            question_count,
        }
    }

    /// Mensagens enviadas ao modelo para um tópico
    pub fn messages(&self, topic: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(PLANNER_SYSTEM_PROMPT),
            ChatMessage::human(format!(
                "Break this topic into {} insightful research questions, one per line:\n\n{}",
                self.question_count, topic
            )),
        ]
    }

    /// Gera as sub-perguntas. Falha do LLM é fatal para a execução.
    pub async fn plan(&self, topic: &str) -> Result<Vec<String>, LlmError> {
        let response = self.llm.complete(&self.messages(topic)).await?;
        self.usage.track_llm(response.tokens_used);

        let questions = parse_sub_questions(&response.text);
        if questions.len() != self.question_count {
            log::warn!(
                "⚠️ Planner pediu {} perguntas e recebeu {}",
                self.question_count,
                questions.len()
            );
        }

        Ok(questions)
    }
}

/// Uma pergunta por linha; remove marcadores de lista e espaços das pontas
/// e descarta linhas vazias. A ordem é preservada.
pub fn parse_sub_questions(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '•' | '*')))
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlmClient, Role};

    #[test]
    fn test_parse_strips_bullets_and_blank_lines() {
        let output = "\n- What is A?\n• What is B?\n\n   * What is C?  \n-\n";
        assert_eq!(
            parse_sub_questions(output),
            vec!["What is A?", "What is B?", "What is C?"]
        );
    }

    #[test]
    fn test_parse_keeps_duplicates_and_order() {
        let output = "Q2\nQ1\nQ2";
        assert_eq!(parse_sub_questions(output), vec!["Q2", "Q1", "Q2"]);
    }

    #[test]
    fn test_parse_handles_crlf() {
        assert_eq!(parse_sub_questions("A?\r\nB?\r\n"), vec!["A?", "B?"]);
    }

    #[tokio::test]
    async fn test_plan_sends_system_and_human_messages() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .withf(|messages: &[ChatMessage]| {
                messages.len() == 2
                    && messages[0].role == Role::System
                    && messages[1].role == Role::Human
                    && messages[1].content.contains("5 insightful research questions")
                    && messages[1].content.ends_with("Edge AI")
            })
            .times(1)
            .returning(|_| {
                Ok(LlmResponse {
                    text: "1st?\n2nd?\n3rd?".into(),
                    tokens_used: 12,
                })
            });

        let usage = Arc::new(UsageTracker::new());
        let planner = QuestionPlanner::new(Arc::new(llm), usage.clone(), 5);
        let questions = planner.plan("Edge AI").await.unwrap();

        // Menos linhas que o pedido: segue sem retry
        assert_eq!(questions, vec!["1st?", "2nd?", "3rd?"]);
        assert_eq!(usage.snapshot().llm_calls, 1);
        assert_eq!(usage.snapshot().tokens_used, 12);
    }

    #[tokio::test]
    async fn test_plan_propagates_llm_error() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_| Err(LlmError::NetworkError("down".into())));

        let planner = QuestionPlanner::new(Arc::new(llm), Arc::new(UsageTracker::new()), 5);
        assert!(planner.plan("topic").await.is_err());
    }
}
