// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// QUERY SEARCH STAGE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Uma busca por sub-pergunta, com tolerância a falha por pergunta:
// qualquer erro vira uma lista de URLs vazia e o estágio segue.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;

use super::fan_out;
use crate::config::PipelineConfig;
use crate::llm::{ChatMessage, LlmClient, LlmError};
use crate::search::{SearchClient, SearchError, SearchOptions};
use crate::types::SearchGroup;
use crate::utils::{char_len, preview, truncate_chars, UsageTracker};

/// Falha isolada de uma sub-pergunta
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query condensation failed: {0}")]
    Condense(#[from] LlmError),

    #[error("search failed: {0}")]
    Search(#[from] SearchError),
}

/// Se a pergunta passa do limite de caracteres
pub fn needs_condensing(question: &str, max_query_length: usize) -> bool {
    char_len(question) > max_query_length
}

/// Estágio de busca
pub struct SearchStage {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchClient>,
    usage: Arc<UsageTracker>,
    options: SearchOptions,
    max_query_length: usize,
    max_urls: usize,
    concurrency: usize,
}

impl SearchStage {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        usage: Arc<UsageTracker>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            llm,
            search,
            usage,
            options: SearchOptions {
                depth: config.search_depth,
                max_results: config.max_urls_per_question.max(5),
                include_answer: true,
            },
            max_query_length: config.max_query_length,
            max_urls: config.max_urls_per_question,
            concurrency: config.concurrency(),
        }
    }

    /// Busca todas as perguntas. O resultado tem a mesma ordem e tamanho
    /// de `questions`, independente da ordem de conclusão.
    pub async fn run(&self, questions: &[String]) -> Vec<SearchGroup> {
        fan_out(questions.iter(), self.concurrency, |q| self.search_question(q)).await
    }

    /// Refaz apenas os grupos vazios, mantendo os demais como estão.
    pub async fn rerun_failed(&self, previous: &[SearchGroup]) -> Vec<SearchGroup> {
        fan_out(previous.iter(), self.concurrency, |group| async move {
            if group.is_empty() {
                self.search_question(&group.question).await
            } else {
                group.clone()
            }
        })
        .await
    }

    /// Busca uma pergunta; erros são logados e viram grupo vazio.
    pub async fn search_question(&self, question: &str) -> SearchGroup {
        match self.try_search(question).await {
            Ok(urls) => SearchGroup {
                question: question.to_string(),
                urls,
            },
            Err(e) => {
                log::warn!(
                    "🔍 Search failed for question: {} Error: {}",
                    preview(question, 100),
                    e
                );
                SearchGroup::empty(question)
            }
        }
    }

    async fn try_search(&self, question: &str) -> Result<Vec<String>, QueryError> {
        let query = self.prepare_query(question).await?;

        self.usage.track_search();
        let hits = self.search.search(&query, &self.options).await?;

        let urls: Vec<String> = hits
            .into_iter()
            .take(self.max_urls)
            .map(|hit| hit.url)
            .collect();

        log::debug!("🔍 {} URLs para: {}", urls.len(), preview(question, 60));
        Ok(urls)
    }

    /// Query efetivamente enviada à busca: a própria pergunta, ou um resumo
    /// gerado pelo LLM quando ela passa de `max_query_length` caracteres.
    pub async fn prepare_query(&self, question: &str) -> Result<String, LlmError> {
        if !needs_condensing(question, self.max_query_length) {
            return Ok(question.to_string());
        }
        self.condense_query(question).await
    }

    async fn condense_query(&self, question: &str) -> Result<String, LlmError> {
        let prompt = format!(
            "Summarize the following research question in under {} characters while keeping \
             its original meaning:\n\n{}",
            self.max_query_length, question
        );

        let response = self.llm.complete(&[ChatMessage::human(prompt)]).await?;
        self.usage.track_llm(response.tokens_used);

        let condensed = response.text.trim();
        if condensed.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        log::debug!(
            "✂️ Query condensada: {} → {} chars",
            char_len(question),
            char_len(condensed)
        );

        Ok(truncate_chars(condensed, self.max_query_length).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, MockLlmClient};
    use crate::search::{MockSearchClient, SearchHit};

    fn stage(llm: MockLlmClient, search: MockSearchClient) -> SearchStage {
        SearchStage::new(
            Arc::new(llm),
            Arc::new(search),
            Arc::new(UsageTracker::new()),
            &PipelineConfig {
                max_concurrency: 1,
                ..PipelineConfig::default()
            },
        )
    }

    fn hits(urls: &[&str]) -> Vec<SearchHit> {
        urls.iter().map(|u| SearchHit::from_url(*u)).collect()
    }

    #[test]
    fn test_condensing_boundary() {
        assert!(!needs_condensing(&"a".repeat(400), 400));
        assert!(needs_condensing(&"a".repeat(401), 400));
        // Conta caracteres, não bytes
        assert!(!needs_condensing(&"é".repeat(400), 400));
    }

    #[tokio::test]
    async fn test_short_question_is_searched_verbatim() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete().times(0);

        let mut search = MockSearchClient::new();
        search
            .expect_search()
            .withf(|query: &str, options: &SearchOptions| {
                query == "What is quantum annealing?"
                    && options.depth == crate::search::SearchDepth::Advanced
            })
            .times(1)
            .returning(|_, _| Ok(hits(&["https://a", "https://b"])));

        let group = stage(llm, search)
            .search_question("What is quantum annealing?")
            .await;
        assert_eq!(group.urls, vec!["https://a", "https://b"]);
    }

    #[tokio::test]
    async fn test_question_at_threshold_is_not_condensed() {
        let question = "q".repeat(400);
        let expected = question.clone();

        let mut llm = MockLlmClient::new();
        llm.expect_complete().times(0);

        let mut search = MockSearchClient::new();
        search
            .expect_search()
            .withf(move |query: &str, _: &SearchOptions| query == expected)
            .times(1)
            .returning(|_, _| Ok(hits(&["https://a"])));

        let group = stage(llm, search).search_question(&question).await;
        assert_eq!(group.question, question);
        assert_eq!(group.urls.len(), 1);
    }

    #[tokio::test]
    async fn test_long_question_is_condensed_but_original_kept() {
        let question = "q".repeat(401);

        let mut llm = MockLlmClient::new();
        llm.expect_complete().times(1).returning(|_| {
            Ok(LlmResponse {
                text: "  short version  ".into(),
                tokens_used: 5,
            })
        });

        let mut search = MockSearchClient::new();
        search
            .expect_search()
            .withf(|query: &str, _: &SearchOptions| query == "short version")
            .times(1)
            .returning(|_, _| Ok(hits(&["https://a"])));

        let group = stage(llm, search).search_question(&question).await;
        assert_eq!(group.question, question);
        assert_eq!(group.urls, vec!["https://a"]);
    }

    #[tokio::test]
    async fn test_condensed_query_is_capped() {
        let question = "q".repeat(401);

        let mut llm = MockLlmClient::new();
        llm.expect_complete().returning(|_| {
            Ok(LlmResponse {
                text: "x".repeat(450),
                tokens_used: 5,
            })
        });

        let mut search = MockSearchClient::new();
        search.expect_search().times(0);

        let query = stage(llm, search).prepare_query(&question).await.unwrap();
        assert_eq!(query.len(), 400);
    }

    #[tokio::test]
    async fn test_keeps_at_most_three_urls() {
        let llm = MockLlmClient::new();
        let mut search = MockSearchClient::new();
        search
            .expect_search()
            .returning(|_, _| Ok(hits(&["https://1", "https://2", "https://3", "https://4"])));

        let group = stage(llm, search).search_question("q").await;
        assert_eq!(group.urls, vec!["https://1", "https://2", "https://3"]);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_question() {
        let llm = MockLlmClient::new();
        let mut search = MockSearchClient::new();
        search.expect_search().returning(|query, _| {
            if query == "q2" {
                Err(SearchError::NetworkError("timeout".into()))
            } else {
                let url = format!("https://{}", query);
                Ok(hits(&[url.as_str()]))
            }
        });

        let questions = vec!["q1".to_string(), "q2".to_string(), "q3".to_string()];
        let groups = stage(llm, search).run(&questions).await;

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].urls, vec!["https://q1"]);
        assert!(groups[1].urls.is_empty());
        assert_eq!(groups[1].question, "q2");
        assert_eq!(groups[2].urls, vec!["https://q3"]);
    }

    #[tokio::test]
    async fn test_condensation_failure_yields_empty_group() {
        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_| Err(LlmError::NetworkError("down".into())));
        let mut search = MockSearchClient::new();
        search.expect_search().times(0);

        let group = stage(llm, search).search_question(&"q".repeat(500)).await;
        assert!(group.is_empty());
    }

    #[tokio::test]
    async fn test_rerun_failed_only_touches_empty_groups() {
        let llm = MockLlmClient::new();
        let mut search = MockSearchClient::new();
        search
            .expect_search()
            .withf(|query: &str, _: &SearchOptions| query == "q2")
            .times(1)
            .returning(|_, _| Ok(hits(&["https://new"])));

        let previous = vec![
            SearchGroup {
                question: "q1".into(),
                urls: vec!["https://old".into()],
            },
            SearchGroup::empty("q2"),
        ];

        let groups = stage(llm, search).rerun_failed(&previous).await;
        assert_eq!(groups[0].urls, vec!["https://old"]);
        assert_eq!(groups[1].urls, vec!["https://new"]);
    }
}
