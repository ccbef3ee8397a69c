// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CONTENT RETRIEVER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Extrai o texto de cada URL e concatena por sub-pergunta.
// URL que falha é pulada em silêncio.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;

use super::fan_out;
use crate::search::SearchClient;
use crate::types::{RetrievedContent, SearchGroup};
use crate::utils::UsageTracker;

/// Cabeçalho que antecede o texto de cada fonte
pub fn source_header(url: &str) -> String {
    format!("\n[From {}]\n", url)
}

pub struct ContentRetriever {
    search: Arc<dyn SearchClient>,
    usage: Arc<UsageTracker>,
    concurrency: usize,
}

impl ContentRetriever {
    pub fn new(search: Arc<dyn SearchClient>, usage: Arc<UsageTracker>, concurrency: usize) -> Self {
        Self {
            search,
            usage,
            concurrency,
        }
    }

    /// Um bloco por grupo, na ordem dos grupos.
    pub async fn run(&self, groups: &[SearchGroup]) -> Vec<RetrievedContent> {
        fan_out(groups.iter(), self.concurrency, |group| self.retrieve_group(group)).await
    }

    /// URLs do grupo são lidas em sequência para manter a ordem do texto.
    pub async fn retrieve_group(&self, group: &SearchGroup) -> RetrievedContent {
        let mut content = String::new();

        for url in &group.urls {
            match self.search.extract(url).await {
                Ok(page) => {
                    self.usage.track_extraction(true);
                    content.push_str(&source_header(url));
                    content.push_str(&page.text);
                }
                Err(_) => self.usage.track_extraction(false),
            }
        }

        RetrievedContent {
            question: group.question.clone(),
            content,
        }
    }
}
