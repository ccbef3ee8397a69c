// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TIPOS COMPARTILHADOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Registros que fluem entre os estágios do pipeline e o `RunState` final.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::Serialize;
use uuid::Uuid;

use crate::utils::{StageTimings, UsageSnapshot};

/// Tipo de URL (alias para String)
pub type Url = String;

/// URLs encontradas para uma sub-pergunta
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchGroup {
    /// Texto original da sub-pergunta (nunca o texto condensado)
    pub question: String,
    /// URLs em ordem de ranking; vazio se a busca falhou
    pub urls: Vec<Url>,
}

impl SearchGroup {
    /// Cria um grupo sem resultados
    pub fn empty(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            urls: Vec::new(),
        }
    }

    /// Se a busca desta pergunta não trouxe nenhuma URL
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Conteúdo concatenado de todas as URLs de uma sub-pergunta
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetrievedContent {
    pub question: String,
    pub content: String,
}

/// Resposta sintetizada para uma sub-pergunta
///
/// Quando a chamada ao LLM falha, `answer` fica vazio e `error` carrega
/// a mensagem; a posição na lista continua ocupada.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub question: String,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Finding {
    /// Finding bem-sucedido
    pub fn answered(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            error: None,
        }
    }

    /// Finding marcado com erro
    pub fn failed(question: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.error.is_none()
    }
}

/// Estado completo de uma execução do pipeline.
///
/// Cada estágio só adiciona campos; nenhum estágio remove o que um estágio
/// anterior escreveu. O registro pertence exclusivamente ao executor durante
/// a execução e é devolvido ao chamador no estado terminal.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    /// Identificador da execução (correlação de logs)
    pub run_id: Uuid,
    /// Tópico informado pelo chamador
    pub topic: String,
    /// Sub-perguntas geradas pelo planner, em ordem
    pub sub_questions: Vec<String>,
    /// Um grupo por sub-pergunta, mesma ordem
    pub search_results: Vec<SearchGroup>,
    /// Verdadeiro se algum grupo ficou sem URLs
    pub retry_search: bool,
    /// Quantas vezes o estágio SEARCH já executou
    pub search_attempts: u32,
    /// Um bloco de conteúdo por grupo de busca
    pub retrieved: Vec<RetrievedContent>,
    /// Um finding por bloco de conteúdo
    pub findings: Vec<Finding>,
    /// Resumo executivo
    pub summary: String,
    /// Relatório renderizado
    pub report: String,
    /// Contadores de chamadas externas
    pub usage: UsageSnapshot,
    /// Duração de cada estágio executado
    pub timings: StageTimings,
}

impl RunState {
    /// Estado inicial: só o tópico
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topic: topic.into(),
            sub_questions: Vec::new(),
            search_results: Vec::new(),
            retry_search: false,
            search_attempts: 0,
            retrieved: Vec::new(),
            findings: Vec::new(),
            summary: String::new(),
            report: String::new(),
            usage: UsageSnapshot::default(),
            timings: StageTimings::default(),
        }
    }

    /// Todas as URLs, pergunta por pergunta, mantendo duplicatas
    pub fn sources(&self) -> Vec<Url> {
        flatten_sources(&self.search_results)
    }

    /// URLs sem repetição, na ordem da primeira ocorrência
    pub fn unique_sources(&self) -> Vec<Url> {
        dedup_preserving_order(&self.sources())
    }

    /// Perguntas cuja busca não retornou nenhuma URL
    pub fn empty_search_questions(&self) -> Vec<String> {
        self.search_results
            .iter()
            .filter(|g| g.is_empty())
            .map(|g| g.question.clone())
            .collect()
    }
}

/// Achata as URLs de todos os grupos: ordem externa por pergunta,
/// ordem interna por ranking. Duplicatas são mantidas.
pub fn flatten_sources(groups: &[SearchGroup]) -> Vec<Url> {
    groups
        .iter()
        .flat_map(|g| g.urls.iter().cloned())
        .collect()
}

/// Remove duplicatas mantendo a primeira ocorrência
pub fn dedup_preserving_order(urls: &[Url]) -> Vec<Url> {
    let mut seen = std::collections::HashSet::new();
    urls.iter()
        .filter(|u| seen.insert(u.as_str()))
        .cloned()
        .collect()
}

/// Verdadeiro se algum grupo não tem URLs
pub fn needs_retry(groups: &[SearchGroup]) -> bool {
    groups.iter().any(SearchGroup::is_empty)
}
