//! # Research Pipeline
//!
//! Pipeline de pesquisa sobre um tópico: o LLM decompõe o tópico em
//! sub-perguntas, cada pergunta é buscada na web, o conteúdo das fontes é
//! lido e sintetizado em uma resposta, e tudo vira um relatório markdown.
//!
//! ## Fluxo
//!
//! ```text
//! PLAN → SEARCH ⇄ retry gate → RETRIEVE → SYNTHESIZE → SUMMARY → REPORT → END
//!                    ↘ FAILED                ↘ FAILED
//! ```
//!
//! - **PLAN**: uma chamada ao LLM, uma sub-pergunta por linha
//! - **SEARCH**: uma busca por pergunta (queries longas são condensadas)
//! - **Retry gate**: volta ao SEARCH enquanto houver pergunta sem URLs e
//!   tentativas disponíveis
//! - **RETRIEVE**: texto de cada URL, concatenado por pergunta
//! - **SYNTHESIZE**: uma resposta por pergunta, falhas isoladas
//! - **SUMMARY**: resumo executivo em 3 frases
//! - **REPORT**: template Handlebars preenchido
//!
//! O trabalho por pergunta roda em paralelo com limite de concorrência e a
//! saída de cada estágio mantém a ordem das sub-perguntas.
//!
//! ## Exemplo de Uso
//!
//! ```rust,ignore
//! use research_pipeline::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let llm = Arc::new(OpenAiCompatClient::new(&load_llm_config()));
//!     let search = Arc::new(TavilyClient::new(&load_search_config()));
//!     let pipeline = ResearchPipeline::new(llm, search, load_pipeline_config());
//!
//!     let state = pipeline.run("Quantum computing in logistics").await?;
//!     println!("{}", state.report);
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

/// Registros que fluem entre os estágios.
///
/// - [`SearchGroup`]: URLs de uma sub-pergunta
/// - [`RetrievedContent`]: texto concatenado de uma sub-pergunta
/// - [`Finding`]: resposta (ou erro) de uma sub-pergunta
/// - [`RunState`]: estado completo de uma execução
pub mod types;

/// Estágios do pipeline, máquina de estados e executor.
pub mod pipeline;

/// Clientes para Large Language Models (LLMs).
///
/// Define a trait `LlmClient` e implementações para:
/// - APIs compatíveis com OpenAI (Groq por padrão)
/// - Cliente roteirizado para testes
pub mod llm;

/// Clientes de busca e extração de conteúdo.
///
/// Define a trait `SearchClient` e implementações para:
/// - Tavily (search + extract)
/// - Cliente roteirizado para testes
pub mod search;

/// Utilitários: medição de tempo, contadores de uso e texto.
pub mod utils;

/// Configuração via variáveis de ambiente.
pub mod config;

// Re-exports principais
pub use config::{
    create_tokio_runtime, load_llm_config, load_pipeline_config, load_runtime_config,
    load_search_config, LlmConfig, PipelineConfig, RetryScope, RuntimeConfig, SearchConfig,
};
pub use pipeline::{PipelineError, PipelineProgress, ResearchPipeline, Stage};
pub use types::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use crate::config::{
        load_llm_config, load_pipeline_config, load_search_config, PipelineConfig, RetryScope,
    };
    pub use crate::llm::{LlmClient, LlmError, OpenAiCompatClient, ScriptedLlmClient};
    pub use crate::pipeline::{
        PipelineError, PipelineProgress, ReportRenderer, ResearchPipeline, Stage,
    };
    pub use crate::search::{ScriptedSearchClient, SearchClient, SearchError, TavilyClient};
    pub use crate::types::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
