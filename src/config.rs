// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CONFIGURAÇÃO DO RUNTIME, CLIENTES E PIPELINE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Configurações para o runtime Tokio, os clientes externos (LLM e busca)
// e os limites do pipeline. Todas podem ser definidas via .env
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::search::SearchDepth;

/// Limite de caracteres de uma query antes de ser condensada
pub const MAX_QUERY_LENGTH: usize = 400;

/// Quantidade de perguntas pedida ao planner
pub const DEFAULT_QUESTION_COUNT: usize = 5;

/// URLs mantidas por sub-pergunta
pub const DEFAULT_MAX_URLS: usize = 3;

/// Execuções máximas do estágio SEARCH por run
pub const DEFAULT_MAX_SEARCH_ATTEMPTS: u32 = 3;

/// Template padrão, relativo ao diretório de execução
pub const DEFAULT_TEMPLATE_PATH: &str = "report_template.md";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Lê e converte uma variável; valores inválidos são ignorados com aviso.
fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("⚠️ Valor inválido para {}: {:?} (usando padrão)", key, raw);
            None
        }
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn http_timeout<F>(lookup: &F) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    let secs = parse_var::<u64, _>(lookup, "HTTP_TIMEOUT_SECS")
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RUNTIME
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuração do runtime Tokio.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Número de worker threads do Tokio.
    /// Se None, usa cálculo dinâmico: min(cpu_cores, max_threads).
    pub worker_threads: Option<usize>,

    /// Número máximo de threads (limite superior para cálculo dinâmico).
    pub max_threads: usize,

    /// Número máximo de blocking threads.
    pub max_blocking_threads: usize,

    /// Nome das threads do runtime.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_threads: 16,
            max_blocking_threads: 512,
            thread_name: "research-pipeline".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Calcula número efetivo de worker threads.
    pub fn effective_worker_threads(&self) -> usize {
        if let Some(threads) = self.worker_threads {
            threads
        } else {
            std::cmp::min(num_cpus::get(), self.max_threads)
        }
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(threads) = parse_var::<usize, _>(&lookup, "TOKIO_THREADS").filter(|t| *t > 0) {
            config.worker_threads = Some(threads);
            log::info!("📦 TOKIO_THREADS={} (fixo)", threads);
        }
        if let Some(max) = parse_var::<usize, _>(&lookup, "TOKIO_MAX_THREADS").filter(|t| *t > 0) {
            config.max_threads = max;
            log::info!("📦 TOKIO_MAX_THREADS={}", max);
        }
        if let Some(blocking) =
            parse_var::<usize, _>(&lookup, "TOKIO_MAX_BLOCKING").filter(|t| *t > 0)
        {
            config.max_blocking_threads = blocking;
            log::info!("📦 TOKIO_MAX_BLOCKING={}", blocking);
        }

        config
    }
}

/// Carrega configuração do runtime a partir das variáveis de ambiente.
///
/// - `TOKIO_THREADS`: número fixo de threads (opcional)
/// - `TOKIO_MAX_THREADS`: máximo para cálculo dinâmico (padrão: 16)
/// - `TOKIO_MAX_BLOCKING`: máximo de blocking threads (padrão: 512)
pub fn load_runtime_config() -> RuntimeConfig {
    RuntimeConfig::from_lookup(env_lookup)
}

/// Cria o runtime Tokio com configuração customizada.
pub fn create_tokio_runtime(config: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let worker_threads = config.effective_worker_threads();

    log::info!(
        "🚀 Criando runtime Tokio: {} workers, {} blocking max",
        worker_threads,
        config.max_blocking_threads
    );

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(config.max_blocking_threads)
        .thread_name(&config.thread_name)
        .enable_all()
        .build()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLIENTES EXTERNOS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuração do cliente LLM (API compatível com OpenAI; Groq por padrão).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: None,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            api_key: non_empty(&lookup, "GROQ_API_KEY").or_else(|| non_empty(&lookup, "LLM_API_KEY")),
            api_base_url: non_empty(&lookup, "LLM_API_BASE_URL").unwrap_or(defaults.api_base_url),
            model: non_empty(&lookup, "LLM_MODEL").unwrap_or(defaults.model),
            temperature: parse_var::<f32, _>(&lookup, "LLM_TEMPERATURE"),
            timeout: http_timeout(&lookup),
        };

        log::info!("📦 LLM: {} @ {}", config.model, config.api_base_url);
        config
    }
}

/// Carrega a configuração do LLM.
///
/// - `GROQ_API_KEY` (ou `LLM_API_KEY`)
/// - `LLM_API_BASE_URL` (padrão: Groq)
/// - `LLM_MODEL` (padrão: "llama-3.3-70b-versatile")
/// - `LLM_TEMPERATURE` (opcional)
/// - `HTTP_TIMEOUT_SECS` (padrão: 60)
pub fn load_llm_config() -> LlmConfig {
    LlmConfig::from_lookup(env_lookup)
}

/// Configuração do cliente de busca (Tavily).
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://api.tavily.com".to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl SearchConfig {
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_key: non_empty(&lookup, "TAVILY_API_KEY"),
            api_base_url: non_empty(&lookup, "TAVILY_API_BASE_URL")
                .unwrap_or_else(|| Self::default().api_base_url),
            timeout: http_timeout(&lookup),
        }
    }
}

/// Carrega a configuração da busca (`TAVILY_API_KEY`, `TAVILY_API_BASE_URL`).
pub fn load_search_config() -> SearchConfig {
    SearchConfig::from_lookup(env_lookup)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PIPELINE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Quais perguntas o SEARCH repete quando o gate manda voltar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryScope {
    /// Refaz a busca de todas as sub-perguntas
    #[default]
    All,
    /// Refaz apenas as sub-perguntas sem URLs; as demais são mantidas
    FailedOnly,
}

impl RetryScope {
    /// "failed" / "failed_only" → FailedOnly; qualquer outro valor → All
    pub fn from_env(value: &str) -> Self {
        match value.to_lowercase().trim() {
            "failed" | "failed_only" | "failed-only" => Self::FailedOnly,
            _ => Self::All,
        }
    }
}

impl fmt::Display for RetryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::FailedOnly => write!(f, "failed-only"),
        }
    }
}

/// Limites e comportamento do pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Perguntas pedidas ao planner
    pub question_count: usize,
    /// Acima disso (em caracteres) a query é condensada pelo LLM
    pub max_query_length: usize,
    /// URLs mantidas por sub-pergunta
    pub max_urls_per_question: usize,
    /// Profundidade da busca
    pub search_depth: SearchDepth,
    /// Execuções máximas do SEARCH (inclui a primeira)
    pub max_search_attempts: u32,
    /// Quais perguntas são refeitas no retry
    pub retry_scope: RetryScope,
    /// Segue para RETRIEVE com resultados parciais quando o retry esgota
    pub proceed_on_exhausted_retries: bool,
    /// Itens processados em paralelo dentro de um estágio
    pub max_concurrency: usize,
    /// Limite (estimado) de tokens de contexto por síntese
    pub max_context_tokens: usize,
    /// Caminho do template do relatório
    pub template_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            max_query_length: MAX_QUERY_LENGTH,
            max_urls_per_question: DEFAULT_MAX_URLS,
            search_depth: SearchDepth::Advanced,
            max_search_attempts: DEFAULT_MAX_SEARCH_ATTEMPTS,
            retry_scope: RetryScope::All,
            proceed_on_exhausted_retries: false,
            max_concurrency: 4,
            max_context_tokens: 24_000,
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
        }
    }
}

impl PipelineConfig {
    /// Concorrência efetiva (nunca zero)
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(n) = parse_var::<usize, _>(&lookup, "RESEARCH_QUESTION_COUNT").filter(|n| *n > 0) {
            config.question_count = n;
        }
        if let Some(n) = parse_var::<usize, _>(&lookup, "RESEARCH_MAX_QUERY_LENGTH").filter(|n| *n > 0) {
            config.max_query_length = n;
        }
        if let Some(n) = parse_var::<usize, _>(&lookup, "RESEARCH_MAX_URLS").filter(|n| *n > 0) {
            config.max_urls_per_question = n;
        }
        if let Some(depth) = non_empty(&lookup, "RESEARCH_SEARCH_DEPTH") {
            config.search_depth = SearchDepth::from_env(&depth);
        }
        if let Some(n) = parse_var::<u32, _>(&lookup, "RESEARCH_MAX_SEARCH_ATTEMPTS").filter(|n| *n > 0) {
            config.max_search_attempts = n;
        }
        if let Some(scope) = non_empty(&lookup, "RESEARCH_RETRY_SCOPE") {
            config.retry_scope = RetryScope::from_env(&scope);
        }
        if let Some(proceed) = parse_var::<bool, _>(&lookup, "RESEARCH_PROCEED_ON_EXHAUSTION") {
            config.proceed_on_exhausted_retries = proceed;
        }
        if let Some(n) = parse_var::<usize, _>(&lookup, "RESEARCH_CONCURRENCY").filter(|n| *n > 0) {
            config.max_concurrency = n;
        }
        if let Some(n) = parse_var::<usize, _>(&lookup, "RESEARCH_MAX_CONTEXT_TOKENS").filter(|n| *n > 0) {
            config.max_context_tokens = n;
        }
        if let Some(path) = non_empty(&lookup, "REPORT_TEMPLATE_PATH") {
            config.template_path = PathBuf::from(path);
        }

        log::info!(
            "🔧 Pipeline: {} perguntas, {} URLs/pergunta, {} tentativas de busca (retry: {}), concorrência {}",
            config.question_count,
            config.max_urls_per_question,
            config.max_search_attempts,
            config.retry_scope,
            config.concurrency()
        );

        config
    }
}

/// Carrega a configuração do pipeline.
///
/// Variáveis suportadas (todas opcionais):
/// - `RESEARCH_QUESTION_COUNT` (5)
/// - `RESEARCH_MAX_QUERY_LENGTH` (400)
/// - `RESEARCH_MAX_URLS` (3)
/// - `RESEARCH_SEARCH_DEPTH` ("advanced" | "basic")
/// - `RESEARCH_MAX_SEARCH_ATTEMPTS` (3)
/// - `RESEARCH_RETRY_SCOPE` ("all" | "failed")
/// - `RESEARCH_PROCEED_ON_EXHAUSTION` (false)
/// - `RESEARCH_CONCURRENCY` (4)
/// - `RESEARCH_MAX_CONTEXT_TOKENS` (24000)
/// - `REPORT_TEMPLATE_PATH` ("report_template.md")
pub fn load_pipeline_config() -> PipelineConfig {
    PipelineConfig::from_lookup(env_lookup)
}
