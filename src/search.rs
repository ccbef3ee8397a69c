// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLIENTE DE BUSCA
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Trait e implementações para busca web e extração de conteúdo de URLs.
// Provedor real: Tavily (search + extract).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::config::SearchConfig;
use crate::types::Url;

/// Erros do cliente de busca
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search client not configured: missing {0}")]
    NotConfigured(String),

    #[error("Search API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response format: {0}")]
    ParseError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No content extracted from {0}")]
    NoContent(String),
}

/// Profundidade da busca
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchDepth {
    Basic,
    #[default]
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }

    /// "basic" → Basic; qualquer outro valor → Advanced
    pub fn from_env(value: &str) -> Self {
        match value.to_lowercase().trim() {
            "basic" => Self::Basic,
            _ => Self::Advanced,
        }
    }
}

/// Opções de uma busca
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub depth: SearchDepth,
    pub max_results: usize,
    pub include_answer: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            depth: SearchDepth::Advanced,
            max_results: 5,
            include_answer: true,
        }
    }
}

/// Um resultado de busca, em ordem de ranking
#[derive(Debug, Clone, Default)]
pub struct SearchHit {
    pub url: Url,
    pub title: String,
    pub content: String,
    pub score: f32,
}

impl SearchHit {
    pub fn from_url(url: impl Into<Url>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Conteúdo extraído de uma URL
#[derive(Debug, Clone)]
pub struct UrlContent {
    pub url: Url,
    pub text: String,
    pub word_count: usize,
}

impl UrlContent {
    pub fn new(url: impl Into<Url>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            url: url.into(),
            word_count: text.split_whitespace().count(),
            text,
        }
    }
}

/// Trait principal para clientes de busca
///
/// Define a interface para busca web e leitura de conteúdo.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Executa uma busca e devolve os resultados ranqueados
    async fn search(&self, query: &str, options: &SearchOptions)
        -> Result<Vec<SearchHit>, SearchError>;

    /// Extrai o texto principal de uma URL
    async fn extract(&self, url: &str) -> Result<UrlContent, SearchError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IMPLEMENTAÇÃO SCRIPTED PARA TESTES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type SearchFn = dyn Fn(&str) -> Result<Vec<Url>, SearchError> + Send + Sync;
type ExtractFn = dyn Fn(&str) -> Result<String, SearchError> + Send + Sync;

/// Cliente que responde através de closures e registra queries e URLs.
pub struct ScriptedSearchClient {
    search_fn: Box<SearchFn>,
    extract_fn: Box<ExtractFn>,
    queries: Mutex<Vec<String>>,
    extracted: Mutex<Vec<String>>,
}

impl ScriptedSearchClient {
    /// `search_fn` recebe a query e devolve as URLs ranqueadas.
    /// A extração padrão devolve `"Content of {url}"`.
    pub fn new<F>(search_fn: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<Url>, SearchError> + Send + Sync + 'static,
    {
        Self {
            search_fn: Box::new(search_fn),
            extract_fn: Box::new(|url| Ok(format!("Content of {}", url))),
            queries: Mutex::new(Vec::new()),
            extracted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_extractor<F>(mut self, extract_fn: F) -> Self
    where
        F: Fn(&str) -> Result<String, SearchError> + Send + Sync + 'static,
    {
        self.extract_fn = Box::new(extract_fn);
        self
    }

    /// Queries recebidas, na ordem de chegada
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// URLs pedidas para extração, na ordem de chegada
    pub fn extracted_urls(&self) -> Vec<String> {
        self.extracted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearchClient {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.to_string());

        let urls = (self.search_fn)(query)?;
        Ok(urls
            .into_iter()
            .take(options.max_results)
            .map(SearchHit::from_url)
            .collect())
    }

    async fn extract(&self, url: &str) -> Result<UrlContent, SearchError> {
        self.extracted
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());

        let text = (self.extract_fn)(url)?;
        Ok(UrlContent::new(url, text))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IMPLEMENTAÇÃO TAVILY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Serialize)]
struct TavilySearchRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilySearchResponse {
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
    content: Option<String>,
    score: Option<f32>,
}

#[derive(Serialize)]
struct TavilyExtractRequest<'a> {
    urls: Vec<&'a str>,
}

#[derive(Deserialize)]
struct TavilyExtractResponse {
    #[serde(default)]
    results: Vec<TavilyExtractResult>,
}

#[derive(Deserialize)]
struct TavilyExtractResult {
    url: String,
    raw_content: Option<String>,
}

/// Cliente para a API Tavily
pub struct TavilyClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl TavilyClient {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    fn api_key(&self) -> Result<&str, SearchError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| SearchError::NotConfigured("TAVILY_API_KEY".into()))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, SearchError> {
        let api_key = self.api_key()?;

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| SearchError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl SearchClient for TavilyClient {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let request = TavilySearchRequest {
            query,
            search_depth: options.depth.as_str(),
            include_answer: options.include_answer,
            max_results: options.max_results,
        };

        let parsed: TavilySearchResponse = self
            .post("search", &request)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchHit {
                url: r.url,
                title: r.title.unwrap_or_default(),
                content: r.content.unwrap_or_default(),
                score: r.score.unwrap_or_default(),
            })
            .collect())
    }

    async fn extract(&self, url: &str) -> Result<UrlContent, SearchError> {
        url::Url::parse(url).map_err(|_| SearchError::InvalidUrl(url.to_string()))?;

        let parsed: TavilyExtractResponse = self
            .post("extract", &TavilyExtractRequest { urls: vec![url] })
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        parsed
            .results
            .into_iter()
            .find_map(|r| r.raw_content.map(|text| UrlContent::new(r.url, text)))
            .ok_or_else(|| SearchError::NoContent(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_depth() {
        assert_eq!(SearchDepth::default(), SearchDepth::Advanced);
        assert_eq!(SearchDepth::Advanced.as_str(), "advanced");
        assert_eq!(SearchDepth::from_env("BASIC"), SearchDepth::Basic);
        assert_eq!(SearchDepth::from_env("anything"), SearchDepth::Advanced);
    }

    #[test]
    fn test_url_content_word_count() {
        let content = UrlContent::new("https://a", "one two  three");
        assert_eq!(content.word_count, 3);
    }

    #[test]
    fn test_search_response_parsing() {
        let raw = r#"{"query":"q","answer":"x","results":[
            {"url":"https://a.com","title":"A","content":"c","score":0.9},
            {"url":"https://b.com"}
        ]}"#;
        let parsed: TavilySearchResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[1].url, "https://b.com");
        assert!(parsed.results[1].title.is_none());
    }

    #[test]
    fn test_extract_response_parsing() {
        let raw = r#"{"results":[{"url":"https://a.com","raw_content":"body"}],"failed_results":[]}"#;
        let parsed: TavilyExtractResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results[0].raw_content.as_deref(), Some("body"));
    }

    #[tokio::test]
    async fn test_scripted_search_limits_results() {
        let client = ScriptedSearchClient::new(|_| {
            Ok(vec!["https://1".into(), "https://2".into(), "https://3".into()])
        });
        let options = SearchOptions {
            max_results: 2,
            ..Default::default()
        };

        let hits = client.search("q", &options).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(client.queries(), vec!["q"]);
    }

    #[tokio::test]
    async fn test_tavily_missing_key() {
        let config = SearchConfig {
            api_key: None,
            ..SearchConfig::default()
        };
        let client = TavilyClient::new(&config);
        let err = client
            .search("q", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_tavily_rejects_invalid_url() {
        let config = SearchConfig {
            api_key: Some("k".into()),
            ..SearchConfig::default()
        };
        let client = TavilyClient::new(&config);
        let err = client.extract("not a url").await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidUrl(_)));
    }
}
