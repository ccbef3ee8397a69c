// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REPORT RENDERER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Preenche o template Handlebars do relatório com tópico, resumo, findings
// e fontes. O template é lido do disco a cada renderização.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use handlebars::Handlebars;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::types::{dedup_preserving_order, flatten_sources, Finding, RunState, Url};

const TEMPLATE_NAME: &str = "report";

/// Erros de renderização do relatório
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Report template not found at {path}: {source}")]
    TemplateNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid report template: {0}")]
    InvalidTemplate(#[source] Box<handlebars::TemplateError>),

    #[error("Report rendering failed: {0}")]
    Render(#[source] Box<handlebars::RenderError>),
}

/// Variáveis expostas ao template
#[derive(Debug, Serialize)]
pub struct ReportContext<'a> {
    pub topic: &'a str,
    pub summary: &'a str,
    pub findings: &'a [Finding],
    /// Todas as URLs, com duplicatas, pergunta por pergunta
    pub sources: Vec<Url>,
    pub unique_sources: Vec<Url>,
    pub generated_at: String,
    pub run_id: String,
}

impl<'a> ReportContext<'a> {
    pub fn from_state(state: &'a RunState) -> Self {
        let sources = flatten_sources(&state.search_results);
        let unique_sources = dedup_preserving_order(&sources);

        Self {
            topic: &state.topic,
            summary: &state.summary,
            findings: &state.findings,
            sources,
            unique_sources,
            generated_at: chrono::Utc::now().to_rfc3339(),
            run_id: state.run_id.to_string(),
        }
    }
}

enum TemplateSource {
    File(PathBuf),
    Inline(String),
}

pub struct ReportRenderer {
    source: TemplateSource,
}

impl ReportRenderer {
    /// Template lido de `path` no momento da renderização
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            source: TemplateSource::File(path.as_ref().to_path_buf()),
        }
    }

    pub fn from_template_str(template: impl Into<String>) -> Self {
        Self {
            source: TemplateSource::Inline(template.into()),
        }
    }

    fn load_template(&self) -> Result<String, ReportError> {
        match &self.source {
            TemplateSource::Inline(template) => Ok(template.clone()),
            TemplateSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| ReportError::TemplateNotFound {
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    pub fn render(&self, state: &RunState) -> Result<String, ReportError> {
        self.render_context(&ReportContext::from_state(state))
    }

    pub fn render_context(&self, context: &ReportContext<'_>) -> Result<String, ReportError> {
        let template = self.load_template()?;

        let mut handlebars = Handlebars::new();
        // Saída é markdown: nada de escapar HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.set_strict_mode(false);
        handlebars
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|e| ReportError::InvalidTemplate(Box::new(e)))?;

        handlebars
            .render(TEMPLATE_NAME, context)
            .map_err(|e| ReportError::Render(Box::new(e)))
    }
}
