// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PIPELINE DE PESQUISA
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Executor da máquina de estados:
//
// 1. PLAN: tópico → sub-perguntas
// 2. SEARCH: uma busca por sub-pergunta (com retry gate)
// 3. RETRIEVE: conteúdo das URLs, agrupado por pergunta
// 4. SYNTHESIZE: uma resposta por pergunta
// 5. SUMMARY: resumo executivo
// 6. REPORT: relatório a partir do template
//
// Cada estágio devolve um valor tipado; só o executor escreve no `RunState`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

mod planner;
mod report;
mod retriever;
mod searcher;
mod state;
mod summarizer;
mod synthesizer;

pub use planner::{parse_sub_questions, QuestionPlanner, PLANNER_SYSTEM_PROMPT};
pub use report::{ReportContext, ReportError, ReportRenderer};
pub use retriever::{source_header, ContentRetriever};
pub use searcher::{needs_condensing, QueryError, SearchStage};
pub use state::{next_stage, Guard, Stage, Transition, TRANSITIONS};
pub use summarizer::{join_answers, ExecutiveSummarizer};
pub use synthesizer::{synthesis_prompt, Synthesizer};

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{PipelineConfig, RetryScope};
use crate::llm::{LlmClient, LlmError};
use crate::search::SearchClient;
use crate::types::{needs_retry, RunState};
use crate::utils::{preview, ActionTimer, UsageTracker};

/// Aplica `f` a cada item com no máximo `concurrency` futuros em voo.
///
/// A saída segue a ordem de entrada, não a ordem de conclusão.
pub(crate) async fn fan_out<I, F, Fut>(items: I, concurrency: usize, f: F) -> Vec<Fut::Output>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future,
{
    stream::iter(items.into_iter().map(f))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Erros que encerram uma execução
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("Question planning failed: {0}")]
    Planning(#[source] LlmError),

    #[error("Search retries exhausted after {attempts} attempts; no results for: {empty_questions:?}")]
    SearchRetriesExhausted {
        attempts: u32,
        empty_questions: Vec<String>,
    },

    #[error("No sub-question could be answered ({failed} failed)")]
    NoFindings { failed: usize },

    #[error("Executive summary failed: {0}")]
    Summary(#[source] LlmError),

    #[error("Report rendering failed: {0}")]
    Report(#[from] ReportError),

    #[error("No transition out of stage {0}")]
    NoTransition(Stage),
}

/// Eventos de progresso emitidos durante a execução
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineProgress {
    StageStarted {
        stage: Stage,
    },
    StageFinished {
        stage: Stage,
        elapsed_ms: u128,
    },
    SearchRetry {
        attempt: u32,
        max_attempts: u32,
        empty_questions: Vec<String>,
    },
    Failed {
        reason: String,
    },
    Completed {
        run_id: uuid::Uuid,
    },
}

/// Executor do pipeline de pesquisa
pub struct ResearchPipeline {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn SearchClient>,
    config: PipelineConfig,
    renderer: ReportRenderer,
    progress_tx: Option<mpsc::UnboundedSender<PipelineProgress>>,
}

impl ResearchPipeline {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn SearchClient>,
        config: PipelineConfig,
    ) -> Self {
        let renderer = ReportRenderer::from_path(&config.template_path);
        Self {
            llm,
            search,
            config,
            renderer,
            progress_tx: None,
        }
    }

    /// Canal que recebe os eventos de progresso
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<PipelineProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Substitui o renderer (ex: template em memória)
    pub fn with_renderer(mut self, renderer: ReportRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn emit(&self, event: PipelineProgress) {
        if let Some(tx) = &self.progress_tx {
            // Receptor descartado não interrompe a execução
            let _ = tx.send(event);
        }
    }

    /// Executa o pipeline completo para `topic`.
    ///
    /// Retorna o `RunState` completo em END, ou o erro que levou a FAILED.
    pub async fn run(&self, topic: &str) -> Result<RunState, PipelineError> {
        let topic = topic.trim();
        if topic.is_empty() {
            self.emit(PipelineProgress::Failed {
                reason: PipelineError::EmptyTopic.to_string(),
            });
            return Err(PipelineError::EmptyTopic);
        }

        let mut state = RunState::new(topic);
        let usage = Arc::new(UsageTracker::new());

        log::info!("🚀 Pesquisa iniciada [{}]: {}", state.run_id, preview(topic, 80));
        let total_timer = ActionTimer::start("Pesquisa completa");

        match self.drive(&mut state, &usage).await {
            Ok(()) => {
                state.usage = usage.snapshot();
                total_timer.stop_and_log();
                log::info!(
                    "✅ Pesquisa concluída: {} findings, {} fontes únicas, {} chamadas LLM",
                    state.findings.len(),
                    state.unique_sources().len(),
                    state.usage.llm_calls
                );
                self.emit(PipelineProgress::Completed {
                    run_id: state.run_id,
                });
                Ok(state)
            }
            Err(e) => {
                log::error!("❌ Pesquisa falhou [{}]: {}", state.run_id, e);
                self.emit(PipelineProgress::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(&self, state: &mut RunState, usage: &Arc<UsageTracker>) -> Result<(), PipelineError> {
        let mut stage = Stage::Plan;

        loop {
            self.emit(PipelineProgress::StageStarted { stage });
            log::info!("▶️  Estágio {}", stage);
            let timer = ActionTimer::start(stage.name());

            self.execute(stage, state, usage).await?;

            let elapsed_ms = timer.stop_and_log();
            state.timings.record(stage.name(), elapsed_ms);
            state.usage = usage.snapshot();
            self.emit(PipelineProgress::StageFinished { stage, elapsed_ms });

            let next = next_stage(stage, state, &self.config)
                .ok_or(PipelineError::NoTransition(stage))?;

            match next {
                Stage::End => return Ok(()),
                Stage::Failed => return Err(self.failure_reason(stage, state)),
                Stage::Search if stage == Stage::Search => {
                    let empty_questions = state.empty_search_questions();
                    log::warn!(
                        "🔄 {} pergunta(s) sem resultados, nova busca ({}/{})",
                        empty_questions.len(),
                        state.search_attempts + 1,
                        self.config.max_search_attempts
                    );
                    self.emit(PipelineProgress::SearchRetry {
                        attempt: state.search_attempts + 1,
                        max_attempts: self.config.max_search_attempts,
                        empty_questions,
                    });
                }
                Stage::Retrieve if state.retry_search => {
                    log::warn!(
                        "⚠️ Tentativas de busca esgotadas, seguindo com {} pergunta(s) sem fontes",
                        state.empty_search_questions().len()
                    );
                }
                _ => {}
            }

            stage = next;
        }
    }

    /// Executa um estágio e grava sua saída no estado.
    async fn execute(
        &self,
        stage: Stage,
        state: &mut RunState,
        usage: &Arc<UsageTracker>,
    ) -> Result<(), PipelineError> {
        let concurrency = self.config.concurrency();

        match stage {
            Stage::Plan => {
                let planner = QuestionPlanner::new(
                    self.llm.clone(),
                    usage.clone(),
                    self.config.question_count,
                );
                state.sub_questions = planner
                    .plan(&state.topic)
                    .await
                    .map_err(PipelineError::Planning)?;
                log::info!("📋 {} sub-perguntas geradas", state.sub_questions.len());
                for (i, q) in state.sub_questions.iter().enumerate() {
                    log::debug!("   {}. {}", i + 1, q);
                }
            }
            Stage::Search => {
                let searcher =
                    SearchStage::new(self.llm.clone(), self.search.clone(), usage.clone(), &self.config);
                let groups = if state.search_attempts > 0
                    && self.config.retry_scope == RetryScope::FailedOnly
                {
                    searcher.rerun_failed(&state.search_results).await
                } else {
                    searcher.run(&state.sub_questions).await
                };
                state.retry_search = needs_retry(&groups);
                state.search_results = groups;
                state.search_attempts += 1;
                log::info!(
                    "🔍 Busca {}: {}/{} perguntas com resultados",
                    state.search_attempts,
                    state.search_results.iter().filter(|g| !g.is_empty()).count(),
                    state.search_results.len()
                );
            }
            Stage::Retrieve => {
                let retriever = ContentRetriever::new(self.search.clone(), usage.clone(), concurrency);
                state.retrieved = retriever.run(&state.search_results).await;
            }
            Stage::Synthesize => {
                let synthesizer = Synthesizer::new(
                    self.llm.clone(),
                    usage.clone(),
                    concurrency,
                    self.config.max_context_tokens,
                );
                state.findings = synthesizer.run(&state.retrieved).await;
                let failed = state.findings.iter().filter(|f| !f.is_answered()).count();
                if failed > 0 {
                    log::warn!(
                        "⚠️ {}/{} perguntas sem resposta",
                        failed,
                        state.findings.len()
                    );
                }
            }
            Stage::Summary => {
                let summarizer = ExecutiveSummarizer::new(self.llm.clone(), usage.clone());
                state.summary = summarizer
                    .summarize(&state.findings)
                    .await
                    .map_err(PipelineError::Summary)?;
            }
            Stage::Report => {
                state.usage = usage.snapshot();
                state.report = self.renderer.render(state)?;
                log::info!("📝 Relatório gerado ({} caracteres)", state.report.len());
            }
            Stage::End | Stage::Failed => {}
        }

        Ok(())
    }

    fn failure_reason(&self, stage: Stage, state: &RunState) -> PipelineError {
        match stage {
            Stage::Search => PipelineError::SearchRetriesExhausted {
                attempts: state.search_attempts,
                empty_questions: state.empty_search_questions(),
            },
            _ => PipelineError::NoFindings {
                failed: state.findings.len(),
            },
        }
    }
}
