// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MÁQUINA DE ESTADOS DO PIPELINE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Tabela explícita de transições `{from, guard} → to`. O executor só
// consulta `next_stage`; nenhuma regra de roteamento vive dentro dos estágios.
//
//   PLAN → SEARCH ⇄ (retry gate) → RETRIEVE → SYNTHESIZE → SUMMARY → REPORT → END
//                      ↘ FAILED                 ↘ FAILED
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::Serialize;
use std::fmt;

use crate::config::PipelineConfig;
use crate::types::RunState;

/// Estágios do pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Plan,
    Search,
    Retrieve,
    Synthesize,
    Summary,
    Report,
    End,
    Failed,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Plan => "PLAN",
            Stage::Search => "SEARCH",
            Stage::Retrieve => "RETRIEVE",
            Stage::Synthesize => "SYNTHESIZE",
            Stage::Summary => "SUMMARY",
            Stage::Report => "REPORT",
            Stage::End => "END",
            Stage::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::End | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Condições avaliadas sobre o estado após um estágio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    /// Algum grupo vazio e ainda há tentativas
    NeedsRetry,
    /// Algum grupo vazio, tentativas esgotadas, sem permissão para seguir
    ExhaustedAbort,
    /// Algum grupo vazio, tentativas esgotadas, seguindo com resultado parcial
    ExhaustedProceed,
    /// Todos os grupos têm URLs
    SearchComplete,
    /// Pelo menos um finding respondido
    HasAnswers,
    /// Nenhum finding respondido
    NoAnswers,
}

impl Guard {
    pub fn holds(&self, state: &RunState, config: &PipelineConfig) -> bool {
        let exhausted = state.search_attempts >= config.max_search_attempts;
        match self {
            Guard::Always => true,
            Guard::NeedsRetry => state.retry_search && !exhausted,
            Guard::ExhaustedAbort => {
                state.retry_search && exhausted && !config.proceed_on_exhausted_retries
            }
            Guard::ExhaustedProceed => {
                state.retry_search && exhausted && config.proceed_on_exhausted_retries
            }
            Guard::SearchComplete => !state.retry_search,
            Guard::HasAnswers => state.findings.iter().any(|f| f.is_answered()),
            Guard::NoAnswers => !state.findings.iter().any(|f| f.is_answered()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub from: Stage,
    pub guard: Guard,
    pub to: Stage,
}

const fn edge(from: Stage, guard: Guard, to: Stage) -> Transition {
    Transition { from, guard, to }
}

/// Avaliadas em ordem; a primeira guarda verdadeira vence.
pub const TRANSITIONS: &[Transition] = &[
    edge(Stage::Plan, Guard::Always, Stage::Search),
    edge(Stage::Search, Guard::NeedsRetry, Stage::Search),
    edge(Stage::Search, Guard::ExhaustedAbort, Stage::Failed),
    edge(Stage::Search, Guard::ExhaustedProceed, Stage::Retrieve),
    edge(Stage::Search, Guard::SearchComplete, Stage::Retrieve),
    edge(Stage::Retrieve, Guard::Always, Stage::Synthesize),
    edge(Stage::Synthesize, Guard::NoAnswers, Stage::Failed),
    edge(Stage::Synthesize, Guard::HasAnswers, Stage::Summary),
    edge(Stage::Summary, Guard::Always, Stage::Report),
    edge(Stage::Report, Guard::Always, Stage::End),
];

/// Próximo estágio a partir de `current`, ou `None` para estados terminais.
pub fn next_stage(current: Stage, state: &RunState, config: &PipelineConfig) -> Option<Stage> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == current)
        .find(|t| t.guard.holds(state, config))
        .map(|t| t.to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{needs_retry, Finding, SearchGroup};

    fn state_with(groups: Vec<SearchGroup>, attempts: u32) -> RunState {
        let mut state = RunState::new("topic");
        state.retry_search = needs_retry(&groups);
        state.search_results = groups;
        state.search_attempts = attempts;
        state
    }

    fn group(q: &str, urls: &[&str]) -> SearchGroup {
        SearchGroup {
            question: q.into(),
            urls: urls.iter().map(|u| u.to_string()).collect(),
        }
    }

    #[test]
    fn test_linear_edges() {
        let state = RunState::new("topic");
        let config = PipelineConfig::default();
        assert_eq!(next_stage(Stage::Plan, &state, &config), Some(Stage::Search));
        assert_eq!(
            next_stage(Stage::Retrieve, &state, &config),
            Some(Stage::Synthesize)
        );
        assert_eq!(next_stage(Stage::Summary, &state, &config), Some(Stage::Report));
        assert_eq!(next_stage(Stage::Report, &state, &config), Some(Stage::End));
    }

    #[test]
    fn test_terminal_stages_have_no_exit() {
        let state = RunState::new("topic");
        let config = PipelineConfig::default();
        assert_eq!(next_stage(Stage::End, &state, &config), None);
        assert_eq!(next_stage(Stage::Failed, &state, &config), None);
        assert!(Stage::End.is_terminal());
        assert!(!Stage::Search.is_terminal());
    }

    #[test]
    fn test_one_empty_group_routes_back_to_search() {
        let state = state_with(vec![group("q1", &[]), group("q2", &["a"])], 1);
        let config = PipelineConfig::default();
        assert_eq!(next_stage(Stage::Search, &state, &config), Some(Stage::Search));
    }

    #[test]
    fn test_complete_search_routes_to_retrieve() {
        let state = state_with(vec![group("q1", &["a"]), group("q2", &["b"])], 1);
        let config = PipelineConfig::default();
        assert_eq!(
            next_stage(Stage::Search, &state, &config),
            Some(Stage::Retrieve)
        );
    }

    #[test]
    fn test_exhausted_retries_fail_by_default() {
        let config = PipelineConfig::default();
        let state = state_with(
            vec![group("q1", &[])],
            config.max_search_attempts,
        );
        assert_eq!(next_stage(Stage::Search, &state, &config), Some(Stage::Failed));
    }

    #[test]
    fn test_exhausted_retries_can_proceed() {
        let config = PipelineConfig {
            proceed_on_exhausted_retries: true,
            ..PipelineConfig::default()
        };
        let state = state_with(
            vec![group("q1", &[]), group("q2", &["a"])],
            config.max_search_attempts,
        );
        assert_eq!(
            next_stage(Stage::Search, &state, &config),
            Some(Stage::Retrieve)
        );
    }

    #[test]
    fn test_synthesize_gate_on_answers() {
        let config = PipelineConfig::default();
        let mut state = RunState::new("topic");
        state.findings = vec![Finding::failed("q1", "x"), Finding::answered("q2", "a")];
        assert_eq!(
            next_stage(Stage::Synthesize, &state, &config),
            Some(Stage::Summary)
        );

        state.findings = vec![Finding::failed("q1", "x")];
        assert_eq!(
            next_stage(Stage::Synthesize, &state, &config),
            Some(Stage::Failed)
        );

        state.findings.clear();
        assert_eq!(
            next_stage(Stage::Synthesize, &state, &config),
            Some(Stage::Failed)
        );
    }

    #[test]
    fn test_every_non_terminal_stage_has_an_exit() {
        for stage in [
            Stage::Plan,
            Stage::Search,
            Stage::Retrieve,
            Stage::Synthesize,
            Stage::Summary,
            Stage::Report,
        ] {
            assert!(TRANSITIONS.iter().any(|t| t.from == stage), "{stage}");
        }
    }
}
