// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TIMING UTILITIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Medição de tempo dos estágios do pipeline.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::Serialize;
use std::time::{Duration, Instant};

/// Timer para medir duração de operações
pub struct ActionTimer {
    start: Instant,
    action_name: String,
}

impl ActionTimer {
    /// Inicia um novo timer para uma ação
    pub fn start(action_name: &str) -> Self {
        Self {
            start: Instant::now(),
            action_name: action_name.to_string(),
        }
    }

    /// Retorna o tempo decorrido em milissegundos
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    /// Retorna o tempo decorrido como Duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Para o timer e loga o tempo decorrido
    pub fn stop_and_log(self) -> u128 {
        let elapsed = self.elapsed_ms();
        log::info!("⏱️  {} completado em {}ms", self.action_name, elapsed);
        elapsed
    }

    /// Para o timer e retorna o tempo sem logar
    pub fn stop(self) -> u128 {
        self.elapsed_ms()
    }
}

/// Duração de uma execução de estágio
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed_ms: u128,
}

/// Durações na ordem em que os estágios executaram.
///
/// Um estágio que roda mais de uma vez (SEARCH em retry) aparece uma vez
/// por execução.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    entries: Vec<StageTiming>,
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra uma execução
    pub fn record(&mut self, stage: &str, elapsed_ms: u128) {
        self.entries.push(StageTiming {
            stage: stage.to_string(),
            elapsed_ms,
        });
    }

    pub fn entries(&self) -> &[StageTiming] {
        &self.entries
    }

    /// Quantas vezes um estágio executou
    pub fn runs_of(&self, stage: &str) -> usize {
        self.entries.iter().filter(|e| e.stage == stage).count()
    }

    /// Tempo total somado de todos os estágios
    pub fn total_ms(&self) -> u128 {
        self.entries.iter().map(|e| e.elapsed_ms).sum()
    }

    /// Formata um resumo das durações
    pub fn summary(&self) -> String {
        let mut out = String::from("Timing Stats:\n");
        for entry in &self.entries {
            out.push_str(&format!("- {}: {}ms\n", entry.stage, entry.elapsed_ms));
        }
        out.push_str(&format!("- Total: {}ms", self.total_ms()));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_action_timer() {
        let timer = ActionTimer::start("test");
        sleep(Duration::from_millis(10));
        let elapsed = timer.stop();
        assert!(elapsed >= 10);
    }

    #[test]
    fn test_stage_timings() {
        let mut timings = StageTimings::new();
        timings.record("PLAN", 100);
        timings.record("SEARCH", 200);
        timings.record("SEARCH", 50);

        assert_eq!(timings.runs_of("SEARCH"), 2);
        assert_eq!(timings.runs_of("REPORT"), 0);
        assert_eq!(timings.total_ms(), 350);
        assert!(timings.summary().contains("Total: 350ms"));
    }
}
