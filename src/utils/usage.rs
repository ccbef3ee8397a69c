// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// USAGE TRACKER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Contadores de chamadas externas de uma execução:
// - chamadas ao LLM e tokens consumidos
// - buscas e extrações de conteúdo
//
// Compartilhado entre tarefas concorrentes, por isso atômico.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tracker de uso
#[derive(Debug, Default)]
pub struct UsageTracker {
    llm_calls: AtomicU64,
    tokens: AtomicU64,
    searches: AtomicU64,
    extractions: AtomicU64,
    failed_extractions: AtomicU64,
}

/// Cópia imutável dos contadores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub llm_calls: u64,
    pub tokens_used: u64,
    pub searches: u64,
    pub extractions: u64,
    pub failed_extractions: u64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra uma chamada ao LLM
    pub fn track_llm(&self, tokens: u64) {
        self.llm_calls.fetch_add(1, Ordering::Relaxed);
        self.tokens.fetch_add(tokens, Ordering::Relaxed);
        log::debug!(
            "Token usage: +{} = {} total",
            tokens,
            self.tokens.load(Ordering::Relaxed)
        );
    }

    /// Registra uma busca
    pub fn track_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Registra uma extração de conteúdo
    pub fn track_extraction(&self, success: bool) {
        self.extractions.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_extractions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            tokens_used: self.tokens.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            extractions: self.extractions.load(Ordering::Relaxed),
            failed_extractions: self.failed_extractions.load(Ordering::Relaxed),
        }
    }
}
