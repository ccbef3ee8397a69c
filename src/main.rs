// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RESEARCH PIPELINE CLI
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Executa o pipeline de pesquisa para um tópico e grava o relatório.
//
// Uso:
//   research-pipeline-cli "Quantum computing in logistics"
//   research-pipeline-cli --out relatorio.md "tópico"
//   research-pipeline-cli --template meu_template.md "tópico"
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use anyhow::Context;
use research_pipeline::prelude::*;
use research_pipeline::{create_tokio_runtime, load_runtime_config};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

const DEFAULT_REPORT_PATH: &str = "research_report.md";

/// Tenta carregar o arquivo .env de múltiplos locais possíveis
fn load_dotenv() {
    let possible_paths = [
        PathBuf::from(".env"),
        PathBuf::from("../.env"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".env"),
    ];

    for path in &possible_paths {
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => {
                    eprintln!(
                        "✓ Carregado .env de: {:?}",
                        path.canonicalize().unwrap_or(path.clone())
                    );
                    return;
                }
                Err(e) => {
                    eprintln!("⚠ Erro ao carregar {:?}: {}", path, e);
                }
            }
        }
    }

    eprintln!("⚠ Nenhum arquivo .env encontrado. Certifique-se de que GROQ_API_KEY e TAVILY_API_KEY estão definidas.");
}

struct CliArgs {
    topic: String,
    out: PathBuf,
    template: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Option<CliArgs> {
    let mut out = PathBuf::from(DEFAULT_REPORT_PATH);
    let mut template = None;
    let mut words = Vec::new();

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--out" => out = PathBuf::from(iter.next()?),
            "--template" => template = Some(PathBuf::from(iter.next()?)),
            _ => words.push(arg.as_str()),
        }
    }

    let topic = words.join(" ");
    if topic.trim().is_empty() {
        return None;
    }

    Some(CliArgs {
        topic,
        out,
        template,
    })
}

fn print_usage(program: &str) {
    eprintln!("Research Pipeline CLI v{}", research_pipeline::VERSION);
    eprintln!();
    eprintln!("Uso: {} [opções] <tópico>", program);
    eprintln!();
    eprintln!("Opções:");
    eprintln!("  --out <arquivo>       Caminho do relatório (padrão: {})", DEFAULT_REPORT_PATH);
    eprintln!("  --template <arquivo>  Template Handlebars do relatório");
    eprintln!();
    eprintln!("Exemplo:");
    eprintln!("  {} \"Quantum computing in logistics\"", program);
}

fn main() -> anyhow::Result<()> {
    // Carregar .env PRIMEIRO, antes de qualquer coisa
    load_dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("research-pipeline-cli");
    let Some(cli) = parse_args(&args) else {
        print_usage(program);
        std::process::exit(1);
    };

    let runtime = create_tokio_runtime(&load_runtime_config())
        .context("failed to build tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: CliArgs) -> anyhow::Result<()> {
    let llm_config = load_llm_config();
    let search_config = load_search_config();
    let mut pipeline_config = load_pipeline_config();
    if let Some(template) = cli.template {
        pipeline_config.template_path = template;
    }

    if llm_config.api_key.is_none() {
        log::warn!("⚠️ GROQ_API_KEY/LLM_API_KEY não definida; chamadas ao LLM vão falhar");
    }
    if search_config.api_key.is_none() {
        log::warn!("⚠️ TAVILY_API_KEY não definida; buscas vão falhar");
    }

    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiCompatClient::new(&llm_config));
    let search: Arc<dyn SearchClient> = Arc::new(TavilyClient::new(&search_config));

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(" RESEARCH PIPELINE v{}", research_pipeline::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("Tópico: {}", cli.topic);
    println!("Modelo: {}", llm_config.model);
    println!();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_progress(&event);
        }
    });

    let pipeline = ResearchPipeline::new(llm, search, pipeline_config).with_progress(tx);
    let result = pipeline.run(&cli.topic).await;
    // Fecha o canal para o printer terminar
    drop(pipeline);
    let _ = printer.await;

    let state = result.context("research failed")?;
    print_result(&state);

    std::fs::write(&cli.out, &state.report)
        .with_context(|| format!("failed to write report to {}", cli.out.display()))?;
    println!("📝 Relatório salvo em {}", cli.out.display());

    Ok(())
}

fn print_progress(event: &PipelineProgress) {
    match event {
        PipelineProgress::StageStarted { stage } => println!("▶️  {}...", stage),
        PipelineProgress::StageFinished { stage, elapsed_ms } => {
            println!("✓ {} ({}ms)", stage, elapsed_ms)
        }
        PipelineProgress::SearchRetry {
            attempt,
            max_attempts,
            empty_questions,
        } => println!(
            "🔄 Nova busca {}/{}: {} pergunta(s) sem resultados",
            attempt,
            max_attempts,
            empty_questions.len()
        ),
        PipelineProgress::Failed { reason } => println!("✗ {}", reason),
        PipelineProgress::Completed { run_id } => println!("✅ Concluído [{}]", run_id),
    }
}

fn print_result(state: &RunState) {
    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(" RESUMO");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("{}", state.summary);
    println!();

    println!("Findings:");
    for (i, finding) in state.findings.iter().enumerate() {
        match &finding.error {
            None => println!("  {}. {}", i + 1, finding.question),
            Some(e) => println!("  {}. {} [sem resposta: {}]", i + 1, finding.question, e),
        }
    }
    println!();

    let sources = state.unique_sources();
    println!("🔗 Fontes: {}", sources.len());
    for url in &sources {
        println!("    - {}", url);
    }
    println!();

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(" ESTATÍSTICAS");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("⏱️  Tempo total: {:.2}s", state.timings.total_ms() as f64 / 1000.0);
    for timing in state.timings.entries() {
        println!("    - {:<11} {}ms", timing.stage, timing.elapsed_ms);
    }
    println!();
    println!("🎫 Chamadas LLM: {} ({} tokens)", state.usage.llm_calls, state.usage.tokens_used);
    println!(
        "🔍 Buscas: {} | 📖 Extrações: {} ({} falharam)",
        state.usage.searches, state.usage.extractions, state.usage.failed_extractions
    );
    println!();
}
