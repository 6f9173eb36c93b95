use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use docqa_core::config::{Config, Settings};
use docqa_core::ingest::{ingest_directory, list_text_files, IngestReport};
use docqa_core::{ChatTurn, Chunker, GenerationError, GenerationRequest, MetadataFilter, Role, VectorIndex};
use docqa_embed::embedder_from_settings;
use docqa_generate::{Credentials, GenerationRouter, ModelConfig};
use docqa_retrieve::{CitationBinder, Retriever};
use docqa_vector::open_index;

#[derive(Parser)]
#[command(name = "docqa", about = "Ask questions about a local document corpus")]
struct Cli {
    /// Directory holding config.toml (defaults to the working directory).
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and index every .txt file under a directory.
    Ingest { dir: PathBuf },
    /// Clear the index, then ingest the directory again.
    Rebuild { dir: PathBuf },
    /// Raw similarity search.
    Search {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        section: Option<String>,
    },
    /// Answer one question.
    Ask {
        question: String,
        #[command(flatten)]
        opts: GenArgs,
    },
    /// Interactive session; history is kept for the session only.
    Chat {
        #[command(flatten)]
        opts: GenArgs,
    },
    /// Backend, entry count and indexed sources.
    Status,
}

#[derive(Args)]
struct GenArgs {
    #[arg(short, long, default_value = "Gemini")]
    provider: String,
    #[arg(short, long)]
    model: Option<String>,
    /// Number of passages in focused mode.
    #[arg(short = 'n', long)]
    n_results: Option<usize>,
    #[arg(long)]
    persona: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config_dir {
        Some(dir) => Config::load_from(dir),
        None => Config::load(),
    }
    .context("loading configuration")?;
    let settings = config.settings()?;

    let embedder = embedder_from_settings(&settings.embedding)?;
    let mut index = open_index(&settings.vector_store, embedder)?;

    match cli.command {
        Command::Ingest { dir } => ingest(&settings, index.as_mut(), &dir),
        Command::Rebuild { dir } => {
            index.clear()?;
            println!("🧹 Cleared {} index", index.backend());
            ingest(&settings, index.as_mut(), &dir)
        }
        Command::Search { query, k, source, page, section } => {
            let filter = match (source, page, section) {
                (Some(s), _, _) => Some(MetadataFilter::Source(s)),
                (None, Some(p), _) => Some(MetadataFilter::Page(p)),
                (None, None, Some(s)) => Some(MetadataFilter::Section(s)),
                (None, None, None) => None,
            };
            let result = index.search(&query, k.unwrap_or(settings.retrieval.n_results), filter.as_ref())?;
            println!("🔍 Found {} results for: \"{}\"", result.len(), query);
            for (i, hit) in result.hits.iter().enumerate() {
                let m = &hit.metadata;
                println!(
                    "\n  {}. score={:.4}  source={}  page={}  section={}  seq={}",
                    i + 1,
                    hit.score,
                    m.source,
                    m.page.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
                    m.section.as_deref().unwrap_or("-"),
                    m.sequence_id
                );
                println!("     {}", hit.text);
            }
            Ok(())
        }
        Command::Ask { question, opts } => {
            let session = Session::new(&settings, &*index, &opts)?;
            match session.answer(&question, &[]) {
                Ok(text) | Err(text) => println!("{text}"),
            }
            Ok(())
        }
        Command::Chat { opts } => chat(&settings, &*index, &opts),
        Command::Status => {
            let sources = index.sources()?;
            println!("Backend: {}", index.backend());
            println!("Entries: {}", index.count()?);
            println!("Sources: {}", sources.len());
            for s in &sources {
                println!("  - {s}");
            }
            Ok(())
        }
    }
}

fn ingest(settings: &Settings, index: &mut dyn VectorIndex, dir: &Path) -> Result<()> {
    let chunker = Chunker::from_settings(&settings.chunking)?;
    let total = list_text_files(dir).len();
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let report = ingest_directory(dir, &chunker, index, |outcome| {
        pb.set_message(outcome.source.clone());
        pb.inc(1);
    });
    pb.finish_with_message("done");
    print_report(&report);
    println!("📊 Index now holds {} chunks", index.count()?);
    Ok(())
}

fn print_report(report: &IngestReport) {
    for o in &report.outcomes {
        match &o.result {
            Ok(n) => println!("  ✅ {} ({n} chunks)", o.source),
            Err(e) => println!("  ❌ {}: {e}", o.source),
        }
    }
    println!(
        "Indexed {} of {} files, {} chunks added",
        report.succeeded().count(),
        report.outcomes.len(),
        report.total_chunks()
    );
}

/// Everything one question needs, resolved once per command.
struct Session<'a> {
    settings: &'a Settings,
    index: &'a dyn VectorIndex,
    retriever: Retriever,
    router: GenerationRouter,
    provider: String,
    credentials: Credentials,
    model: ModelConfig,
    n_results: usize,
    persona: Option<String>,
}

impl<'a> Session<'a> {
    fn new(settings: &'a Settings, index: &'a dyn VectorIndex, opts: &GenArgs) -> Result<Self> {
        let entry = docqa_generate::lookup(&opts.provider)?;
        let api_key = std::env::var(entry.env_key).unwrap_or_default();
        Ok(Self {
            settings,
            index,
            retriever: Retriever::from_settings(&settings.retrieval),
            router: GenerationRouter::from_settings(settings),
            provider: entry.name.to_string(),
            credentials: Credentials::new(api_key),
            model: ModelConfig { model: opts.model.clone(), base_url: None },
            n_results: opts.n_results.unwrap_or(settings.retrieval.n_results),
            persona: opts.persona.clone().or_else(|| settings.generation.persona_prompt.clone()),
        })
    }

    /// Retrieval, binding and generation. `Err` holds a printable apology.
    fn answer(&self, question: &str, history: &[ChatTurn]) -> Result<String, String> {
        self.try_answer(question, history).map_err(|e| match e.downcast_ref::<GenerationError>() {
            Some(g) => apology(g),
            None => format!("Desculpe, ocorreu um erro ao processar a pergunta: {e:#}"),
        })
    }

    fn try_answer(&self, question: &str, history: &[ChatTurn]) -> Result<String> {
        let sources: Vec<String> = self.index.sources()?.into_iter().collect();
        let retrieval = self.retriever.retrieve(self.index, question, &sources, self.n_results)?;
        tracing::info!(mode = ?retrieval.mode, hits = retrieval.result.len(), "retrieved context");
        let context = CitationBinder::new().bind(&retrieval.blocks, &retrieval.result.metadata())?;

        let mut request = GenerationRequest::new(context, question);
        request.history = history.to_vec();
        request.file_list = sources.into_iter().collect::<BTreeSet<_>>();
        request.generation_config = self.settings.generation.generation_config();
        request.system_prompt = self.settings.generation.system_prompt.clone();
        request.persona_prompt = self.persona.clone();
        Ok(self.router.generate(&self.provider, &self.credentials, &self.model, &request)?)
    }
}

fn apology(e: &GenerationError) -> String {
    format!("Desculpe, não foi possível gerar uma resposta com {}. Detalhes: {e}", e.provider())
}

fn chat(settings: &Settings, index: &dyn VectorIndex, opts: &GenArgs) -> Result<()> {
    let session = Session::new(settings, index, opts)?;
    let mut history: Vec<ChatTurn> = Vec::new();
    let stdin = io::stdin();
    println!("💬 {} ({} entries indexed). Empty line to quit.", session.provider, index.count()?);
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }
        let outcome = session.answer(question, &history);
        match &outcome {
            Ok(text) | Err(text) => println!("\n{text}\n"),
        }
        record_turn(&mut history, question, outcome);
    }
    Ok(())
}

/// Only answered questions enter the history.
fn record_turn(history: &mut Vec<ChatTurn>, question: &str, outcome: Result<String, String>) {
    if let Ok(answer) = outcome {
        history.push(ChatTurn::new(Role::User, question));
        history.push(ChatTurn::new(Role::Assistant, answer));
    }
}
