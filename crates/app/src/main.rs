use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rulebook_rag_core::embeddings::embedder_from_config;
use rulebook_rag_core::ingest::preview;
use rulebook_rag_core::{
    chunk_stage, extract_stage, index_stage, Answer, AppConfig, AssistantOptions, FlatIndex,
    GoogleTranslator, LogLevel, LopdfExtractor, OllamaModel, QaAssistant, QueryError,
    RulebookPaths, TextPipeline,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SOURCE_PREVIEW_CHARS: usize = 300;

#[derive(Parser)]
#[command(name = "rulebook-rag", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Main configuration file [default: config/cfg.yaml]
    #[arg(long = "cfg", global = true)]
    config: Option<PathBuf>,

    /// Machine configuration file holding directory settings
    /// [default: config/<HOSTNAME>_cfg.yaml]
    #[arg(long = "dir-cfg", global = true)]
    machine_config: Option<PathBuf>,

    /// Log file, relative to the configured output directory
    #[arg(long = "lf", global = true)]
    log_file: Option<PathBuf>,

    /// Log level: CRITICAL, ERROR, WARNING, INFO or DEBUG
    #[arg(long = "ll", global = true)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract the rulebook PDF into raw and cleaned text files.
    Extract,
    /// Split the cleaned text into overlapping chunks.
    Chunk,
    /// Embed the chunks and save the vector index.
    Index,
    /// Run extract, chunk and index in sequence.
    Prepare,
    /// Answer questions about the rules.
    Ask {
        /// Ask a single question instead of starting the interactive loop.
        #[arg(long)]
        question: Option<String>,
    },
    /// Ask the Ollama server to download the configured language model.
    Pull,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref(), cli.machine_config.as_deref())
        .context("failed to load configuration")?;
    init_logging(&cli, &config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "rulebook-rag boot"
    );

    config.validate()?;
    let paths = RulebookPaths::from_config(&config)?;

    match cli.command {
        Command::Extract => run_extract(&config, &paths)?,
        Command::Chunk => run_chunk(&config, &paths)?,
        Command::Index => run_index(&config, &paths).await?,
        Command::Prepare => {
            run_extract(&config, &paths)?;
            run_chunk(&config, &paths)?;
            run_index(&config, &paths).await?;
        }
        Command::Ask { question } => run_ask(&config, &paths, question).await?,
        Command::Pull => {
            let model = OllamaModel::new(
                config.ollama_url.clone(),
                config.llm_model()?,
                config.llm_temperature,
            );
            let status = model.pull().await?;
            println!("{}: {status}", model.model());
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    let env_level = std::env::var("LOGLEVEL").ok();
    let (level, source) = config.resolve_log_level(cli.log_level, env_level.as_deref());

    let filter = EnvFilter::builder()
        .with_default_directive(level.as_level_filter().into())
        .parse_lossy("hyper=info,reqwest=info");

    let file_layer = match &cli.log_file {
        Some(name) => {
            let path = config.log_file_path(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
            let file = File::create(&path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    info!(%level, ?source, "log level selected");
    Ok(())
}

fn run_extract(config: &AppConfig, paths: &RulebookPaths) -> anyhow::Result<()> {
    let pipeline = TextPipeline::from_config(config)?;
    let report = extract_stage(paths, &LopdfExtractor, &pipeline)?;

    println!(
        "{} pages extracted, {} headings, {} characters",
        report.pages, report.headings, report.document_chars
    );
    println!("raw text:   {}", report.raw_text.display());
    println!("clean text: {}", report.clean_text.display());
    Ok(())
}

fn run_chunk(config: &AppConfig, paths: &RulebookPaths) -> anyhow::Result<()> {
    let collection = chunk_stage(paths, config.chunking_config())?;
    println!(
        "{} chunks saved to {}",
        collection.chunks.len(),
        paths.chunks.display()
    );
    Ok(())
}

async fn run_index(config: &AppConfig, paths: &RulebookPaths) -> anyhow::Result<()> {
    let embedder = embedder_from_config(config)?;
    let report = index_stage(paths, embedder.as_ref()).await?;
    println!(
        "{} chunks indexed ({} dimensions) into {}",
        report.chunks,
        report.dimensions,
        report.index.display()
    );
    Ok(())
}

async fn run_ask(
    config: &AppConfig,
    paths: &RulebookPaths,
    question: Option<String>,
) -> anyhow::Result<()> {
    let index = FlatIndex::load(&paths.index)
        .context("no vector index, run `rulebook-rag prepare` first")?;
    let options = AssistantOptions {
        top_k: config.retrieval_top_k,
        user_locale: config.translation.user_locale.clone(),
        model_locale: config.translation.model_locale.clone(),
        translate: config.translation.enabled,
    };
    let assistant = QaAssistant::new(
        embedder_from_config(config)?,
        index,
        OllamaModel::new(
            config.ollama_url.clone(),
            config.llm_model()?,
            config.llm_temperature,
        ),
        GoogleTranslator::default(),
        options,
    );

    if let Some(question) = question {
        let answer = assistant.ask(&question).await?;
        print_answer(&answer, &config.translation.user_locale);
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nQuestion (quitter pour sortir) : ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("quitter") || question.eq_ignore_ascii_case("exit") {
            break;
        }

        match assistant.ask(question).await {
            Ok(answer) => print_answer(&answer, &config.translation.user_locale),
            Err(QueryError::Translation(reason)) => {
                warn!(%reason, "question could not be translated, skipping it");
            }
            Err(error) => error!(%error, "question failed"),
        }
    }

    Ok(())
}

fn print_answer(answer: &Answer, user_locale: &str) {
    println!("\nAnswer (en):\n{}", answer.answer_en);
    match &answer.answer_local {
        Some(local) => println!("\nAnswer ({user_locale}):\n{local}"),
        None => println!("\nTraduction impossible."),
    }

    println!("\nSources:");
    for (position, hit) in answer.sources.iter().enumerate() {
        let section = hit.chunk.metadata.section.as_deref().unwrap_or("-");
        println!(
            "[{}] score={:.4} chunk={} section={}",
            position + 1,
            hit.score,
            hit.chunk.metadata.chunk_index,
            section
        );
        println!("{}", preview(hit.chunk.text.trim(), SOURCE_PREVIEW_CHARS));
    }
}
