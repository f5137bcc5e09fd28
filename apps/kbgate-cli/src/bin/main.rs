use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use kbgate_core::config::{Config, Settings};
use kbgate_embed::get_default_embedder;
use kbgate_engine::{synth, QueryEngine, AGENT_INSTRUCTIONS};
use kbgate_knowledge::KnowledgeBase;
use kbgate_vector::{IndexOptions, IndexOrigin, SemanticIndex};

const USAGE: &str = "Usage: kbgate <command> [args...]

Commands:
  ingest [--rebuild]     build the persisted index (or load it if present)
  ask <question> [--reply]
                         answer from the knowledge base; --reply prints the
                         refusal sentence instead of KB_NO_MATCH / KB_ERROR
  prompt                 print the knowledge block for a system prompt
  instructions           print agent rules followed by the knowledge block";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{}", USAGE); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn open_index(settings: &Settings, base: &Path, rebuild: bool) -> anyhow::Result<SemanticIndex> {
    let options = IndexOptions::from_settings(&settings.index, base);
    if rebuild && options.persist_dir.exists() {
        info!(dir = %options.persist_dir.display(), "removing existing index");
        std::fs::remove_dir_all(&options.persist_dir)?;
    }
    let embedder = get_default_embedder(&settings.embedding)?;
    SemanticIndex::open_or_build(&options, embedder).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {:#}", e); e })?;
    let settings = config.settings()?;
    let base: PathBuf = env::current_dir()?;
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "ingest" => {
            let rebuild = args.iter().any(|a| a == "--rebuild");
            let index = open_index(&settings, &base, rebuild).await?;
            let verb = match index.origin() { IndexOrigin::Built => "Built", IndexOrigin::Loaded => "Loaded" };
            println!("{} index with {} chunks", verb, index.row_count().await?);
        }
        "ask" => {
            let reply = args.iter().any(|a| a == "--reply");
            let question = args.iter().filter(|a| !a.starts_with("--")).cloned().collect::<Vec<_>>().join(" ");
            if question.trim().is_empty() { eprintln!("Usage: kbgate ask \"<question>\" [--reply]"); std::process::exit(1); }
            let index = Arc::new(open_index(&settings, &base, false).await?);
            let synthesizer = synth::from_settings(&settings.synthesis)?;
            let engine = QueryEngine::for_index(index, synthesizer, &settings.retrieval);
            let outcome = engine.query(&question).await;
            if reply { println!("{}", outcome.into_reply()); } else { println!("{}", outcome); }
        }
        "prompt" => {
            let kb = KnowledgeBase::from_settings(&settings.knowledge, &base);
            println!("{}", kb.format_for_prompt());
        }
        "instructions" => {
            let kb = KnowledgeBase::from_settings(&settings.knowledge, &base);
            println!("{}", kb.system_prompt(AGENT_INSTRUCTIONS));
        }
        "-h" | "--help" | "help" => println!("{}", USAGE),
        _ => { eprintln!("Unknown command: {}\n\n{}", cmd, USAGE); std::process::exit(1); }
    }
    Ok(())
}
