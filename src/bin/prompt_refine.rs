//! prompt-refine: refine a request from the command line, streaming the result to stdout.
//!
//! Usage:
//!   prompt-refine [--config <file>] [--root <dir>] [--file <path>] <request...>

use anyhow::{bail, Context};
use prompt_refine::secrets::{ChainSecretStore, EnvSecretStore, KeyringSecretStore};
use prompt_refine::telemetry::TracingHistorySink;
use prompt_refine::{
    ErrorClassification, ErrorKind, HttpGenerativeService, RefineConfig, RefineObserver,
    RefineOutcome, RefinementPipeline, WorkspaceContextProvider,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<PathBuf>,
    root: PathBuf,
    file: Option<PathBuf>,
    request: String,
}

fn print_usage() {
    println!(
        r#"prompt-refine: turn a short request into an actionable prompt

USAGE:
    prompt-refine [OPTIONS] <request...>

OPTIONS:
    --config <file>     YAML configuration file
    --root <dir>        Project root used for context detection (default: current dir)
    --file <path>       Active file, relative to the root
    -h, --help          Show this help message
    -V, --version       Show version information

ENVIRONMENT:
    REFINE_API_KEY      Credential, used when the OS keychain has none
    REFINE_MODEL, REFINE_BASE_URL, REFINE_TIMEOUT_MS, ...   Configuration overrides
    RUST_LOG            Log filter (e.g. prompt_refine=debug)"#
    );
}

fn parse_args(raw: &[String]) -> anyhow::Result<Option<Args>> {
    let mut config = None;
    let mut root = None;
    let mut file = None;
    let mut words = Vec::new();

    let mut it = raw.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("prompt-refine {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            "--config" => config = Some(PathBuf::from(it.next().context("--config needs a path")?)),
            "--root" => root = Some(PathBuf::from(it.next().context("--root needs a directory")?)),
            "--file" => file = Some(PathBuf::from(it.next().context("--file needs a path")?)),
            other if other.starts_with("--") => bail!("unknown option: {other}"),
            other => words.push(other.to_string()),
        }
    }

    if words.is_empty() {
        print_usage();
        bail!("missing request text");
    }
    let root = match root {
        Some(r) => r,
        None => std::env::current_dir().context("cannot resolve current directory")?,
    };
    Ok(Some(Args {
        config,
        root,
        file,
        request: words.join(" "),
    }))
}

struct StdoutObserver;

impl RefineObserver for StdoutObserver {
    fn on_fragment(&self, fragment: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(fragment.as_bytes());
        let _ = out.flush();
    }

    fn on_warning(&self, warning: &str) {
        eprintln!("warning: {warning}");
    }

    fn on_retry(&self, attempt: u32, classification: &ErrorClassification, delay: Duration) {
        eprintln!(
            "retrying in {} ms (attempt {attempt} failed: {})",
            delay.as_millis(),
            classification.kind.name()
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let Some(args) = parse_args(&raw)? else {
        return Ok(());
    };

    let config = match &args.config {
        Some(path) => RefineConfig::from_path(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RefineConfig::default(),
    }
    .with_env_overrides()?;

    let mut context = WorkspaceContextProvider::new(&args.root).with_max_chars(config.active_file_max_chars);
    if let Some(file) = &args.file {
        context = context.with_active_file(file, None);
    }

    let secrets = ChainSecretStore::new()
        .add_store(Arc::new(KeyringSecretStore::default()))
        .add_store(Arc::new(EnvSecretStore::default()));

    let service = Arc::new(HttpGenerativeService::new(&config.base_url, &config.model_id));
    let pipeline = RefinementPipeline::builder(service)
        .config(config)
        .context_provider(Arc::new(context))
        .secret_store(Arc::new(secrets))
        .history_sink(Arc::new(TracingHistorySink::new("prompt_refine")))
        .build()?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match pipeline.refine(&args.request, Arc::new(StdoutObserver), &cancel).await {
        Ok(RefineOutcome::Completed(r)) => {
            println!();
            if r.from_cache {
                eprintln!("(served from cache)");
            }
            Ok(())
        }
        Ok(RefineOutcome::Cancelled) => {
            eprintln!("\ncancelled");
            std::process::exit(130);
        }
        Err(c) => {
            eprintln!("error {}: {}", c.kind.code(), c.message);
            eprintln!("{}", c.suggested_action);
            if c.kind == ErrorKind::Auth {
                eprintln!("Store a key with your OS keychain (service \"prompt-refine\", account \"api-key\") or set REFINE_API_KEY.");
            }
            std::process::exit(1);
        }
    }
}
