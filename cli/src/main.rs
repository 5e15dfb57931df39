//! CLI entrypoint for toolscript
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use toolscript_application::{CompositeEvents, EngineConfig, ExecutionEventSink, ScriptExecutor};
use toolscript_domain::{ScriptValidator, StubGenerator};
use toolscript_infrastructure::{
    CatalogFile, ConfigLoader, FileConfig, FileOutputFormat, JsonlEventLogger, LuaRuntime,
};
use toolscript_presentation::{
    Cli, Command, ConsoleFormatter, OutputFormat, ProgressReporter, RunArgs,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Command::Run(args) => run(args, cli.config.as_deref()).await,
        Command::Validate { script } => validate(&script, cli.config.as_deref()),
        Command::Stubs {
            catalog,
            domain,
            signatures,
        } => stubs(&catalog, domain.as_deref(), signatures),
        Command::Config => {
            for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `RUST_LOG` wins over `-v`; `--log-file` sends logs to a file
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"), // -vvv or more
        },
    };

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("--log-file must name a file: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let config =
        ConfigLoader::load(explicit).map_err(|e| anyhow!("invalid configuration: {}", e))?;
    config.validate().context("invalid configuration")?;
    if !config.output.color {
        colored::control::set_override(false);
    }
    Ok(config)
}

/// Command-line limits override the configured ones
fn apply_overrides(mut engine: EngineConfig, args: &RunArgs) -> Result<EngineConfig> {
    if let Some(ms) = args.timeout_ms {
        if ms == 0 {
            bail!("--timeout-ms must be greater than 0");
        }
        engine.sandbox.wall_clock_timeout = Duration::from_millis(ms);
    }
    if let Some(max) = args.max_calls {
        engine.sandbox.max_tool_calls = max;
    }
    if let Some(dir) = &args.scratch {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create scratch directory {}", dir.display()))?;
        engine.sandbox.scratch_dir = Some(dir.clone());
    }
    Ok(engine)
}

async fn run(args: RunArgs, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let engine = apply_overrides(config.to_engine_config(), &args)?;

    let script = std::fs::read_to_string(&args.script)
        .with_context(|| format!("cannot read script {}", args.script.display()))?;
    let catalog = CatalogFile::load(&args.catalog)?;
    let toolset = catalog.to_toolset()?;
    for tool in toolset.unbound_tools() {
        warn!("No worker bound to {}; calls to it will fail", tool);
    }

    let mut events = CompositeEvents::new();
    if let Some(path) = &args.events {
        let logger = JsonlEventLogger::open(path)
            .with_context(|| format!("cannot open event log {}", path.display()))?;
        events = events.with_sink(Arc::new(logger));
    }
    if !args.quiet {
        events = events.with_sink(Arc::new(ProgressReporter::new()));
    }
    let events: Arc<dyn ExecutionEventSink> = Arc::new(events);

    let cancel = CancellationToken::new();
    let runtime = Arc::new(LuaRuntime::new());
    let executor = ScriptExecutor::with_events(runtime, toolset, engine, events)
        .with_cancellation(cancel.clone());

    info!(
        "Running {} against catalog '{}' ({} tools)",
        args.script.display(),
        catalog.name,
        catalog.tools.len()
    );
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling execution");
            cancel.cancel();
        }
    });
    let result = executor.execute(&script).await;
    ctrl_c.abort();

    let format = args.output.unwrap_or(match config.output.format {
        Some(FileOutputFormat::Json) => OutputFormat::Json,
        _ => OutputFormat::Text,
    });
    let output = match format {
        OutputFormat::Text => ConsoleFormatter::format(&result),
        OutputFormat::Json => ConsoleFormatter::format_json(&result),
    };
    println!("{}", output);

    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn validate(script: &Path, config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("cannot read script {}", script.display()))?;

    let max_bytes = config.to_engine_config().sandbox.max_script_bytes;
    let outcome = ScriptValidator::new(max_bytes).validate(&source);
    print!("{}", ConsoleFormatter::format_validation(&outcome));
    Ok(if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn stubs(catalog: &Path, domain: Option<&str>, signatures: bool) -> Result<ExitCode> {
    let catalog = CatalogFile::load(catalog)?.to_catalog()?;
    let bundle = StubGenerator::generate(&catalog);

    let domains: Vec<&str> = match domain {
        Some(domain) if bundle.module(domain).is_none() => {
            bail!("catalog '{}' has no domain '{}'", catalog.name(), domain)
        }
        Some(domain) => vec![domain],
        None => bundle.domains(),
    };

    for domain in domains {
        let text = if signatures {
            bundle.signatures(domain)
        } else {
            bundle.module(domain).map(|module| module.source.clone())
        };
        if let Some(text) = text {
            println!("{}", text);
        }
    }
    Ok(ExitCode::SUCCESS)
}
