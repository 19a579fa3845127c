//! codegen-cli — 代码生成编排器的命令行入口
//!
//! Usage:
//!   codegen-cli generate <prompt> [--model <name>] [--config <file>] [--out <dir>]
//!   codegen-cli stream <prompt> [--model <name>] [--config <file>]
//!   codegen-cli health [--config <file>]
//!   codegen-cli route <model>

use std::path::PathBuf;

use anyhow::{bail, Context};
use futures::StreamExt;

use ai_codegen::audit::sanitize;
use ai_codegen::registry::ModelRouter;
use ai_codegen::{encode_event, GenerationRequest, Orchestrator, OrchestratorConfig, StreamEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "generate" => cmd_generate(&args[2..]).await,
        "stream" => cmd_stream(&args[2..]).await,
        "health" => cmd_health(&args[2..]).await,
        "route" => cmd_route(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("codegen-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"codegen-cli — 代码生成编排器

USAGE:
    codegen-cli <COMMAND> [OPTIONS]

COMMANDS:
    generate <prompt>     Generate files (cached, with provider fallback)
    stream <prompt>       Stream file events from the routed provider
    health                Show provider availability and counters
    route <model>         Show which provider a model name routes to
    version               Show version information
    help                  Show this help message

OPTIONS:
    --model <name>        Model hint, e.g. gpt-4o, claude-3-5-sonnet-latest, ollama/llama3.1
    --config <file>       YAML configuration instead of the environment
    --out <dir>           Write generated files below this directory (generate only)

ENVIRONMENT:
    GEMINI_API_KEY[_N], GROQ_API_KEY[_N], OPENAI_API_KEY[_N], ANTHROPIC_API_KEY[_N]
    OLLAMA_BASE_URL, OLLAMA_MODEL, CODEGEN_AUDIT_CMD, RUST_LOG"#
    );
}

/// Value following `--name`, if present.
fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if arg.starts_with("--") {
            skip = true;
            continue;
        }
        return Some(arg);
    }
    None
}

fn load_config(args: &[String]) -> anyhow::Result<OrchestratorConfig> {
    match flag(args, "--config") {
        Some(path) => OrchestratorConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {path}")),
        None => OrchestratorConfig::from_env().context("reading configuration from environment"),
    }
}

fn request(args: &[String]) -> anyhow::Result<GenerationRequest> {
    let Some(prompt) = positional(args) else {
        bail!("missing <prompt>");
    };
    let mut request = GenerationRequest::new(prompt);
    if let Some(model) = flag(args, "--model") {
        request = request.with_model(model);
    }
    Ok(request)
}

async fn cmd_generate(args: &[String]) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(&load_config(args)?)?;
    let result = orchestrator.generate_code(&request(args)?).await;

    if let Some(out) = flag(args, "--out") {
        let root = PathBuf::from(out);
        for file in &result.files {
            let Some(rel) = sanitize(&file.path) else {
                eprintln!("skipping unsafe path {}", file.path);
                continue;
            };
            let target = root.join(rel);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, &file.content)
                .with_context(|| format!("writing {}", target.display()))?;
            eprintln!("wrote {}", target.display());
        }
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(2);
    }
    Ok(())
}

async fn cmd_stream(args: &[String]) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(&load_config(args)?)?;
    let mut events = orchestrator.generate_files(request(args)?);
    let mut failed = false;
    while let Some(event) = events.next().await {
        failed |= matches!(event, StreamEvent::Error { .. });
        print!("{}", encode_event(&event));
    }
    if failed {
        std::process::exit(2);
    }
    Ok(())
}

async fn cmd_health(args: &[String]) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(&load_config(args)?)?;
    let report = orchestrator.health().await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_route(args: &[String]) -> anyhow::Result<()> {
    let Some(model) = positional(args) else {
        bail!("missing <model>");
    };
    let config = load_config(args)?;
    let route = ModelRouter::new(config.default_stream_provider).route(Some(model));
    println!("{}", serde_json::to_string_pretty(&route)?);
    Ok(())
}
