mod cli;
mod config;

use std::fs;
use std::io::{self, Read};

use anyhow::{anyhow, bail, Context as _, Result};
use config::Config;
use execjs::{DeliveryMode, Error, ExternalRuntime, Registry};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct RuntimeInfo<'a> {
    name: &'a str,
    available: bool,
    mode: execjs::DeliveryMode,
    path: Option<&'a str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let cfg = Config::load();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_filter())),
        )
        .with_writer(io::stderr)
        .init();
    tracing::debug!(path = %cfg.config_path.display(), "loaded config");

    let registry = execjs::registry::global();

    if args.list {
        return list_runtimes(registry, args.json);
    }

    // Resolve runtime: CLI overrides config; fall back to first installed
    let runtime = match args.runtime.clone().or_else(|| cfg.runtime()) {
        Some(name) => registry.get(&name)?,
        None => registry.auto()?,
    };
    tracing::debug!(runtime = %runtime.name(), "selected runtime");

    // Header: --file scripts, in order
    let mut header = String::new();
    for path in &args.files {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading script: {}", path.display()))?;
        if !header.is_empty() {
            header.push('\n');
        }
        header.push_str(&text);
    }

    // stdin handling
    let mut source = args.source.clone().unwrap_or_default();
    if args.source.is_none() && !io::stdin().is_terminal() {
        io::stdin().read_to_string(&mut source)?;
    }
    if source.trim().is_empty() && args.call.is_none() && header.is_empty() {
        bail!("Provide JavaScript as an argument or via stdin");
    }

    let use_session = wants_session(&runtime, args.session || cfg.get_bool("EXECJS_SESSION"));
    if use_session {
        runtime.session().await?;
    }

    let result = evaluate(&runtime, &args, &header, &source, &cfg).await;

    if use_session {
        runtime.close_session().await;
    }

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(EvalFailure::Program(value)) => {
            let message = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            eprintln!("{}", message.red());
            std::process::exit(1);
        }
        Err(EvalFailure::Other(e)) => Err(e),
    }
}

/// Temp-file engines never read from a session, so none is spawned for them.
fn wants_session(runtime: &ExternalRuntime, requested: bool) -> bool {
    requested && runtime.descriptor().mode != DeliveryMode::TempFile
}

enum EvalFailure {
    Program(serde_json::Value),
    Other(anyhow::Error),
}

impl From<Error> for EvalFailure {
    fn from(e: Error) -> Self {
        match e {
            Error::ProgramError(value) => EvalFailure::Program(value),
            other => EvalFailure::Other(other.into()),
        }
    }
}

async fn evaluate(
    runtime: &ExternalRuntime,
    args: &cli::Cli,
    header: &str,
    source: &str,
    cfg: &Config,
) -> std::result::Result<serde_json::Value, EvalFailure> {
    let mut ctx = if args.call.is_some() && !source.trim().is_empty() {
        // SOURCE defines the callee alongside any --file scripts
        let full = if header.is_empty() {
            source.to_string()
        } else {
            format!("{}\n{}", header, source)
        };
        runtime.compile(&full)?
    } else {
        runtime.compile(header)?
    };
    if let Some(dir) = &args.cwd {
        ctx = ctx.current_dir(dir);
    }

    let call_args: Vec<serde_json::Value> = match &args.args {
        Some(json) => serde_json::from_str(json)
            .map_err(|e| EvalFailure::Other(anyhow!("--args must be a JSON array: {}", e)))?,
        None => Vec::new(),
    };

    let fut = async {
        match &args.call {
            Some(ident) => ctx.call(ident, &call_args).await,
            None if args.eval => ctx.eval(source).await,
            None => ctx.exec(source).await,
        }
    };

    let value = match args.timeout.map(std::time::Duration::from_secs).or_else(|| cfg.timeout()) {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            EvalFailure::Other(anyhow!("evaluation timed out after {}s", limit.as_secs()))
        })??,
        None => fut.await?,
    };
    Ok(value)
}

fn list_runtimes(registry: &Registry, json: bool) -> Result<()> {
    let runtimes = registry.all();
    if json {
        let infos: Vec<RuntimeInfo> = runtimes
            .iter()
            .map(|r| RuntimeInfo {
                name: r.name(),
                available: r.is_available(),
                mode: r.descriptor().mode,
                path: r.binary().and_then(|argv| argv.first()).map(String::as_str),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    for runtime in runtimes {
        match runtime.binary().and_then(|argv| argv.first()) {
            Some(path) => println!("{} {} ({})", "✓".green(), runtime.name(), path),
            None => println!("{} {}", "✗".red(), runtime.name().dimmed()),
        }
    }
    Ok(())
}
