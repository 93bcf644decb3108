//! deploytrace: pin down which commit a live website is running.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use deploytrace::config;
use deploytrace::constants;
use deploytrace::env;
use deploytrace::filter;
use deploytrace::logging;
use deploytrace::models;
use deploytrace::pipeline;
use deploytrace::probe;
use deploytrace::progress;
use deploytrace::repo;

use std::io::IsTerminal;
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use cli::args::{CandidatesArgs, Cli, Command, EstimateArgs, MirrorAction, OutputFormat};
use config::Config;
use env::Env;
use models::CandidatePathSet;
use pipeline::{Engine, EngineError};
use probe::HttpFetcher;
use progress::TerminalProgress;
use repo::mirror::{MirrorStore, parse_slug};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let env = Env::real();
    logging::init(cli.verbose, &env);

    match cli.command {
        Command::Estimate(args) => run_estimate(*args, &env).await,
        Command::Candidates(args) => run_candidates(args, &env).await,
        Command::Mirror { action } => run_mirror(action, &env),
        Command::Version => run_version(),
    }
}

fn load_config(env: &Env) -> Result<Config> {
    Config::load(Some(Path::new(".")), env).context("failed to load configuration")
}

/// A token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  {} interrupted, stopping...", "✖".red().bold());
            trigger.cancel();
        }
    });
    token
}

/// Print the owner / repo / size banner for remote repositories.
async fn show_banner(uri: &str, user_agent: &str) {
    let Some(slug) = parse_slug(uri) else {
        return;
    };
    let size = if slug.is_github() {
        repo::github::repo_size(&slug.owner, &slug.name, user_agent).await
    } else {
        None
    };
    cli::print_banner(&slug, size);
}

/// Estimate the deployed commit range of a live host.
async fn run_estimate(args: EstimateArgs, env: &Env) -> Result<()> {
    let mut config = load_config(env)?;
    args.apply_to(&mut config);

    let interactive = args.format == OutputFormat::Terminal;
    if interactive {
        show_banner(&args.git, &config.probe.user_agent).await;
    }
    let show_progress = interactive && !args.no_progress && std::io::stderr().is_terminal();
    let progress = Arc::new(TerminalProgress::new(show_progress));
    let cancel = cancel_on_ctrl_c();

    let result = match args.enumeration_file {
        Some(ref path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let candidates: CandidatePathSet = filter::parse_path_list(&text).into_iter().collect();
            tracing::info!(
                paths = candidates.len(),
                file = %path.display(),
                "loaded enumeration file"
            );

            let host = probe::parse_host(&args.url)?;
            let fetcher = Arc::new(HttpFetcher::new(&config.probe)?);
            let repo = pipeline::open_repository(&args.git, &config, &cancel).await?;
            let engine = Engine::new(repo.clone(), fetcher, config.clone())
                .with_progress(progress.clone())
                .with_cancellation(cancel);
            let result = engine.estimate_from_candidates(&host, &candidates).await;
            repo.close();
            result
        }
        None => {
            pipeline::estimate_deployment(
                &args.git,
                &args.url,
                &config.patterns.include,
                &config,
                progress.clone(),
                cancel,
            )
            .await
        }
    };
    progress.finish();

    match result {
        Ok(estimate) => {
            let rendered = args.format.render(&estimate);
            match args.format {
                OutputFormat::Terminal => print!("{rendered}"),
                OutputFormat::Json => println!("{rendered}"),
            }
            Ok(())
        }
        Err(e) if e.is_no_match() => {
            eprintln!("  {} {e}", "⚠".yellow().bold());
            eprintln!(
                "  {}",
                "The live files differ from every version in history; no estimate is given."
                    .dimmed()
            );
            Ok(())
        }
        Err(EngineError::Cancelled) => bail!("interrupted"),
        Err(e) => Err(e).context("deployment estimate failed"),
    }
}

/// Collect and print candidate paths without probing a host.
async fn run_candidates(args: CandidatesArgs, env: &Env) -> Result<()> {
    let mut config = load_config(env)?;
    args.apply_to(&mut config);

    let show_progress = !args.no_progress && std::io::stderr().is_terminal();
    let progress = Arc::new(TerminalProgress::new(show_progress));
    let cancel = cancel_on_ctrl_c();

    let candidates = pipeline::collect_candidate_paths(
        &args.git,
        &config.patterns.include,
        &config,
        progress.clone(),
        cancel,
    )
    .await;
    progress.finish();
    let candidates = candidates.context("failed to collect candidate paths")?;

    let text = filter::format_path_list(&candidates);
    match args.output {
        Some(ref path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "  {} wrote {} path(s) to {}",
                "✔".green().bold(),
                candidates.len(),
                path.display()
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Manage the mirror store.
fn run_mirror(action: MirrorAction, env: &Env) -> Result<()> {
    let config = load_config(env)?;
    let store = MirrorStore::new(config.mirror.dir.as_deref());

    match action {
        MirrorAction::Clear => {
            let stats = store.clear().context("failed to clear mirrors")?;
            println!(
                "Cleared {} mirrored repository/repositories ({}).",
                stats.repositories,
                stats.human_size(),
            );
        }
        MirrorAction::Stats => {
            let stats = store.stats().context("failed to read mirror stats")?;
            println!("Mirrored repositories: {}", stats.repositories);
            println!("Mirror size:           {}", stats.human_size());
        }
        MirrorAction::Path => match store.path() {
            Some(p) => println!("{}", p.display()),
            None => bail!("mirror directory could not be determined"),
        },
    }

    Ok(())
}

/// Print version and build information.
fn run_version() -> Result<()> {
    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    println!("{}     {}", "target:".dimmed(), constants::TARGET);
    Ok(())
}
