mod cli;
mod progress;
mod repl;
mod state;

use anyhow::bail;
use clap::Parser;
use splice_core::types::parse_clock;
use splice_core::CoreError;
use splice_render::FfmpegProvider;
use std::process::ExitCode;
use tracing::debug;

use cli::{CacheAction, Cli, Command, EditSpec, IoArgs};
use progress::progress_bar;
use state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let kind = err
                .downcast_ref::<CoreError>()
                .map(CoreError::kind)
                .unwrap_or("error");
            eprintln!("error [{kind}]: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.overwrite {
        config.editor.overwrite = true;
    }
    debug!(?config, "loaded configuration");
    let state = AppState::new(config);

    match &cli.command {
        Command::Cache { action } => cache_command(&state, *action),
        Command::Thumbnail {
            video,
            output,
            time,
            width,
        } => {
            check_dependencies(&state.provider)?;
            let seconds = parse_clock(time)?;
            state
                .provider
                .thumbnail(video, output, seconds as f64, *width)?;
            println!("wrote {}", output.display());
            Ok(())
        }
        Command::Session => {
            check_dependencies(&state.provider)?;
            repl::run(&state).await
        }
        command => match command.edit() {
            Some(edit) => {
                check_dependencies(&state.provider)?;
                let (spec, io) = edit?;
                run_edit(&state, spec, io).await
            }
            None => Ok(()),
        },
    }
}

async fn run_edit(state: &AppState, spec: EditSpec, io: &IoArgs) -> anyhow::Result<()> {
    spec.check_sources(io.videos.len())?;
    let name = spec.name();
    let op = spec.into_operation(io.videos.clone());
    let plan = state.editor.plan(&op)?;

    let (tx, bar) = progress_bar(plan.expected_duration, name);
    let editor = state.editor.clone();
    let output = io.output.clone();
    let overwrite = editor.config().overwrite;
    let result = tokio::task::spawn_blocking(move || {
        editor.render_plan(&plan, &output, overwrite, Some(tx))
    })
    .await?;
    let _ = bar.await;

    let outcome = result?;
    println!(
        "wrote {} ({:.2}s)",
        outcome.output.display(),
        outcome.expected_duration
    );
    Ok(())
}

fn cache_command(state: &AppState, action: CacheAction) -> anyhow::Result<()> {
    let mut cache = state.cache()?;
    let found = cache.scan_previous_session();
    match action {
        CacheAction::Status => {
            println!("cache: {}", cache.cache_dir().display());
            if found == 0 {
                println!("no cached history");
            } else {
                println!(
                    "{found} cached edit(s), newest {}",
                    cache.slot_path(found).display()
                );
            }
        }
        CacheAction::Clear => {
            cache.discard_previous_session()?;
            println!("removed {found} cached edit(s)");
        }
    }
    Ok(())
}

fn check_dependencies(provider: &FfmpegProvider) -> anyhow::Result<()> {
    let missing = provider.missing_tools();
    if missing.is_empty() {
        return Ok(());
    }

    eprintln!("\n=== splice: missing required dependencies ===\n");
    for tool in &missing {
        eprintln!("  ✗ {}", tool.display());
    }
    eprintln!("\nInstall with:");
    eprintln!("  sudo apt install ffmpeg   (Debian/Ubuntu)");
    eprintln!("  brew install ffmpeg       (macOS)\n");
    bail!("ffmpeg/ffprobe not found")
}
