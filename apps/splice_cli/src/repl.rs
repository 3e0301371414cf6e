//! Interactive session: edits apply to the current cache artifact and can be
//! undone, redone and saved.

use clap::{Parser, Subcommand};
use splice_core::{CoreError, EditSession};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use crate::cli::{CropArgs, EditSpec, FrameArgs, OffsetArgs, RangeArgs, ShiftArgs, SpeedArgs};
use crate::progress::progress_bar;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct ReplLine {
    #[command(subcommand)]
    command: ReplCommand,
}

#[derive(Subcommand, Debug)]
enum ReplCommand {
    /// Load a video as the newest history entry
    Open { path: PathBuf },
    /// Append videos to the current one
    Merge {
        #[arg(required = true)]
        videos: Vec<PathBuf>,
        #[command(flatten)]
        frame: FrameArgs,
    },
    /// Insert videos into the current one
    Insert {
        #[arg(required = true)]
        videos: Vec<PathBuf>,
        #[command(flatten)]
        offset: OffsetArgs,
    },
    Trim {
        #[command(flatten)]
        range: RangeArgs,
    },
    Cut {
        #[command(flatten)]
        range: RangeArgs,
    },
    Speed {
        #[command(flatten)]
        speed: SpeedArgs,
    },
    /// Draw a video on top of the current one
    Overlay {
        video: PathBuf,
        #[command(flatten)]
        shifts: ShiftArgs,
    },
    Crop {
        #[command(flatten)]
        crop: CropArgs,
    },
    Undo,
    Redo,
    /// Copy the current file to OUTPUT
    Save { output: PathBuf },
    /// Drop the whole history
    Clear,
    Status,
    /// Clear the history and leave
    #[command(alias = "exit")]
    Quit,
}

enum Flow {
    Continue,
    Quit,
}

pub async fn run(state: &AppState) -> anyhow::Result<()> {
    let session = state.session()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    offer_restore(&session, &mut lines).await?;
    println!("splice session, type `help` for commands, `quit` to leave");

    loop {
        prompt("splice> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }

        let command = match ReplLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                let _ = e.print();
                continue;
            }
        };
        match handle(state, &session, command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => eprintln!("error [{}]: {e}", e.kind()),
        }
    }

    session.shutdown()?;
    info!("session closed, history cleared");
    Ok(())
}

async fn offer_restore(
    session: &EditSession,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<()> {
    let found = session.previous_session()?;
    if found == 0 {
        return Ok(());
    }
    prompt(&format!(
        "Found {found} cached edit(s) from a previous session. Restore them? [y/N] "
    ))?;
    let answer = lines.next_line().await?.unwrap_or_default();
    if matches!(answer.trim(), "y" | "Y" | "yes") {
        let index = session.restore_session()?;
        println!("restored history at step {index}");
    } else {
        session.discard_previous_session()?;
        println!("previous history removed");
    }
    Ok(())
}

async fn handle(
    state: &AppState,
    session: &EditSession,
    command: ReplCommand,
) -> splice_core::Result<Flow> {
    let (spec, extra) = match command {
        ReplCommand::Open { path } => {
            let slot = session.open(path).await?;
            println!("[{}] {}", session.current_index()?, slot.display());
            return Ok(Flow::Continue);
        }
        ReplCommand::Undo => {
            report_current(session, session.undo()?)?;
            return Ok(Flow::Continue);
        }
        ReplCommand::Redo => {
            report_current(session, session.redo()?)?;
            return Ok(Flow::Continue);
        }
        ReplCommand::Save { output } => {
            let saved = session.save(output, state.config.editor.overwrite).await?;
            println!("saved {}", saved.display());
            return Ok(Flow::Continue);
        }
        ReplCommand::Clear => {
            session.clear()?;
            println!("history cleared");
            return Ok(Flow::Continue);
        }
        ReplCommand::Status => {
            match session.current_path() {
                Ok(path) => report_current(session, path)?,
                Err(CoreError::NoActiveFile) => println!("no file open"),
                Err(e) => return Err(e),
            }
            return Ok(Flow::Continue);
        }
        ReplCommand::Quit => return Ok(Flow::Quit),
        ReplCommand::Merge { videos, frame } => (EditSpec::Merge(frame.overrides()), videos),
        ReplCommand::Insert { videos, offset } => (
            EditSpec::Insert {
                offset: offset.offset,
            },
            videos,
        ),
        ReplCommand::Trim { range } => (EditSpec::Trim(range.interval()?), vec![]),
        ReplCommand::Cut { range } => (EditSpec::Cut(range.interval()?), vec![]),
        ReplCommand::Speed { speed } => (speed.spec()?, vec![]),
        ReplCommand::Overlay { video, shifts } => {
            let (x, y) = shifts.xy();
            (EditSpec::Overlay { x, y }, vec![video])
        }
        ReplCommand::Crop { crop } => (crop.spec(), vec![]),
    };

    apply(session, spec, extra).await?;
    report_current(session, session.current_path()?)?;
    Ok(Flow::Continue)
}

/// Validate against the current file first so the bar knows its length,
/// then run the edit under the session lock.
async fn apply(
    session: &EditSession,
    spec: EditSpec,
    extra: Vec<PathBuf>,
) -> splice_core::Result<()> {
    let sources = |current: PathBuf, extra: Vec<PathBuf>| {
        std::iter::once(current).chain(extra).collect::<Vec<_>>()
    };

    let preview = spec
        .clone()
        .into_operation(sources(session.current_path()?, extra.clone()));
    let total = session.editor().plan(&preview)?.expected_duration;

    let (tx, bar) = progress_bar(total, spec.name());
    let result = session
        .apply(
            move |current| spec.into_operation(sources(current, extra)),
            Some(tx),
        )
        .await;
    let _ = bar.await;
    result.map(|_| ())
}

fn report_current(session: &EditSession, path: PathBuf) -> splice_core::Result<()> {
    println!("[{}] {}", session.current_index()?, path.display());
    Ok(())
}

fn prompt(text: &str) -> std::io::Result<()> {
    print!("{text}");
    std::io::stdout().flush()
}
