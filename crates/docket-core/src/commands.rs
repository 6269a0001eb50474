use std::io::{BufRead, Write};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{debug, info, instrument, warn};

use crate::cli::{AddArgs, Command, ListArgs, ShellCommand, ShellLine};
use crate::datetime::parse_due_expr;
use crate::filter::ViewFilter;
use crate::persist::SlotStore;
use crate::render::{ActionKind, ItemAction};
use crate::session::{Event, NewTask, Session};
use crate::terminal::TerminalPresenter;

pub type TerminalSession<S, W> = Session<S, TerminalPresenter<W>>;

#[instrument(skip(session, now))]
pub fn dispatch<S: SlotStore, W: Write>(
    session: &mut TerminalSession<S, W>,
    command: Command,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match command {
        Command::Add(args) => {
            let event = submit_event(session, args, now)?;
            session.handle(event, now)?;
        }
        Command::Done { id } => {
            session.handle(
                Event::Action(ItemAction {
                    id,
                    kind: ActionKind::Complete,
                }),
                now,
            )?;
        }
        Command::Delete { id } => {
            session.handle(
                Event::Action(ItemAction {
                    id,
                    kind: ActionKind::Delete,
                }),
                now,
            )?;
        }
        Command::List(args) if args == ListArgs::default() => session.refresh(now)?,
        Command::List(args) => {
            let filter = ViewFilter {
                category: args.category,
                priority: args.priority,
                query: args.search.unwrap_or_default(),
            };
            session.replace_filter(filter, now)?;
        }
        Command::Move { ids } => session.handle(Event::Reordered(ids), now)?,
        Command::Lang { code } => session.handle(Event::LanguageChanged(code), now)?,
        Command::Theme => session.handle(Event::ThemeToggled, now)?,
        Command::Stats => {
            let stats = session.frame(now).stats;
            session
                .presenter_mut()
                .print_stats(&stats)
                .context("failed writing stats")?;
        }
        Command::Shell => {
            let stdin = std::io::stdin();
            run_shell(session, stdin.lock())?;
        }
    }

    Ok(())
}

fn submit_event<S: SlotStore, W: Write>(
    session: &TerminalSession<S, W>,
    args: AddArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<Event> {
    let due_date = args
        .due
        .as_deref()
        .map(|raw| parse_due_expr(raw, session.today(now)))
        .transpose()?;

    Ok(Event::Submit(NewTask {
        text: args.text.join(" "),
        category: args.category,
        priority: args.priority,
        due_date,
    }))
}

/// Line-oriented session: each line is one event, filters persist between
/// lines, and rejected operations are reported without ending the shell.
#[instrument(skip_all)]
pub fn run_shell<S: SlotStore, W: Write, R: BufRead>(
    session: &mut TerminalSession<S, W>,
    input: R,
) -> anyhow::Result<()> {
    info!("shell started");
    session.refresh(Utc::now())?;

    for line in input.lines() {
        let line = line.context("failed reading shell input")?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parsed = match ShellLine::try_parse_from(trimmed.split_whitespace()) {
            Ok(parsed) => parsed,
            Err(err) => {
                session
                    .presenter_mut()
                    .print_line(err.to_string().trim_end())?;
                continue;
            }
        };

        let now = Utc::now();
        let outcome = match parsed.command {
            ShellCommand::Quit => break,
            ShellCommand::Base(Command::Shell) => {
                debug!("nested shell ignored");
                continue;
            }
            ShellCommand::Base(command) => dispatch(session, command, now),
            ShellCommand::Filter { category, priority } => session
                .handle(Event::FilterChanged { category, priority }, now)
                .map_err(anyhow::Error::from),
            ShellCommand::Search { words } => session
                .handle(Event::SearchChanged(words.join(" ")), now)
                .map_err(anyhow::Error::from),
            ShellCommand::Clear => session
                .handle(Event::FiltersCleared, now)
                .map_err(anyhow::Error::from),
        };

        if let Err(err) = outcome {
            warn!(error = %err, "shell command rejected");
            session.presenter_mut().print_line(&format!("error: {err:#}"))?;
        }
    }

    info!("shell finished");
    Ok(())
}
