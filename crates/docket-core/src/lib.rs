pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod i18n;
pub mod persist;
pub mod render;
pub mod session;
pub mod store;
pub mod task;
pub mod terminal;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args);
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting docket"
    );
    debug!(?pre.rc_overrides, "rc overrides taken from argv");

    let mut cfg = config::Config::load(cli.docketrc.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value))),
    );

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;
    let slots = persist::DirSlotStore::open(&data_dir)
        .with_context(|| format!("failed to open slot store at {}", data_dir.display()))?;

    let mut catalog = i18n::Catalog::builtin();
    if let Some(dir) = cfg.get_path("locale.dir") {
        catalog
            .load_dir(&dir)
            .with_context(|| format!("failed to load locales from {}", dir.display()))?;
    }

    let zone = datetime::resolve_display_zone(cfg.get("timezone").as_deref());
    let presenter = terminal::TerminalPresenter::stdout(&cfg, cli.json)?;
    let mut session = session::Session::open(
        slots,
        presenter,
        session::SessionOptions {
            catalog,
            default_language: cfg.get("language"),
            zone: Some(zone),
        },
    );

    let command = cli
        .command
        .unwrap_or_else(|| cli::Command::List(cli::ListArgs::default()));
    commands::dispatch(&mut session, command, Utc::now())?;

    info!("done");
    Ok(())
}
