pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod engine;
pub mod profile;
pub mod projector;
pub mod render;
pub mod selection;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting daylist"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    datastore::DataStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let tz = datetime::resolve_timezone(
    cfg.get("timezone").as_deref()
  );
  let selection =
    commands::default_selection(&cfg)
      .context(
        "invalid default view in \
         config"
      )?;

  let mut engine =
    engine::Engine::open(
      store.task_storage(),
      clock::SystemClock::new(tz),
      selection
    );
  let mut profiles =
    profile::ProfileStore::open(
      store.profile_storage()
    );
  let mut renderer =
    render::Renderer::new(&cfg, tz)?;

  let command = cli
    .command
    .unwrap_or_else(|| {
      cli::Command::List(
        cli::ListArgs::default()
      )
    });

  commands::dispatch(
    &mut engine,
    &mut profiles,
    &mut renderer,
    command
  )?;

  info!("done");
  Ok(())
}
