//! `eventdoc` - CLI for the analytics event catalog
//!
//! This binary wires configuration, the HTTP gateway and the query cache
//! together and dispatches to the library's views.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::debug;

use eventdoc::browse::{distinct_tags, Summary};
use eventdoc::cli::{Cli, Command, ConfigCommand, EditCommand, ListCommand};
use eventdoc::{init_logging, render, Browser, CacheOptions, Config, HttpGateway, QueryCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration, then let flags and their env vars win
    let config = Config::load_from(cli.config.clone())
        .context("failed to load configuration")?
        .with_overrides(cli.api_url.clone(), cli.token.clone())?;

    let mut stdout = io::stdout();
    match cli.command {
        Command::List(cmd) => handle_list(&mut connect(&config)?, &cmd, &mut stdout).await,
        Command::Show(cmd) => {
            let record = connect(&config)?.find(&cmd.name).await?;
            render::event_detail(&mut stdout, &record, cmd.json)?;
            Ok(())
        }
        Command::Tags(cmd) => {
            let records = connect(&config)?.records().await?;
            render::tag_list(&mut stdout, &distinct_tags(&records), None, cmd.json)?;
            Ok(())
        }
        Command::Summary(cmd) => {
            let records = connect(&config)?.records().await?;
            render::summary(&mut stdout, &Summary::from_records(records.iter()), cmd.json)?;
            Ok(())
        }
        Command::Edit(cmd) => handle_edit(&mut connect(&config)?, cmd, &mut stdout).await,
        Command::Browse => {
            let mut browser = connect(&config)?;
            writeln!(stdout, "Type 'help' for commands, 'quit' to leave.")?;
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            browser.run(input, &mut stdout).await?;
            Ok(())
        }
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn connect(config: &Config) -> anyhow::Result<Browser> {
    let gateway = HttpGateway::from_config(config).context("failed to set up the API client")?;
    debug!(base_url = gateway.base_url(), "Using catalog API");
    let cache = QueryCache::new(Arc::new(gateway), CacheOptions::from_config(config));
    Ok(Browser::new(cache))
}

async fn handle_list(
    browser: &mut Browser,
    cmd: &ListCommand,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let records = browser.records().await?;
    let visible = cmd.filter().apply(&records);
    render::event_list(out, &visible, records.len(), cmd.format)?;
    Ok(())
}

async fn handle_edit(
    browser: &mut Browser,
    cmd: EditCommand,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if cmd.is_empty() {
        bail!("nothing to change; pass at least one of --description, --type, --format-json, --tags, --deprecated");
    }
    let patch = cmd.patch();
    let saved = browser
        .edit_and_save(&cmd.name, patch, cmd.tags)
        .await
        .with_context(|| format!("failed to save {}", cmd.name))?;

    writeln!(out, "Saved {}", saved.event_name)?;
    writeln!(out)?;
    render::event_detail(out, &saved, false)?;
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let shown = config.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[API]");
                println!("  Base URL:           {}", shown.api.base_url);
                let token = if shown.api.token.is_empty() {
                    "(not set)"
                } else {
                    shown.api.token.as_str()
                };
                println!("  Token:              {token}");
                println!("  Timeout (secs):     {}", shown.api.timeout_secs);
                println!();
                println!("[Cache]");
                println!("  Stale after (secs): {}", shown.cache.stale_after_secs);
                println!("  Retries:            {}", shown.cache.retries);
                println!("  Retry delay (ms):   {}", shown.cache.retry_delay_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)).and_then(|c| c.validate()) {
                Ok(()) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
