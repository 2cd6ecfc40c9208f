//! Subcommand implementations.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use nv_cli::replay::{Replay, ReplayReport, Script};
use nv_cli::settings::Settings;
use nv_cli::summary::{print_classification, print_report, render_plain};

use crate::cli::{ClassifyArgs, OutputArg, ReplayArgs, SettingsArgs};

pub fn run_replay(args: &ReplayArgs, settings: &Settings) -> Result<ReplayReport> {
    let script = Script::load(&args.script)?;
    let base_dir = args.script.parent().unwrap_or(Path::new("."));
    info!(script = %args.script.display(), steps = script.steps.len(), "replaying session");

    let report = Replay::new(settings, script.multiselect, base_dir).run(&script);
    match args.output {
        OutputArg::Table => print_report(&report),
        OutputArg::Plain => print!("{}", render_plain(&report)),
        OutputArg::Json => {
            let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
            println!("{json}");
        }
    }
    Ok(report)
}

pub fn run_classify(args: &ClassifyArgs, settings: &Settings) {
    let results: Vec<_> = args
        .files
        .iter()
        .map(|name| (name.clone(), settings.file_types.classify(name)))
        .collect();
    print_classification(&results);
}

pub fn run_settings(args: &SettingsArgs, settings: &Settings) -> Result<()> {
    print!("{}", settings.to_toml()?);
    if let Some(path) = &args.write {
        settings.save_to(path)?;
        info!(path = %path.display(), "settings written");
    }
    Ok(())
}
