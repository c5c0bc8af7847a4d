use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use script_ext_html::assets::DirectoryAssets;
use script_ext_html::config::PluginConfig;
use script_ext_html::hooks::ScriptExtPlugin;
use script_ext_html::manifest::load_manifest;
use script_ext_html::models::{Tag, TagGroups};

/// Rewrite the script and link tags of a generated document.
#[derive(Debug, Parser)]
#[command(name = "script-ext", version, about)]
struct Cli {
  /// Build manifest describing the document's tags and chunks.
  #[arg(long, value_name = "FILE")]
  build: PathBuf,

  /// Directory holding the emitted assets.
  #[arg(long, value_name = "DIR")]
  assets: PathBuf,

  /// Plugin configuration (JSON or YAML); discovered in the current directory otherwise.
  #[arg(long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// How to print the rewritten tags.
  #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
  format: OutputFormat,

  /// Run the emission phase, deleting inlined assets when configured.
  #[arg(long)]
  write: bool,

  /// Enable debug logging.
  #[arg(short, long)]
  verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
  Json,
  Html,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  init_logging(cli.verbose);

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::FAILURE
    }
  }
}

fn init_logging(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("script_ext_html=debug,script_ext=debug")
  } else {
    EnvFilter::new("script_ext_html=info,script_ext=info")
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
    .with(filter)
    .init();
}

fn run(cli: Cli) -> Result<()> {
  let config = match &cli.config {
    Some(path) => PluginConfig::from_path(path)?,
    None => PluginConfig::discover(&env::current_dir().context("failed to read current directory")?),
  };
  let plugin = ScriptExtPlugin::new(config.into_options()?);
  let mut controller = plugin.controller();

  let manifest = load_manifest(&cli.build)?;
  let context = manifest.context();
  let (mut groups, chunks) = manifest.into_parts();
  let mut assets = DirectoryAssets::open(&cli.assets)
    .with_context(|| format!("failed to read assets from {}", cli.assets.display()))?;

  controller.alter_asset_tags(&mut groups, &assets, &chunks, &context)?;

  if cli.write {
    let removed = controller.emit(&mut assets)?;
    for name in &removed {
      info!("removed inlined asset {name}");
    }
  }

  println!("{}", render(&groups, cli.format)?);
  Ok(())
}

fn render(groups: &TagGroups, format: OutputFormat) -> Result<String> {
  match format {
    OutputFormat::Json => Ok(serde_json::to_string_pretty(groups)?),
    OutputFormat::Html => {
      let lines: Vec<String> = groups.head.iter().chain(&groups.body).map(Tag::to_html).collect();
      Ok(lines.join("\n"))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_flags() {
    let cli = Cli::try_parse_from([
      "script-ext",
      "--build",
      "build.json",
      "--assets",
      "dist",
      "--format",
      "html",
      "--write",
      "-v",
    ])
    .unwrap();
    assert_eq!(cli.build, PathBuf::from("build.json"));
    assert_eq!(cli.format, OutputFormat::Html);
    assert!(cli.write && cli.verbose);
    assert!(cli.config.is_none());
  }

  #[test]
  fn html_output_lists_head_then_body() {
    let groups = TagGroups {
      head: vec![Tag::link("preload", "a.js")],
      body: vec![Tag::script("a.js")],
    };
    assert_eq!(
      render(&groups, OutputFormat::Html).unwrap(),
      "<link rel=\"preload\" href=\"a.js\">\n<script src=\"a.js\"></script>"
    );
  }
}
