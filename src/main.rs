use clap::{Parser, Subcommand};
use playtrack::commands::{self, AssignArgs, CheckArgs, UploadArgs};
use playtrack::core::error::{PublishError, print_error};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Upload APKs to Google Play and move them between release tracks
#[derive(Parser)]
#[command(name = "playtrack")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  /// Config file (default: search playtrack.toml, .playtrack.toml, .config/playtrack.toml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Output the result in JSON format
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Upload APKs and assign them to a release track
  Upload {
    /// Comma-separated glob patterns for APK files
    #[arg(long)]
    apk: Option<String>,
    /// Release track: alpha, beta or production
    #[arg(long)]
    track: Option<String>,
    /// Staged rollout percentage (production only)
    #[arg(long)]
    rollout: Option<String>,
    /// Comma-separated glob patterns for main/patch expansion (.obb) files
    #[arg(long)]
    expansion_files: Option<String>,
    /// Reuse the expansion files of the latest existing APK when none is given
    #[arg(long)]
    use_previous_expansion_files: bool,
    /// Recent changes for a language, as LANGUAGE=TEXT (repeatable)
    #[arg(long = "recent-changes", value_name = "LANGUAGE=TEXT")]
    recent_changes: Vec<String>,
  },

  /// Move APKs already on Google Play to a release track
  Assign {
    /// Application ID of the APKs
    #[arg(long)]
    application_id: Option<String>,
    /// Version codes, separated by commas or whitespace
    #[arg(long)]
    version_codes: Option<String>,
    /// Read the application ID and version codes from these APK files instead
    #[arg(long, conflicts_with_all = ["application_id", "version_codes"])]
    apk: Option<String>,
    /// Release track: alpha, beta or production
    #[arg(long)]
    track: Option<String>,
    /// Staged rollout percentage (production only)
    #[arg(long)]
    rollout: Option<String>,
    /// Show the planned track updates without changing anything
    #[arg(long)]
    dry_run: bool,
  },

  /// Validate configuration and credentials
  Check {
    /// Also open (and abandon) an edit on Google Play
    #[arg(long)]
    remote: bool,
    /// Application to check against with --remote
    #[arg(long)]
    application_id: Option<String>,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn init_tracing() {
  let filter = EnvFilter::try_from_env("PLAYTRACK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing();

  let result = match cli.command {
    Commands::Upload {
      apk,
      track,
      rollout,
      expansion_files,
      use_previous_expansion_files,
      recent_changes,
    } => commands::run_upload(UploadArgs {
      apk,
      track,
      rollout,
      expansion_files,
      use_previous_expansion_files,
      recent_changes,
      config: cli.config,
      json: cli.json,
    }),
    Commands::Assign {
      application_id,
      version_codes,
      apk,
      track,
      rollout,
      dry_run,
    } => commands::run_assign(AssignArgs {
      application_id,
      version_codes,
      apk,
      track,
      rollout,
      dry_run,
      config: cli.config,
      json: cli.json,
    }),
    Commands::Check { remote, application_id } => commands::run_check(CheckArgs {
      remote,
      application_id,
      config: cli.config,
      json: cli.json,
    }),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: PublishError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
