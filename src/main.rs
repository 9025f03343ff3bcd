use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use podscribe::{
    CleanOptions, Config, DEFAULT_CONFIG_FILE, EXIT_FATAL, EXIT_SUCCESS, ExternalTranscoder,
    ExternalTranscriber, GitHubClient, NoopReporter, Pipeline, ProgressEvent, ProgressReporter,
    PublishStatus, RawConfig, RepositoryHost, ReqwestClient, SharedProgressReporter, SystemGit,
    clean,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static WAVE: Emoji<'_, '_> = Emoji("🌊 ", "[w] ");
static WRITING: Emoji<'_, '_> = Emoji("📝 ", "[t] ");
static SYNC: Emoji<'_, '_> = Emoji("🔄 ", "[s] ");
static UPLOAD: Emoji<'_, '_> = Emoji("📤 ", "[^] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[-] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Transcribe podcast feeds and publish a browsable archive
#[derive(Parser, Debug)]
#[command(name = "podscribe")]
#[command(about = "Transcribe podcast feeds and publish a browsable archive")]
#[command(version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// GitHub token for the hosting API
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process new feed entries and publish (the default)
    Run(RunArgs),
    /// Delete local or remote state
    Clean(CleanArgs),
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// RSS feed URL or path to local RSS file
    #[arg(long)]
    feed: Option<String>,

    /// Repository working tree holding transcripts and index
    #[arg(long)]
    repo_root: Option<String>,

    /// Directory for downloaded audio
    #[arg(long)]
    download_dir: Option<String>,

    /// Maximum number of feed entries to consider
    #[arg(short, long)]
    limit: Option<usize>,

    /// Skip committing and pushing
    #[arg(long)]
    no_publish: bool,

    /// Keep downloaded audio after publishing
    #[arg(long)]
    keep_audio: bool,
}

#[derive(clap::Args, Debug)]
struct CleanArgs {
    /// Remove downloaded audio and intermediate files
    #[arg(long)]
    downloads: bool,

    /// Remove the episode index
    #[arg(long)]
    index: bool,

    /// Remove the hash manifest
    #[arg(long)]
    manifest: bool,

    /// Remove the HTML archive
    #[arg(long)]
    archive: bool,

    /// Remove all transcripts
    #[arg(long)]
    transcripts: bool,

    /// Remove the local .git directory
    #[arg(long)]
    git_dir: bool,

    /// Delete the repository on GitHub (requires --force)
    #[arg(long)]
    remote: bool,

    /// Confirm deletion of the remote repository
    #[arg(long)]
    force: bool,

    /// Select every local option
    #[arg(long)]
    all_local: bool,
}

impl CleanArgs {
    fn options(&self) -> CleanOptions {
        CleanOptions {
            downloads: self.downloads || self.all_local,
            index: self.index || self.all_local,
            manifest: self.manifest || self.all_local,
            archive: self.archive || self.all_local,
            transcripts: self.transcripts || self.all_local,
            git_dir: self.git_dir || self.all_local,
            remote: self.remote,
            force: self.force,
        }
    }
}

/// Progress reporter using indicatif for terminal output
///
/// Entries are processed one at a time, so a single download bar suffices.
struct IndicatifReporter {
    multi: MultiProgress,
    download: Mutex<Option<ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            download: Mutex::new(None),
            main_bar,
        }
    }

    fn start_download(&self, title: &str, length: Option<u64>) {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(length.unwrap_or(0)));
        bar.set_style(style);
        bar.set_message(truncate_title(title, 40));

        if let Ok(mut slot) = self.download.lock()
            && let Some(previous) = slot.replace(bar)
        {
            previous.finish_and_clear();
        }
    }

    fn with_download(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(slot) = self.download.lock()
            && let Some(bar) = slot.as_ref()
        {
            f(bar);
        }
    }

    fn finish_download(&self) {
        if let Ok(mut slot) = self.download.lock()
            && let Some(bar) = slot.take()
        {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { source } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", source.cyan()));
            }

            ProgressEvent::FeedParsed {
                feed_title,
                total_items,
                new_items,
            } => {
                self.main_bar.println(format!(
                    "{HEADPHONES}{} • {} entries total, {} new",
                    feed_title.bold().green(),
                    total_items.to_string().cyan(),
                    new_items.to_string().yellow()
                ));
            }

            ProgressEvent::Syncing => {
                self.main_bar
                    .set_message(format!("{SYNC}Checking index against published manifest"));
            }

            ProgressEvent::ItemStarted {
                item_index,
                total_items,
                title,
            } => {
                self.main_bar.set_message(format!(
                    "[{}/{}] {}",
                    (item_index + 1).to_string().cyan(),
                    total_items.to_string().cyan(),
                    truncate_title(&title, 50)
                ));
            }

            ProgressEvent::DownloadStarting {
                title,
                content_length,
            } => {
                self.start_download(&title, content_length);
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                self.with_download(|bar| {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                });
            }

            ProgressEvent::DownloadCompleted { .. } => {
                self.finish_download();
            }

            ProgressEvent::Transcoding { title } => {
                self.main_bar
                    .set_message(format!("{WAVE}Transcoding {}", truncate_title(&title, 50)));
            }

            ProgressEvent::Transcribing { title } => {
                self.main_bar.set_message(format!(
                    "{WRITING}Transcribing {}",
                    truncate_title(&title, 50)
                ));
            }

            ProgressEvent::ItemCompleted {
                title,
                transcript_location,
            } => {
                self.main_bar.println(format!(
                    "{SUCCESS}{} → {}",
                    truncate_title(&title, 50).green(),
                    transcript_location.dimmed()
                ));
            }

            ProgressEvent::ItemFailed { title, error } => {
                self.finish_download();
                self.main_bar.println(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&title, 40).red(),
                    error.red()
                ));
            }

            ProgressEvent::PartialFilesCleanedUp { count } => {
                self.main_bar.println(format!(
                    "{BROOM}Removed {} partial download(s)",
                    count.to_string().yellow()
                ));
            }

            ProgressEvent::Publishing => {
                self.main_bar
                    .set_message(format!("{UPLOAD}Committing and pushing"));
            }

            ProgressEvent::EphemeralFilesRemoved { count } => {
                self.main_bar.println(format!(
                    "{BROOM}Removed {} downloaded file(s)",
                    count.to_string().cyan()
                ));
            }

            ProgressEvent::RunCompleted {
                processed_count,
                skipped_count,
                failed_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} transcribed, {} skipped, {} failed",
                    "Run complete:".bold().green(),
                    processed_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("podscribe={level}"))),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli, overrides: Option<&RunArgs>) -> Result<Config> {
    let mut raw = RawConfig::from_file_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    if cli.github_token.is_some() {
        raw.github_token = cli.github_token.clone();
    }

    if let Some(args) = overrides {
        if args.feed.is_some() {
            raw.feed = args.feed.clone();
        }
        if args.repo_root.is_some() {
            raw.repo_root = args.repo_root.clone();
        }
        if args.download_dir.is_some() {
            raw.download_dir = args.download_dir.clone();
        }
        if args.limit.is_some() {
            raw.item_limit = args.limit;
        }
        if args.no_publish {
            raw.publish = Some(false);
        }
        if args.keep_audio {
            raw.delete_audio = Some(false);
        }
    }

    Config::from_raw(raw).context("Invalid configuration")
}

async fn run(cli: &Cli, args: &RunArgs) -> Result<i32> {
    let config = load_config(cli, Some(args))?;

    if !cli.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podscribe".bold().magenta(),
            "- Podcast Transcriber".dimmed()
        );
    }

    let http = ReqwestClient::with_timeout(config.http_timeout)
        .context("Failed to build HTTP client")?;
    let host = config
        .github()
        .map(|github| GitHubClient::new(http.inner().clone(), github));
    let git = SystemGit::new(config.repo_root(), config.command_timeout);
    let transcoder = ExternalTranscoder::new(config.transcoder.clone(), config.command_timeout);
    let transcriber =
        ExternalTranscriber::new(config.transcriber.clone(), config.transcribe_timeout);

    let reporter: SharedProgressReporter = if cli.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let report = Pipeline::new(
        &config,
        &http,
        &transcoder,
        &transcriber,
        &git,
        host.as_ref().map(|h| h as &dyn RepositoryHost),
        reporter,
    )
    .run()
    .await
    .context("Run aborted")?;

    if !cli.quiet {
        if !report.items.failed.is_empty() {
            println!("\n{}", "Failed entries:".red().bold());
            for failure in &report.items.failed {
                println!(
                    "  {}{} - {}",
                    CROSS,
                    failure.title.yellow(),
                    failure.error.dimmed()
                );
            }
        }

        match &report.publish {
            PublishStatus::Disabled => println!("\n{}", "Publishing disabled".dimmed()),
            PublishStatus::Published => println!("\n{UPLOAD}{}", "Published".green()),
            PublishStatus::NoChanges => println!("\n{}", "Nothing new to publish".dimmed()),
            PublishStatus::Failed { error } => {
                println!(
                    "\n{FAILURE}{} {}\n   {}",
                    "Publishing failed:".red().bold(),
                    error,
                    "Downloaded files were kept".yellow()
                );
            }
        }

        if let Some(error) = &report.site_error {
            println!("{FAILURE}{} {}", "Site setup failed:".red(), error);
        }

        println!(
            "\n{FOLDER}Archive: {}\n",
            config.layout.archive_path().display().to_string().cyan()
        );
    }

    Ok(report.exit_code())
}

async fn run_clean(cli: &Cli, args: &CleanArgs) -> Result<i32> {
    let options = args.options();
    if options.is_empty() {
        println!("Nothing selected; see `podscribe clean --help`");
        return Ok(EXIT_SUCCESS);
    }

    let config = load_config(cli, None)?;
    let http = ReqwestClient::with_timeout(config.http_timeout)
        .context("Failed to build HTTP client")?;
    let host = config
        .github()
        .map(|github| GitHubClient::new(http.inner().clone(), github));

    let report = clean(
        &config,
        host.as_ref().map(|h| h as &dyn RepositoryHost),
        &options,
    )
    .await
    .context("Clean failed")?;

    if !cli.quiet {
        for path in &report.removed {
            println!("{BROOM}Removed {}", path.display().to_string().cyan());
        }
        if report.remote_deleted {
            println!("{BROOM}Deleted the remote repository");
        }
        if report.removed.is_empty() && !report.remote_deleted {
            println!("Nothing to remove");
        }
    }

    Ok(EXIT_SUCCESS)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Command::Clean(args)) => run_clean(&cli, args).await,
        Some(Command::Run(args)) => run(&cli, args).await,
        None => run(&cli, &RunArgs::default()).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{FAILURE}{} {e:#}", "Error:".red().bold());
            EXIT_FATAL
        }
    };

    std::process::exit(code);
}
