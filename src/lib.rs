pub mod config;
pub mod model;
pub mod registry;
pub mod scanner;
pub mod sources;
pub mod stdin;
pub mod tempfiles;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};

use config::Config;
use registry::{Registry, SourceSet, Watcher};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "logscout",
    version,
    about = "Discover and keep track of local, remote and piped log files"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the registry once and print it as JSON
    Scan {
        #[command(flatten)]
        sources: SourceArgs,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Keep the registry fresh until interrupted
    Watch {
        #[command(flatten)]
        sources: SourceArgs,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

/// Source selection and scan knobs shared by `scan` and `watch`.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Local file, directory or glob (repeatable)
    #[arg(short = 'f', long = "file", value_name = "PATTERN")]
    pub files: Vec<String>,

    /// Remote source: "user@host[:port] [password=P] [private_key=K] /path" (repeatable)
    #[arg(short = 's', long = "ssh", value_name = "SPEC")]
    pub ssh: Vec<String>,

    /// Container source: "container_id /path" (repeatable)
    #[arg(short = 'd', long = "docker", value_name = "SPEC")]
    pub docker: Vec<String>,

    /// Maximum files kept per pattern
    #[arg(long)]
    pub limit: Option<usize>,

    /// Seconds between rebuilds
    #[arg(long)]
    pub every: Option<u64>,

    /// Skip files whose leading bytes are not valid UTF-8
    #[arg(long)]
    pub check_utf8: bool,

    /// Verify SSH host keys against known_hosts
    #[arg(long)]
    pub verify_host_key: bool,

    /// Config file (defaults to the platform config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Extra local patterns
    #[arg(value_name = "PATTERN")]
    pub patterns: Vec<String>,
}

impl SourceArgs {
    /// Layer these flags over `config`.
    pub fn apply(&self, config: &mut Config) {
        config.files.extend(self.files.iter().cloned());
        config.files.extend(self.patterns.iter().cloned());
        config.ssh.extend(self.ssh.iter().cloned());
        config.docker.extend(self.docker.iter().cloned());
        if let Some(limit) = self.limit {
            config.limit = limit;
        }
        if let Some(every) = self.every {
            config.every = every;
        }
        if self.check_utf8 {
            config.check_utf8 = true;
        }
        if self.verify_host_key {
            config.verify_host_key = true;
        }
    }

    /// Load, merge and validate the effective configuration.
    pub fn resolve(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { sources, pretty } => run_scan(&sources, pretty),
        Commands::Watch { sources } => run_watch(&sources).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "logscout", &mut std::io::stdout());
            Ok(())
        }
        Commands::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut out = std::io::stdout();
            man.render(&mut out)?;
            Ok(())
        }
    }
}

/// Resolve config and parse sources, capturing piped stdin when present.
fn prepare(args: &SourceArgs) -> Result<(Config, SourceSet)> {
    let config = args.resolve()?;

    let stdin_path = if stdin::is_input_from_pipe() {
        Some(stdin::capture_stdin().context("failed to capture piped stdin")?)
    } else {
        None
    };

    let sources = SourceSet::from_config(&config, stdin_path);
    if sources.is_empty() {
        bail!("no log sources given; pass a path, --file, --ssh or --docker, or pipe into stdin");
    }
    Ok((config, sources))
}

fn run_scan(args: &SourceArgs, pretty: bool) -> Result<()> {
    let (_config, sources) = prepare(args)?;
    stdin::wait_for_capture().context("failed to capture piped stdin")?;

    let registry = Registry::global();
    registry.publish(sources.build());
    let snapshot = registry.snapshot();

    let result = write_json(snapshot.as_slice(), pretty);
    tempfiles::cleanup();
    result
}

async fn run_watch(args: &SourceArgs) -> Result<()> {
    let (config, sources) = prepare(args)?;

    let registry: Arc<Registry> = Registry::global();
    let handle = Watcher::new(Arc::clone(&registry), sources, config.interval())
        .start()
        .context("failed to start watcher")?;
    tracing::info!(
        files = registry.len(),
        every_secs = config.every,
        "watching log sources, press Ctrl-C to stop"
    );

    let signal = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
    tokio::task::spawn_blocking(move || handle.stop())
        .await
        .context("watcher shutdown failed")?;
    tempfiles::cleanup();

    signal.context("failed to listen for Ctrl-C")
}

fn write_json(files: &[model::FileInfo], pretty: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut out, files)?;
    } else {
        serde_json::to_writer(&mut out, files)?;
    }
    writeln!(out)?;
    Ok(())
}
