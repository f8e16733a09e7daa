use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use marquee_common::observability::{LogConfig, LogFormat};
use marquee_config::{ConfigError, MarqueeConfig, MarqueeConfigLoader};

/// Resolve show titles to representative images through a shared text file.
#[derive(Debug, Parser)]
#[command(name = "marquee")]
#[command(about = "Watches a shared file for `query:<title>` and answers with `path:<image>`", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub logging: LogArgs,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum CliCommand {
    /// Poll the shared record and serve requests until Ctrl-C (default).
    Listen,

    /// Resolve and download one title, print the saved path, and exit.
    Resolve {
        /// Show title; several words are joined with single spaces.
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },
}

#[derive(Debug, Args)]
pub struct LogArgs {
    /// Directory for log files (defaults to $MARQUEE_LOG_DIR, then ~/.local/share/marquee).
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Mirror log events to stderr.
    #[arg(long, global = true)]
    pub stderr: bool,

    /// Emit JSON log lines.
    #[arg(long, global = true)]
    pub json: bool,
}

/// Overrides that win over `MARQUEE__*` environment variables.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Shared record path.
    #[arg(long, global = true)]
    pub channel: Option<PathBuf>,

    /// Destination directory for images.
    #[arg(long, global = true)]
    pub dest: Option<PathBuf>,

    /// Relevance bias phrase.
    #[arg(long, global = true)]
    pub bias: Option<String>,

    /// Cooldown in seconds after ignored frames and failures.
    #[arg(long, global = true)]
    pub wait: Option<f64>,

    /// Delay in seconds between polls of an empty record.
    #[arg(long, global = true)]
    pub poll: Option<f64>,

    /// Search endpoint prefix the biased query is appended to.
    #[arg(long, global = true)]
    pub search_base: Option<String>,
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            app_name: "marquee",
            log_dir: self.logging.log_dir.clone(),
            emit_stderr: self.logging.stderr,
            format: if self.logging.json {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            ..LogConfig::default()
        }
    }

    pub fn load_config(&self) -> Result<MarqueeConfig, ConfigError> {
        self.config.apply(MarqueeConfigLoader::new()).load()
    }
}

impl ConfigArgs {
    fn apply(&self, mut loader: MarqueeConfigLoader) -> MarqueeConfigLoader {
        if let Some(p) = &self.channel {
            loader = loader.with_override("channel_path", p.to_string_lossy().into_owned());
        }
        if let Some(p) = &self.dest {
            loader = loader.with_override("dest_dir", p.to_string_lossy().into_owned());
        }
        if let Some(b) = &self.bias {
            loader = loader.with_override("relevance_bias", b.as_str());
        }
        if let Some(w) = self.wait {
            loader = loader.with_override("std_wait_secs", w);
        }
        if let Some(p) = self.poll {
            loader = loader.with_override("poll_interval_secs", p);
        }
        if let Some(s) = &self.search_base {
            loader = loader.with_override("search_base", s.as_str());
        }
        loader
    }
}
