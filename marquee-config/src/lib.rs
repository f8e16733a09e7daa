//! Loader for service configuration with environment overlays.
//!
//! There is no configuration file. Values come from built-in defaults, then
//! `MARQUEE__<FIELD>` environment variables (nested extraction rules use a
//! second `__`, e.g. `MARQUEE__EXTRACTION__LINK_PREFIX_LEN`), then explicit
//! overrides supplied by the caller (the CLI). `${VAR}` and `~` in path
//! fields are expanded after merging.
use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "MARQUEE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "relevance bias {0:?} has no space and is not exactly two characters; \
         use a space-separated phrase such as \"rotten tomatoes\""
    )]
    InvalidBias(String),
    #[error("{field} must be a finite, non-negative number of seconds (got {value})")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("image_extension {0:?} must not contain a path separator or leading dot")]
    InvalidExtension(String),
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// HTML structural assumptions used by the extraction stages.
///
/// These are site-specific; they live here so they can be retuned through
/// the environment instead of code changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionRules {
    /// `img` elements qualify only when their class list is exactly this one class.
    pub target_image_class: String,
    /// Characters dropped from the front of a result link (the engine's redirect prefix).
    pub link_prefix_len: usize,
    /// Substring that marks an image source as served through a resizing proxy.
    pub resize_indicator: String,
    /// Marker located inside a resized source; the real URL follows it.
    pub resize_marker: String,
    /// Offset added to the marker position to reach the real URL.
    pub resize_marker_offset: usize,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            target_image_class: "PhotosCarousel__image".into(),
            link_prefix_len: 7,
            resize_indicator: "resiz".into(),
            resize_marker: "v2/".into(),
            resize_marker_offset: 3,
        }
    }
}

/// Every process-wide constant of the service, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarqueeConfig {
    /// Shared record used as the request/response mailbox.
    pub channel_path: PathBuf,
    /// Phrase appended to searches to bias results toward one site.
    pub relevance_bias: String,
    /// Directory receiving downloaded images.
    pub dest_dir: PathBuf,
    /// Cooldown after a non-query frame or a failed request.
    pub std_wait_secs: f64,
    /// Delay between polls of an empty record; `0` re-polls immediately.
    pub poll_interval_secs: f64,
    /// Search endpoint prefix; the biased query is appended verbatim.
    pub search_base: String,
    /// Extension given to saved images.
    pub image_extension: String,
    pub extraction: ExtractionRules,
}

impl Default for MarqueeConfig {
    fn default() -> Self {
        Self {
            channel_path: PathBuf::from("image-service.txt"),
            relevance_bias: "rotten tomatoes".into(),
            dest_dir: PathBuf::from("ShowsImages"),
            std_wait_secs: 5.0,
            poll_interval_secs: 0.0,
            search_base: "https://www.google.com/search?q=".into(),
            image_extension: "jpg".into(),
            extraction: ExtractionRules::default(),
        }
    }
}

impl MarqueeConfig {
    /// Check invariants that would otherwise surface mid-request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        RelevanceBias::parse(&self.relevance_bias)?;
        check_secs("std_wait_secs", self.std_wait_secs)?;
        check_secs("poll_interval_secs", self.poll_interval_secs)?;
        if self.channel_path.as_os_str().is_empty() {
            return Err(ConfigError::Empty("channel_path"));
        }
        if self.dest_dir.as_os_str().is_empty() {
            return Err(ConfigError::Empty("dest_dir"));
        }
        if self.search_base.trim().is_empty() {
            return Err(ConfigError::Empty("search_base"));
        }
        if self.image_extension.is_empty() {
            return Err(ConfigError::Empty("image_extension"));
        }
        if self.image_extension.starts_with('.')
            || self.image_extension.contains(['/', '\\'])
        {
            return Err(ConfigError::InvalidExtension(self.image_extension.clone()));
        }
        if self.extraction.target_image_class.trim().is_empty() {
            return Err(ConfigError::Empty("extraction.target_image_class"));
        }
        if self.extraction.resize_indicator.is_empty() {
            return Err(ConfigError::Empty("extraction.resize_indicator"));
        }
        if self.extraction.resize_marker.is_empty() {
            return Err(ConfigError::Empty("extraction.resize_marker"));
        }
        Ok(())
    }

    /// The validated bias. Fails the same way [`MarqueeConfig::validate`] does.
    pub fn bias(&self) -> Result<RelevanceBias, ConfigError> {
        RelevanceBias::parse(&self.relevance_bias)
    }

    pub fn std_wait(&self) -> Duration {
        Duration::from_secs_f64(self.std_wait_secs.max(0.0))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs.max(0.0))
    }
}

fn check_secs(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidDuration { field, value })
    }
}

/// The relevance bias in its two derived forms.
///
/// ```
/// use marquee_config::RelevanceBias;
///
/// let bias = RelevanceBias::parse("rotten tomatoes").unwrap();
/// assert_eq!(bias.query_form(), "rotten+tomatoes");
/// assert_eq!(bias.match_form(), "rottentomatoes");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceBias {
    query_form: String,
    match_form: String,
}

impl RelevanceBias {
    /// Derive the query and match forms.
    ///
    /// A phrase with spaces yields `+`-joined and space-stripped forms. A
    /// two-character string without spaces maps its characters one-to-one
    /// onto (query, match). Anything else is rejected.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if raw.contains(' ') {
            return Ok(Self {
                query_form: raw.replace(' ', "+"),
                match_form: raw.replace(' ', ""),
            });
        }
        let mut chars = raw.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(q), Some(m), None) => {
                tracing::warn!(
                    bias = raw,
                    "config.bias.two_char_form: treating characters as (query, match) pair"
                );
                Ok(Self {
                    query_form: q.to_string(),
                    match_form: m.to_string(),
                })
            }
            _ => Err(ConfigError::InvalidBias(raw.to_string())),
        }
    }

    /// Form embedded in the search URL.
    pub fn query_form(&self) -> &str {
        &self.query_form
    }

    /// Form a result link must contain to qualify as a candidate.
    pub fn match_form(&self) -> &str {
        &self.match_form
    }
}

fn expand_path(p: &Path) -> PathBuf {
    let Some(s) = p.to_str() else {
        return p.to_path_buf();
    };
    match shellexpand::full(s) {
        Ok(cow) => PathBuf::from(cow.into_owned()),
        Err(e) => {
            tracing::warn!(path = s, error = %e, "config.path.expand_failed");
            p.to_path_buf()
        }
    }
}

/// Builder hides the `config` crate wiring (env overlay + explicit overrides).
pub struct MarqueeConfigLoader {
    prefix: String,
    overrides: Vec<(String, config::Value)>,
}

impl Default for MarqueeConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl MarqueeConfigLoader {
    /// Defaults overlaid with `MARQUEE__*` environment variables.
    ///
    /// ```
    /// use marquee_config::MarqueeConfigLoader;
    ///
    /// let cfg = MarqueeConfigLoader::with_env_prefix("MARQUEE_DOCTEST_UNSET")
    ///     .load()
    ///     .expect("defaults are valid");
    /// assert_eq!(cfg.relevance_bias, "rotten tomatoes");
    /// assert_eq!(cfg.std_wait_secs, 5.0);
    /// ```
    pub fn new() -> Self {
        Self::with_env_prefix(ENV_PREFIX)
    }

    /// Same as [`MarqueeConfigLoader::new`] with a different variable prefix.
    pub fn with_env_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            overrides: Vec::new(),
        }
    }

    /// Force a key (dotted for nested fields) regardless of the environment.
    ///
    /// ```
    /// use marquee_config::MarqueeConfigLoader;
    ///
    /// let cfg = MarqueeConfigLoader::with_env_prefix("MARQUEE_DOCTEST_UNSET")
    ///     .with_override("std_wait_secs", 1.5)
    ///     .with_override("extraction.link_prefix_len", 9_i64)
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(cfg.std_wait_secs, 1.5);
    /// assert_eq!(cfg.extraction.link_prefix_len, 9);
    /// ```
    pub fn with_override(mut self, key: &str, value: impl Into<config::Value>) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    /// Merge sources, expand paths, and validate.
    pub fn load(self) -> Result<MarqueeConfig, ConfigError> {
        let mut builder = Config::builder().add_source(
            Environment::with_prefix(&self.prefix)
                .separator("__")
                .try_parsing(true),
        );
        for (key, value) in self.overrides {
            builder = builder.set_override(key, value)?;
        }
        let mut cfg: MarqueeConfig = builder.build()?.try_deserialize()?;

        cfg.channel_path = expand_path(&cfg.channel_path);
        cfg.dest_dir = expand_path(&cfg.dest_dir);
        cfg.validate()?;

        tracing::debug!(?cfg, "config.loaded");
        Ok(cfg)
    }
}
