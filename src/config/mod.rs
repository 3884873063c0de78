//! Configuration management.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration for educhat.
#[derive(Debug, Clone)]
pub struct EduchatConfig {
    /// Directory for per-user snapshot files.
    pub data_dir: PathBuf,
    /// Directory holding the knowledge document corpus.
    pub docs_dir: PathBuf,
    /// Maximum turns kept per user in the history store.
    pub max_history_turns: usize,
    /// Maximum users tracked before LRU eviction.
    pub max_tracked_users: usize,
    /// Social state TTL in seconds.
    pub social_ttl_secs: u64,
    /// Maximum age of a persisted snapshot before it is discarded.
    pub snapshot_max_age_secs: u64,
    /// Maximum serialized snapshot size before history is truncated.
    pub snapshot_max_bytes: usize,
    /// CTA eligibility thresholds.
    pub cta: CtaPolicy,
    /// Router (classification) model configuration.
    pub router_llm: LlmConfig,
    /// Generator (response) model configuration.
    pub generator_llm: LlmConfig,
}

/// CTA eligibility thresholds.
///
/// The business rationale behind these numbers is undocumented upstream, so
/// they are configuration rather than constants.
#[derive(Debug, Clone)]
pub struct CtaPolicy {
    /// Maximum discount CTAs over a whole dialog.
    pub max_discount_ctas: u32,
    /// Minimum messages between CTAs of any kind.
    pub min_messages_between_ctas: usize,
    /// Anxiety CTAs are withheld until the signal recurred this many times.
    pub anxiety_min_streak: u32,
    /// Price-sensitive CTAs fire only on even occurrences of the signal streak.
    pub price_sensitive_even_parity: bool,
    /// Messages blocked after a hard refusal ("stop suggesting").
    pub hard_refusal_block: usize,
    /// Messages blocked after a soft refusal ("I'll think about it").
    pub soft_refusal_block: usize,
    /// CTA frequency modifier per refusal count; index clamps to the last entry.
    pub frequency_ladder: Vec<f32>,
}

impl Default for CtaPolicy {
    fn default() -> Self {
        Self {
            max_discount_ctas: 2,
            min_messages_between_ctas: 3,
            anxiety_min_streak: 2,
            price_sensitive_even_parity: true,
            hard_refusal_block: 7,
            soft_refusal_block: 3,
            frequency_ladder: vec![1.0, 0.7, 0.4, 0.2],
        }
    }
}

impl CtaPolicy {
    /// Returns the CTA frequency modifier for a refusal count.
    #[must_use]
    pub fn frequency_modifier(&self, refusal_count: u32) -> f32 {
        let idx = (refusal_count as usize).min(self.frequency_ladder.len().saturating_sub(1));
        self.frequency_ladder.get(idx).copied().unwrap_or(1.0)
    }
}

/// LLM provider configuration for one pipeline role.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Provider name: "openai" or "ollama".
    pub provider: LlmProviderKind,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL for the provider (for self-hosted or proxied endpoints).
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProviderKind {
    /// `OpenAI`-compatible chat completions API.
    #[default]
    OpenAi,
    /// Ollama (local).
    Ollama,
}

impl LlmProviderKind {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "ollama" => Self::Ollama,
            _ => Self::OpenAi,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Snapshot directory.
    pub data_dir: Option<String>,
    /// Document corpus directory.
    pub docs_dir: Option<String>,
    /// History depth per user.
    pub max_history_turns: Option<usize>,
    /// Tracked-user cap.
    pub max_tracked_users: Option<usize>,
    /// Social TTL in seconds.
    pub social_ttl_secs: Option<u64>,
    /// Snapshot max age in seconds.
    pub snapshot_max_age_secs: Option<u64>,
    /// Snapshot size cap in bytes.
    pub snapshot_max_bytes: Option<usize>,
    /// CTA policy section.
    pub cta: Option<ConfigFileCta>,
    /// Router model section.
    pub router_llm: Option<ConfigFileLlm>,
    /// Generator model section.
    pub generator_llm: Option<ConfigFileLlm>,
}

/// CTA section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileCta {
    /// Discount CTA cap per dialog.
    pub max_discount_ctas: Option<u32>,
    /// Minimum messages between CTAs.
    pub min_messages_between_ctas: Option<usize>,
    /// Anxiety streak threshold.
    pub anxiety_min_streak: Option<u32>,
    /// Price-sensitive even-parity rule.
    pub price_sensitive_even_parity: Option<bool>,
    /// Hard refusal block length.
    pub hard_refusal_block: Option<usize>,
    /// Soft refusal block length.
    pub soft_refusal_block: Option<usize>,
    /// Frequency modifier ladder.
    pub frequency_ladder: Option<Vec<f32>>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for EduchatConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".educhat/state"),
            docs_dir: PathBuf::from("docs"),
            max_history_turns: 10,
            max_tracked_users: 500,
            social_ttl_secs: 12 * 60 * 60,
            snapshot_max_age_secs: 7 * 24 * 60 * 60,
            snapshot_max_bytes: 32 * 1024,
            cta: CtaPolicy::default(),
            router_llm: LlmConfig::default(),
            generator_llm: LlmConfig::default(),
        }
    }
}

impl EduchatConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/educhat/config.toml` and
    /// the macOS equivalent), then falls back to defaults. Environment
    /// overrides apply last.
    #[must_use]
    pub fn load_default() -> Self {
        let config = directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("educhat").join("config.toml"))
            .filter(|p| p.exists())
            .and_then(|p| Self::load_from_file(&p).ok())
            .unwrap_or_default();
        config.with_env_overrides()
    }

    /// Builds a configuration from a parsed config file.
    #[must_use]
    pub fn from_config_file(file: ConfigFile) -> Self {
        let defaults = Self::default();
        let cta_file = file.cta.unwrap_or_default();
        let cta_defaults = CtaPolicy::default();
        Self {
            data_dir: file.data_dir.map_or(defaults.data_dir, PathBuf::from),
            docs_dir: file.docs_dir.map_or(defaults.docs_dir, PathBuf::from),
            max_history_turns: file.max_history_turns.unwrap_or(defaults.max_history_turns),
            max_tracked_users: file.max_tracked_users.unwrap_or(defaults.max_tracked_users),
            social_ttl_secs: file.social_ttl_secs.unwrap_or(defaults.social_ttl_secs),
            snapshot_max_age_secs: file
                .snapshot_max_age_secs
                .unwrap_or(defaults.snapshot_max_age_secs),
            snapshot_max_bytes: file
                .snapshot_max_bytes
                .unwrap_or(defaults.snapshot_max_bytes),
            cta: CtaPolicy {
                max_discount_ctas: cta_file
                    .max_discount_ctas
                    .unwrap_or(cta_defaults.max_discount_ctas),
                min_messages_between_ctas: cta_file
                    .min_messages_between_ctas
                    .unwrap_or(cta_defaults.min_messages_between_ctas),
                anxiety_min_streak: cta_file
                    .anxiety_min_streak
                    .unwrap_or(cta_defaults.anxiety_min_streak),
                price_sensitive_even_parity: cta_file
                    .price_sensitive_even_parity
                    .unwrap_or(cta_defaults.price_sensitive_even_parity),
                hard_refusal_block: cta_file
                    .hard_refusal_block
                    .unwrap_or(cta_defaults.hard_refusal_block),
                soft_refusal_block: cta_file
                    .soft_refusal_block
                    .unwrap_or(cta_defaults.soft_refusal_block),
                frequency_ladder: cta_file
                    .frequency_ladder
                    .unwrap_or(cta_defaults.frequency_ladder),
            },
            router_llm: llm_from_file(file.router_llm.unwrap_or_default()),
            generator_llm: llm_from_file(file.generator_llm.unwrap_or_default()),
        }
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("EDUCHAT_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("EDUCHAT_DOCS_DIR") {
            self.docs_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("EDUCHAT_MAX_HISTORY_TURNS") {
            if let Ok(n) = v.parse() {
                self.max_history_turns = n;
            }
        }
        if let Ok(v) = std::env::var("EDUCHAT_MAX_TRACKED_USERS") {
            if let Ok(n) = v.parse() {
                self.max_tracked_users = n;
            }
        }
        if let Ok(v) = std::env::var("EDUCHAT_API_KEY") {
            self.router_llm.api_key.get_or_insert(v.clone());
            self.generator_llm.api_key.get_or_insert(v);
        }
        self
    }
}

fn llm_from_file(file: ConfigFileLlm) -> LlmConfig {
    LlmConfig {
        provider: file
            .provider
            .as_deref()
            .map(LlmProviderKind::parse)
            .unwrap_or_default(),
        model: file.model,
        api_key: file.api_key,
        base_url: file.base_url,
        timeout_ms: file.timeout_ms,
        connect_timeout_ms: file.connect_timeout_ms,
    }
}
