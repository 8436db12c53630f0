//! Configuration types.
//!
//! Every section has a `Default` and a `from_env` that reads its variables,
//! falling back to the default on anything missing or unparsable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::pipeline::dedup::EvictionPolicy;

/// Read `key` and parse it, or fall back to `default`.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

fn env_secret(key: &str) -> Option<SecretString> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub image: ImageConfig,
    pub storage: StorageConfig,
    pub dedup: DedupConfig,
    pub rate: RateConfig,
    pub bot: BotConfig,
    pub twitter: TwitterConfig,
}

impl AppConfig {
    /// Load everything from the environment. Only the text-model key is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env(),
            llm: LlmConfig::from_env()?,
            image: ImageConfig::from_env(),
            storage: StorageConfig::from_env(),
            dedup: DedupConfig::from_env()?,
            rate: RateConfig::from_env(),
            bot: BotConfig::from_env(),
            twitter: TwitterConfig::from_env(),
        })
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_or("TAROT_PORT", Self::default().port),
        }
    }
}

/// Remote image generation and the local fallback pool.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// No key means the generator is never called and every reading uses the pool.
    pub api_key: Option<SecretString>,
    pub endpoint: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub timeout: Duration,
    /// Pool entries are `{fallback_base_url}/reading-NN`.
    pub fallback_base_url: String,
    pub fallback_count: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.venice.ai/api/v1/image/generate".to_string(),
            model: "fluently-xl".to_string(),
            width: 1024,
            height: 1024,
            timeout: Duration::from_secs(30),
            fallback_base_url: "https://res.cloudinary.com/demo/image/upload/v1/tarot".to_string(),
            fallback_count: 3,
        }
    }
}

impl ImageConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let fallback_base_url = std::env::var("TAROT_FALLBACK_IMAGE_BASE").unwrap_or_else(|_| {
            match std::env::var("CLOUDINARY_CLOUD_NAME") {
                Ok(cloud) => format!("https://res.cloudinary.com/{cloud}/image/upload/v1/tarot"),
                Err(_) => defaults.fallback_base_url.clone(),
            }
        });

        Self {
            api_key: env_secret("VENICE_API_KEY"),
            endpoint: std::env::var("TAROT_IMAGE_ENDPOINT").unwrap_or(defaults.endpoint),
            model: std::env::var("TAROT_IMAGE_MODEL").unwrap_or(defaults.model),
            width: env_or("TAROT_IMAGE_WIDTH", defaults.width),
            height: env_or("TAROT_IMAGE_HEIGHT", defaults.height),
            timeout: Duration::from_secs(env_or(
                "TAROT_IMAGE_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            fallback_base_url,
            fallback_count: env_or("TAROT_FALLBACK_IMAGE_COUNT", defaults.fallback_count).max(1),
        }
    }
}

/// Object storage for generated images.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// No key means generated images cannot be persisted and the pool is used.
    pub api_key: Option<SecretString>,
    pub endpoint: String,
    pub gateway_url: String,
    pub timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.filebase.io/v1/ipfs".to_string(),
            gateway_url: "https://ipfs.filebase.io/ipfs".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env_secret("FILEBASE_API_KEY"),
            endpoint: std::env::var("TAROT_STORAGE_ENDPOINT").unwrap_or(defaults.endpoint),
            gateway_url: std::env::var("TAROT_STORAGE_GATEWAY").unwrap_or(defaults.gateway_url),
            timeout: Duration::from_secs(env_or(
                "TAROT_STORAGE_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
        }
    }
}

/// Where the processed-id set is mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupBackend {
    Memory,
    JsonFile(PathBuf),
    LibSql(PathBuf),
}

/// Dedup set sizing and persistence.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub ceiling: usize,
    pub eviction: EvictionPolicy,
    pub backend: DedupBackend,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ceiling: 1000,
            eviction: EvictionPolicy::TruncateOldest { remove: 500 },
            backend: DedupBackend::JsonFile(PathBuf::from("./data/processed_casts.json")),
        }
    }
}

impl DedupConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ceiling = env_or("TAROT_DEDUP_CEILING", defaults.ceiling);

        let eviction = match std::env::var("TAROT_DEDUP_EVICTION")
            .unwrap_or_else(|_| "truncate".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "truncate" => EvictionPolicy::TruncateOldest {
                remove: env_or("TAROT_DEDUP_TRUNCATE", ceiling / 2),
            },
            "clear" => EvictionPolicy::Clear,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "TAROT_DEDUP_EVICTION".to_string(),
                    message: format!("expected 'truncate' or 'clear', got '{other}'"),
                });
            }
        };

        let path = std::env::var("TAROT_DEDUP_PATH").map(PathBuf::from);
        let backend = match std::env::var("TAROT_DEDUP_STORE")
            .unwrap_or_else(|_| "json".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => DedupBackend::Memory,
            "json" => DedupBackend::JsonFile(
                path.unwrap_or_else(|_| PathBuf::from("./data/processed_casts.json")),
            ),
            "libsql" => DedupBackend::LibSql(
                path.unwrap_or_else(|_| PathBuf::from("./data/tarot-bot.db")),
            ),
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "TAROT_DEDUP_STORE".to_string(),
                    message: format!("expected 'memory', 'json' or 'libsql', got '{other}'"),
                });
            }
        };

        Ok(Self {
            ceiling,
            eviction,
            backend,
        })
    }
}

/// Global debounce plus the per-IP limiter on `/reading`.
#[derive(Debug, Clone)]
pub struct RateConfig {
    pub debounce: Duration,
    pub ip_max_requests: u32,
    pub ip_window: Duration,
    pub admin_token: SecretString,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            ip_max_requests: 10,
            ip_window: Duration::from_secs(24 * 60 * 60),
            // Unguessable unless configured.
            admin_token: SecretString::from(uuid::Uuid::new_v4().simple().to_string()),
        }
    }
}

impl RateConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            debounce: Duration::from_millis(env_or(
                "TAROT_DEBOUNCE_MS",
                defaults.debounce.as_millis() as u64,
            )),
            ip_max_requests: env_or("TAROT_IP_MAX_REQUESTS", defaults.ip_max_requests),
            ip_window: Duration::from_secs(env_or(
                "TAROT_IP_WINDOW_SECS",
                defaults.ip_window.as_secs(),
            )),
            admin_token: env_secret("ADMIN_TOKEN").unwrap_or(defaults.admin_token),
        }
    }
}

/// Social platform identity and polling.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Mention token that addresses the bot, compared case-insensitively.
    pub invocation_prefix: String,
    pub neynar_api_key: Option<SecretString>,
    pub signer_uuid: Option<String>,
    pub api_base_url: String,
    pub channel_id: String,
    pub poll_interval: Duration,
    pub poll_limit: usize,
    /// Per-request timeout for Neynar calls.
    pub http_timeout: Duration,
    /// Log replies instead of publishing them.
    pub dry_run: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            invocation_prefix: "@pentacle-tarot".to_string(),
            neynar_api_key: None,
            signer_uuid: None,
            api_base_url: "https://api.neynar.com/v2/farcaster".to_string(),
            channel_id: "tarot".to_string(),
            poll_interval: Duration::from_secs(10),
            poll_limit: 20,
            http_timeout: Duration::from_secs(30),
            dry_run: false,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            invocation_prefix: std::env::var("TAROT_INVOCATION_PREFIX")
                .unwrap_or(defaults.invocation_prefix),
            neynar_api_key: env_secret("NEYNAR_API_KEY"),
            signer_uuid: std::env::var("FARCASTER_SIGNER_UUID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            api_base_url: std::env::var("TAROT_NEYNAR_BASE_URL").unwrap_or(defaults.api_base_url),
            channel_id: std::env::var("TAROT_CHANNEL_ID").unwrap_or(defaults.channel_id),
            poll_interval: Duration::from_secs(env_or(
                "TAROT_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )),
            poll_limit: env_or("TAROT_POLL_LIMIT", defaults.poll_limit),
            http_timeout: Duration::from_secs(env_or(
                "TAROT_NEYNAR_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )),
            dry_run: env_flag("TAROT_DRY_RUN"),
        }
    }

    /// Publishing needs both the API key and a signer.
    pub fn can_publish(&self) -> bool {
        !self.dry_run && self.neynar_api_key.is_some() && self.signer_uuid.is_some()
    }
}

/// Twitter reply credentials. Mentions arrive through the webhook.
#[derive(Debug, Clone)]
pub struct TwitterConfig {
    /// OAuth 2.0 user-context token with `tweet.write`. No token means
    /// Twitter mentions are dropped before any reading is generated.
    pub user_token: Option<SecretString>,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            user_token: None,
            api_base_url: "https://api.twitter.com/2".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl TwitterConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            user_token: env_secret("TWITTER_USER_TOKEN"),
            api_base_url: std::env::var("TAROT_TWITTER_BASE_URL").unwrap_or(defaults.api_base_url),
            timeout: Duration::from_secs(env_or(
                "TAROT_TWITTER_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
        }
    }
}
