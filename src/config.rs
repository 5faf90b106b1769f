use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::services::poller::PollConfig;

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: u64,
    pub admin_emails: Vec<String>,
    pub cors_origin: String,
    pub max_upload_bytes: usize,
    pub worker: WorkerConfig,
    pub llm: LLMConfig,
    pub image: ImageConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub enable_image_sweep: bool,
    pub enable_word_of_day_warmup: bool,
}

#[derive(Clone)]
pub struct LLMConfig {
    pub mock: bool,
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub comfyui_url: String,
    /// Workflow JSON file; the embedded default is used when unset.
    pub workflow_path: Option<String>,
    pub positive_node: String,
    pub negative_node: String,
    pub output_node: String,
    pub poll_attempts: u32,
    pub poll_delay_ms: u64,
    pub poll_max_delay_ms: u64,
    pub poll_multiplier: f64,
}

impl ImageConfig {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            max_attempts: self.poll_attempts,
            initial_delay: Duration::from_millis(self.poll_delay_ms),
            max_delay: Duration::from_millis(self.poll_max_delay_ms.max(self.poll_delay_ms)),
            multiplier: self.poll_multiplier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    Memory,
    S3,
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "s3" => Ok(Self::S3),
            other => Err(format!("unknown storage mode: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub public_base_url: String,
    pub key_prefix: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("jwt_secret", &"***REDACTED***")
            .field("jwt_expires_in_hours", &self.jwt_expires_in_hours)
            .field("admin_emails", &self.admin_emails)
            .field("cors_origin", &self.cors_origin)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("worker", &self.worker)
            .field("llm", &self.llm)
            .field("image", &self.image)
            .field("storage", &self.storage)
            .finish()
    }
}

impl fmt::Debug for LLMConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LLMConfig")
            .field("mock", &self.mock)
            .field("api_url", &self.api_url)
            .field("api_key", &"***REDACTED***")
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("mode", &self.mode)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &"***REDACTED***")
            .field("secret_access_key", &"***REDACTED***")
            .field("public_base_url", &self.public_base_url)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 5000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/vocab.sled"),
            jwt_secret: env_or(
                "JWT_SECRET",
                "change_me_to_random_64_chars_change_me_to_random_64_chars",
            ),
            jwt_expires_in_hours: env_or_parse("JWT_EXPIRES_IN_HOURS", 24_u64),
            admin_emails: env_list("ADMIN_EMAILS"),
            cors_origin: env_or("CORS_ORIGIN", "*"),
            max_upload_bytes: env_or_parse("MAX_UPLOAD_BYTES", 5 * 1024 * 1024_usize),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                enable_image_sweep: env_or_bool("ENABLE_IMAGE_SWEEP", true),
                enable_word_of_day_warmup: env_or_bool("ENABLE_WORD_OF_DAY_WARMUP", true),
            },
            llm: LLMConfig {
                mock: env_or_bool("LLM_MOCK", true),
                api_url: env_or("LLM_API_URL", "https://api.openai.com/v1"),
                api_key: env_or("LLM_API_KEY", ""),
                model: env_or("LLM_MODEL", "gpt-4.1-nano"),
                timeout_secs: env_or_parse("LLM_TIMEOUT_SECS", 30_u64),
            },
            image: ImageConfig {
                comfyui_url: env_or("COMFYUI_URL", "http://127.0.0.1:8188"),
                workflow_path: env_opt("COMFYUI_WORKFLOW_PATH"),
                positive_node: env_or("COMFYUI_POSITIVE_NODE", "6"),
                negative_node: env_or("COMFYUI_NEGATIVE_NODE", "7"),
                output_node: env_or("COMFYUI_OUTPUT_NODE", crate::constants::DEFAULT_OUTPUT_NODE),
                poll_attempts: env_or_parse("IMAGE_POLL_ATTEMPTS", 3_u32),
                poll_delay_ms: env_or_parse("IMAGE_POLL_DELAY_MS", 4000_u64),
                poll_max_delay_ms: env_or_parse("IMAGE_POLL_MAX_DELAY_MS", 30_000_u64),
                poll_multiplier: env_or_parse("IMAGE_POLL_MULTIPLIER", 1.0_f64),
            },
            storage: StorageConfig {
                mode: env_or_parse("STORAGE_MODE", StorageMode::Memory),
                bucket: env_or("S3_BUCKET", ""),
                region: env_or("S3_REGION", "us-east-1"),
                endpoint: env_opt("S3_ENDPOINT"),
                access_key_id: env_or("S3_ACCESS_KEY_ID", ""),
                secret_access_key: env_or("S3_SECRET_ACCESS_KEY", ""),
                public_base_url: env_or("S3_PUBLIC_BASE_URL", ""),
                key_prefix: env_or("S3_KEY_PREFIX", "images"),
            },
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim();
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_list(key: &str) -> Vec<String> {
    env::var(key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
