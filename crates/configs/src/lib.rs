//! # Settings
//!
//! Layered configuration for the report desk:
//!
//! 1. built-in defaults
//! 2. `config/default.toml` (optional)
//! 3. `config/local.toml` (optional, not checked in)
//! 4. environment variables `REPORTS__{SECTION}__{KEY}`, after `.env` is loaded
//!
//! Lists (`server.cors_origins`, `access.staff`) accept comma-separated env values.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use domains::{AccessMode, AccessPolicy, ArchiveMode, AttachmentPolicy, PolicyProfile, Principal};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "REPORTS";
const ENV_SEPARATOR: &str = "__";
const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub tenant: TenantSettings,
    pub policy: PolicySettings,
    pub storage: StorageSettings,
    pub auth: AuthSettings,
    pub access: AccessSettings,
    pub pipeline: PipelineSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantSettings {
    /// Namespaces the report collection path.
    pub app_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicySettings {
    pub profile: PolicyProfile,
    /// Overrides the profile's ceiling when set.
    pub max_file_bytes: Option<u64>,
    pub archive_mode: ArchiveMode,
}

impl PolicySettings {
    pub fn attachment_policy(&self) -> AttachmentPolicy {
        let policy = AttachmentPolicy::for_profile(self.profile, self.archive_mode);
        match self.max_file_bytes {
            Some(max) => policy.with_max_file_bytes(max),
            None => policy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    Local,
    Memory,
    S3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub media_backend: MediaBackend,
    pub media_root: String,
    pub public_base_url: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub document_backend: DocumentBackend,
    pub database_url: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    /// No default: every deployment signs sessions with its own key.
    pub jwt_secret: Option<SecretString>,
    pub session_ttl_mins: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessSettings {
    pub mode: AccessMode,
    pub staff: Vec<String>,
}

impl AccessSettings {
    pub fn access_policy(&self) -> AccessPolicy {
        AccessPolicy {
            mode: self.mode,
            staff: self.staff.iter().map(|s| Principal::new(s.trim())).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// 0 disables the per-stage timeout.
    pub stage_timeout_secs: u64,
}

impl PipelineSettings {
    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_secs > 0).then(|| Duration::from_secs(self.stage_timeout_secs))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub format: LogFormat,
    pub filter: String,
}

impl Settings {
    /// Loads `.env`, then the layered sources rooted at `./config`.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::load_from(Path::new("config"), None)
    }

    /// Loads from `dir`; `env` replaces the process environment when given.
    pub fn load_from(dir: &Path, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("server.request_timeout_secs", 300)?
            .set_default("tenant.app_id", "report-desk")?
            .set_default("policy.profile", "standard")?
            .set_default("policy.archive_mode", "archive")?
            .set_default("storage.media_backend", "local")?
            .set_default("storage.media_root", "./data/media")?
            .set_default("storage.public_base_url", "/media")?
            .set_default("storage.document_backend", "memory")?
            .set_default("storage.database_url", "sqlite://./data/reports.db")?
            .set_default("auth.session_ttl_mins", 720)?
            .set_default("access.mode", "open")?
            .set_default("access.staff", Vec::<String>::new())?
            .set_default("pipeline.stage_timeout_secs", 120)?
            .set_default("logging.format", "pretty")?
            .set_default("logging.filter", "info,tower_http=info")?
            .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
            .add_source(File::with_name(&dir.join("local").to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .with_list_parse_key("access.staff")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant.app_id.trim().is_empty() {
            return Err(ConfigError::Invalid("tenant.app_id must not be empty".into()));
        }
        if self.policy.max_file_bytes == Some(0) {
            return Err(ConfigError::Invalid("policy.max_file_bytes must be greater than zero".into()));
        }
        if self.access.mode == AccessMode::Staff && self.access.staff.is_empty() {
            return Err(ConfigError::Invalid("access.mode = staff requires at least one access.staff entry".into()));
        }
        let Some(secret) = &self.auth.jwt_secret else {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret is required (set {ENV_PREFIX}__AUTH__JWT_SECRET)"
            )));
        };
        if secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "auth.jwt_secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.auth.session_ttl_mins <= 0 {
            return Err(ConfigError::Invalid("auth.session_ttl_mins must be positive".into()));
        }
        // The request timeout wraps the whole submission: multipart read, uploads, then the write.
        if let Some(stage) = self.pipeline.stage_timeout() {
            let needed = stage.as_secs().saturating_mul(2);
            if self.server.request_timeout_secs <= needed {
                return Err(ConfigError::Invalid(format!(
                    "server.request_timeout_secs ({}) must exceed twice pipeline.stage_timeout_secs ({}s)",
                    self.server.request_timeout_secs, needed
                )));
            }
        }
        if self.storage.media_backend == MediaBackend::S3 && self.storage.s3_bucket.is_none() {
            return Err(ConfigError::Invalid("storage.s3_bucket is required for the s3 media backend".into()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: (&str, &str) = ("REPORTS__AUTH__JWT_SECRET", "settings-test-secret-0123");

    /// Builds an environment that always carries a signing key.
    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            std::iter::once(&TEST_SECRET)
                .chain(pairs)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_load_without_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(dir.path(), env(&[])).unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.tenant.app_id, "report-desk");
        assert_eq!(settings.storage.media_backend, MediaBackend::Local);
        assert_eq!(settings.pipeline.stage_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(settings.policy.attachment_policy(), AttachmentPolicy::default());
    }

    #[test]
    fn files_then_env_override_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("default.toml"),
            "[tenant]\napp_id = \"from-default\"\n[policy]\nprofile = \"compact\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("local.toml"), "[tenant]\napp_id = \"from-local\"\n").unwrap();

        let settings = Settings::load_from(
            dir.path(),
            env(&[
                ("REPORTS__SERVER__PORT", "9090"),
                ("REPORTS__ACCESS__MODE", "staff"),
                ("REPORTS__ACCESS__STAFF", "alice, bob"),
                ("REPORTS__POLICY__ARCHIVE_MODE", "attestation"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.tenant.app_id, "from-local");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.policy.attachment_policy().max_file_bytes, 1024 * 1024);
        assert_eq!(settings.policy.archive_mode, ArchiveMode::Attestation);
        let access = settings.access.access_policy();
        assert_eq!(access.mode, AccessMode::Staff);
        assert!(access.staff.contains(&Principal::new("bob")));
    }

    #[test]
    fn validation_rejects_unusable_settings() {
        let dir = tempfile::tempdir().unwrap();
        let bad = [
            ("REPORTS__TENANT__APP_ID", " "),
            ("REPORTS__POLICY__MAX_FILE_BYTES", "0"),
            ("REPORTS__ACCESS__MODE", "staff"),
            ("REPORTS__AUTH__JWT_SECRET", "short"),
        ];
        for (key, value) in bad {
            let err = Settings::load_from(dir.path(), env(&[(key, value)])).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{key} should be rejected");
        }
    }

    #[test]
    fn signing_key_has_no_built_in_default() {
        let dir = tempfile::tempdir().unwrap();
        let staff_without_key: HashMap<String, String> = [
            ("REPORTS__ACCESS__MODE", "staff"),
            ("REPORTS__ACCESS__STAFF", "staff-1"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let err = Settings::load_from(dir.path(), Some(staff_without_key)).unwrap_err();
        assert!(
            matches!(&err, ConfigError::Invalid(msg) if msg.contains("auth.jwt_secret is required")),
            "{err}"
        );

        let settings = Settings::load_from(dir.path(), env(&[])).unwrap();
        let key = settings.auth.jwt_secret.as_ref().unwrap();
        assert_eq!(key.expose_secret(), TEST_SECRET.1);
    }

    #[test]
    fn request_timeout_must_outlast_both_stages() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(
            dir.path(),
            env(&[
                ("REPORTS__SERVER__REQUEST_TIMEOUT_SECS", "30"),
                ("REPORTS__PIPELINE__STAGE_TIMEOUT_SECS", "120"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("request_timeout_secs")));

        let settings = Settings::load_from(
            dir.path(),
            env(&[
                ("REPORTS__SERVER__REQUEST_TIMEOUT_SECS", "30"),
                ("REPORTS__PIPELINE__STAGE_TIMEOUT_SECS", "0"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.server.request_timeout_secs, 30);
    }

    #[test]
    fn zero_stage_timeout_disables_it() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(dir.path(), env(&[("REPORTS__PIPELINE__STAGE_TIMEOUT_SECS", "0")])).unwrap();
        assert_eq!(settings.pipeline.stage_timeout(), None);
    }
}
