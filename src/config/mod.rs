pub mod settings;

pub use settings::{Config, ConfigError, IndexingConfig, OllamaConfig};

/// Environment variable toggling index maintenance on.
pub const INDEXING_ENABLED_VAR: &str = "CLINRAG_INDEXING_ENABLED";
/// Environment variable holding the operational endpoint's shared secret.
pub const MIGRATION_KEY_VAR: &str = "CLINRAG_MIGRATION_KEY";

const DEFAULT_MIGRATION_KEY: &str = "clinrag-migration-2026";

/// Per-call mutable configuration. The incremental trigger and the
/// operational endpoint read these at call time rather than capturing
/// them at startup, so they can be toggled without a restart (and tests
/// can inject a fixed state per case).
pub trait FlagProvider: Send + Sync {
    /// Whether index maintenance is enabled at all.
    fn indexing_enabled(&self) -> bool;

    /// Shared secret expected by the operational HTTP endpoint.
    fn migration_key(&self) -> String;
}

/// Production provider: reads the process environment on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvFlags;

impl FlagProvider for EnvFlags {
    #[inline]
    fn indexing_enabled(&self) -> bool {
        std::env::var(INDEXING_ENABLED_VAR).is_ok_and(|value| value == "true")
    }

    #[inline]
    fn migration_key(&self) -> String {
        std::env::var(MIGRATION_KEY_VAR).unwrap_or_else(|_| DEFAULT_MIGRATION_KEY.to_string())
    }
}

/// Fixed provider for tests and embedding callers that manage their own
/// configuration source.
#[derive(Debug, Clone)]
pub struct StaticFlags {
    pub enabled: bool,
    pub key: String,
}

impl StaticFlags {
    #[inline]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            key: DEFAULT_MIGRATION_KEY.to_string(),
        }
    }

    #[inline]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            key: DEFAULT_MIGRATION_KEY.to_string(),
        }
    }
}

impl FlagProvider for StaticFlags {
    #[inline]
    fn indexing_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    fn migration_key(&self) -> String {
        self.key.clone()
    }
}
