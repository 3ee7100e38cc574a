use crate::types::{Money, Rating};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url:      String,
    pub anon_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Minimum seconds between two remote pulls of the same entity type.
    pub cooldown_secs:            u64,
    /// Rows per remote upsert request.
    pub push_batch_size:          usize,
    pub outbox_base_backoff_secs: i64,
    pub outbox_max_backoff_secs:  i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 5,
            push_batch_size: 100,
            outbox_base_backoff_secs: 30,
            outbox_max_backoff_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicsConfig {
    /// Stored salaries within this distance of the table are left alone.
    pub salary_epsilon:       Money,
    pub market_value_epsilon: Money,
    /// Budget credit per win in the weekly victory bonus.
    pub weekly_victory_bonus: Money,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            salary_epsilon: 1_000,
            market_value_epsilon: 100_000,
            weekly_victory_bonus: 15_000_000,
        }
    }
}

/// Elite-player reputation gate. Shipped disabled and without thresholds;
/// both must be set explicitly for the rule to run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EliteGateConfig {
    pub enabled:            bool,
    pub min_overall:        Option<Rating>,
    pub max_table_position: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfferRules {
    /// Minimum fee as a percentage of computed market value.
    pub min_fee_percent: i64,
    pub elite_gate:      EliteGateConfig,
}

impl Default for OfferRules {
    fn default() -> Self {
        Self {
            min_fee_percent: 80,
            elite_gate: EliteGateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LigaConfig {
    /// The single "use remote backend" flag. When false no remote call is made.
    pub use_remote: bool,
    pub remote:     Option<RemoteConfig>,
    pub db_path:    String,
    pub sync:       SyncSettings,
    pub economics:  EconomicsConfig,
    pub offers:     OfferRules,
}

impl Default for LigaConfig {
    fn default() -> Self {
        Self {
            use_remote: false,
            remote: None,
            db_path: "liga.db".into(),
            sync: SyncSettings::default(),
            economics: EconomicsConfig::default(),
            offers: OfferRules::default(),
        }
    }
}

impl LigaConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    /// In tests, use LigaConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: LigaConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(config)
    }

    /// Override fields from `LIGA_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(flag) = std::env::var("LIGA_USE_REMOTE") {
            self.use_remote = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
        if let Ok(path) = std::env::var("LIGA_DB_PATH") {
            self.db_path = path;
        }
        let url = std::env::var("LIGA_REMOTE_URL").ok();
        let key = std::env::var("LIGA_REMOTE_ANON_KEY").ok();
        if let (Some(url), Some(anon_key)) = (url, key) {
            self.remote = Some(RemoteConfig { url, anon_key });
        }
    }

    /// Remote settings, only when the feature flag is on.
    pub fn active_remote(&self) -> Option<&RemoteConfig> {
        if self.use_remote {
            self.remote.as_ref()
        } else {
            None
        }
    }

    /// Defaults with an in-memory database path, for unit tests.
    pub fn default_test() -> Self {
        Self {
            db_path: ":memory:".into(),
            ..Self::default()
        }
    }
}
