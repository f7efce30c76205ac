use serde::Deserialize;

use crate::types::Destination;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `AUTOPILOT__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub outreach: OutreachConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Follow-up cycle settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between cycles when the binary drives the scheduler itself.
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_max_concurrent_prospects")]
    pub max_concurrent_prospects: usize,
    /// How far a claimed prospect's due time is pushed while its dispatch is
    /// in flight.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_dispatch_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts per stage within one cycle. Capped at 2.
    #[serde(default = "default_dispatch_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_from_email")]
    pub from_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_publish_timeout_ms")]
    pub timeout_ms: u64,
}

/// Defaults applied to campaigns created without an explicit cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct OutreachConfig {
    #[serde(default = "default_follow_up_delays")]
    pub default_follow_up_delays: Vec<u32>,
    #[serde(default = "default_follow_up_enabled")]
    pub default_follow_up_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_research_enabled")]
    pub enabled: bool,
    #[serde(default = "default_research_workers")]
    pub workers: usize,
    #[serde(default = "default_research_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_research_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_research_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_research_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistributionConfig {
    #[serde(default = "default_destinations")]
    pub destinations: Vec<Destination>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_positive_threshold")]
    pub positive_threshold: f64,
    #[serde(default = "default_negative_threshold")]
    pub negative_threshold: f64,
    #[serde(default = "default_negative_keywords")]
    pub negative_keywords: Vec<String>,
    #[serde(default = "default_positive_keywords")]
    pub positive_keywords: Vec<String>,
}

// Default functions
fn default_node_id() -> String {
    "autopilot-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_cycle_interval_secs() -> u64 {
    300
}
fn default_max_concurrent_prospects() -> usize {
    16
}
fn default_claim_lease_secs() -> u64 {
    900
}
fn default_dispatch_timeout_ms() -> u64 {
    10_000
}
fn default_dispatch_max_attempts() -> u32 {
    2
}
fn default_from_email() -> String {
    "outreach@localhost".to_string()
}
fn default_publish_timeout_ms() -> u64 {
    30_000
}
fn default_follow_up_delays() -> Vec<u32> {
    vec![7, 14, 21]
}
fn default_follow_up_enabled() -> bool {
    true
}
fn default_research_enabled() -> bool {
    true
}
fn default_research_workers() -> usize {
    4
}
fn default_research_queue_capacity() -> usize {
    1024
}
fn default_research_max_attempts() -> u32 {
    3
}
fn default_research_base_backoff_ms() -> u64 {
    2_000
}
fn default_research_max_jitter_ms() -> u64 {
    5_000
}
fn default_destinations() -> Vec<Destination> {
    vec![
        Destination::new("telegraph", "Telegraph.ph", 1),
        Destination::new("writeas", "Write.as", 2),
        Destination::new("medium", "Medium.com", 3),
        Destination::new("devto", "Dev.to", 4),
        Destination::new("linkedin", "LinkedIn Articles", 5),
        Destination::new("hashnode", "Hashnode", 6),
        Destination::new("substack", "Substack", 7),
    ]
}
fn default_positive_threshold() -> f64 {
    0.2
}
fn default_negative_threshold() -> f64 {
    -0.2
}
fn default_negative_keywords() -> Vec<String> {
    [
        "not interested",
        "no thank you",
        "no thanks",
        "decline",
        "busy",
        "already have",
        "unsubscribe",
        "remove me",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_positive_keywords() -> Vec<String> {
    ["interested", "yes", "sounds good", "love to", "excited", "perfect"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval_secs(),
            max_concurrent_prospects: default_max_concurrent_prospects(),
            claim_lease_secs: default_claim_lease_secs(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_dispatch_timeout_ms(),
            max_attempts: default_dispatch_max_attempts(),
            from_email: default_from_email(),
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_publish_timeout_ms(),
        }
    }
}

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            default_follow_up_delays: default_follow_up_delays(),
            default_follow_up_enabled: default_follow_up_enabled(),
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enabled: default_research_enabled(),
            workers: default_research_workers(),
            queue_capacity: default_research_queue_capacity(),
            max_attempts: default_research_max_attempts(),
            base_backoff_ms: default_research_base_backoff_ms(),
            max_jitter_ms: default_research_max_jitter_ms(),
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            destinations: default_destinations(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            positive_threshold: default_positive_threshold(),
            negative_threshold: default_negative_threshold(),
            negative_keywords: default_negative_keywords(),
            positive_keywords: default_positive_keywords(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            scheduler: SchedulerConfig::default(),
            dispatch: DispatchConfig::default(),
            publish: PublishConfig::default(),
            outreach: OutreachConfig::default(),
            research: ResearchConfig::default(),
            distribution: DistributionConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables (which take precedence).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("AUTOPILOT")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("outreach.default_follow_up_delays"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
