use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Agora group-presence hub
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "agora-server", version, about = "Agora group-presence hub")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "AGORA_PORT", default_value = "3000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "AGORA_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./agora.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "AGORA_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Chat/history tuning (loaded from [chat] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub chat: Option<ChatConfig>,

    /// Poll options and seeds (loaded from [poll] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub poll: Option<PollConfig>,
}

/// Tuning for the message log, join snapshot, and idle reaper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Message log bound: appends past this length trigger a trim (default: 500)
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Length the log is trimmed down to, in one batch (default: 400)
    #[serde(default = "default_history_floor")]
    pub history_floor: usize,

    /// Recent messages included in the join snapshot (default: 30)
    #[serde(default = "default_snapshot_tail")]
    pub snapshot_tail: usize,

    /// Seconds of inactivity before a session is reaped (default: 300)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Seconds between idle reaper sweeps (default: 60)
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 500,
            history_floor: 400,
            snapshot_tail: 30,
            idle_timeout_secs: 300,
            reaper_interval_secs: 60,
        }
    }
}

fn default_history_limit() -> usize {
    500
}

fn default_history_floor() -> usize {
    400
}

fn default_snapshot_tail() -> usize {
    30
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_reaper_interval() -> u64 {
    60
}

/// Poll option labels and seeded baseline counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// First option label (default: "yes")
    #[serde(default = "default_option_a")]
    pub option_a: String,

    /// Second option label (default: "no")
    #[serde(default = "default_option_b")]
    pub option_b: String,

    /// Seeded starting count for the first option (default: 150)
    #[serde(default = "default_seed_a")]
    pub seed_a: u64,

    /// Seeded starting count for the second option (default: 100)
    #[serde(default = "default_seed_b")]
    pub seed_b: u64,

    /// Capability key required by resetPoll. Reset is disabled when unset.
    #[serde(default)]
    pub reset_key: Option<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            option_a: "yes".to_string(),
            option_b: "no".to_string(),
            seed_a: 150,
            seed_b: 100,
            reset_key: None,
        }
    }
}

fn default_option_a() -> String {
    "yes".to_string()
}

fn default_option_b() -> String {
    "no".to_string()
}

fn default_seed_a() -> u64 {
    150
}

fn default_seed_b() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            config: "./agora.toml".to_string(),
            json_logs: false,
            generate_config: false,
            chat: Some(ChatConfig::default()),
            poll: Some(PollConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (AGORA_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("AGORA_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Agora Group-Presence Hub Configuration
# Place this file at ./agora.toml or specify with --config <path>
# All settings can be overridden via environment variables (AGORA_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# ---- Chat / History ----
# [chat]

# Message log bound; appends past this trigger a batch trim (default: 500)
# history_limit = 500

# Length the log is trimmed down to in one batch (default: 400)
# history_floor = 400

# Recent messages included in the join snapshot (default: 30)
# snapshot_tail = 30

# Seconds of inactivity before a session is marked offline (default: 300)
# idle_timeout_secs = 300

# Seconds between idle reaper sweeps (default: 60)
# reaper_interval_secs = 60

# ---- Poll ----
# [poll]

# Option labels (default: "yes" / "no")
# option_a = "yes"
# option_b = "no"

# Seeded starting counts — the poll reads as already in progress
# seed_a = 150
# seed_b = 100

# Capability key required by resetPoll. Leave unset to disable reset.
# reset_key = ""
"#
    .to_string()
}
