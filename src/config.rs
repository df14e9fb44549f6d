use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Process-wide configuration, read once at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Bot API token. Startup refuses to run when this is left empty.
    #[serde(default)]
    pub telegram_token: String,

    /// Channel users must join before the bot relays their requests.
    /// `@username` or a numeric `-100...` id; unset disables the check.
    pub channel_id: Option<String>,

    /// Social profiles users are asked to follow. A platform without a
    /// configured URL is not part of the gate.
    pub instagram_url: Option<String>,
    pub youtube_url: Option<String>,

    /// SQLite database location.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_database_file() -> String {
    "savol_relay.db".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(File::with_name("config/default").required(false))
            // Add in the current environment file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in a local configuration file
            // This file shouldn't be checked into git
            .add_source(File::with_name("config/local").required(false))
            // Add in settings from the environment (with a prefix of APP)
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Also accept plain uppercase environment variables
            .add_source(Environment::default())
            .build()?;

        s.try_deserialize()
    }
}
