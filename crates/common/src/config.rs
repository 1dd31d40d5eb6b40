use crate::DataMode;

/// All process configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
///
/// Scan tuning (intervals, windows, thresholds) lives in the TOML file at
/// `scan_config_path`, see `analysis::ScanConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub telegram_chat_id: i64,

    // Dashboard
    pub dashboard_port: u16,

    // Market data
    pub data_mode: DataMode,
    pub bybit_base_url: String,
    pub replay_path: Option<String>,

    // Scan config file path
    pub scan_config_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let data_mode = match optional_env("DATA_MODE")
            .unwrap_or_else(|| "live".to_string())
            .to_lowercase()
            .as_str()
        {
            "live" => DataMode::Live,
            "replay" => DataMode::Replay,
            other => panic!("ERROR: DATA_MODE must be 'live' or 'replay', got: '{other}'"),
        };

        let telegram_chat_id = required_env("TELEGRAM_CHAT_ID")
            .trim()
            .parse::<i64>()
            .unwrap_or_else(|_| panic!("TELEGRAM_CHAT_ID must be a numeric chat id"));

        let replay_path = optional_env("REPLAY_PATH");
        if data_mode == DataMode::Replay && replay_path.is_none() {
            panic!("DATA_MODE=replay requires REPLAY_PATH to point at a replay JSON file");
        }

        Config {
            telegram_token: required_env("TELEGRAM_TOKEN"),
            telegram_chat_id,
            dashboard_port: optional_env("DASHBOARD_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            data_mode,
            bybit_base_url: optional_env("BYBIT_BASE_URL")
                .unwrap_or_else(|| "https://api.bybit.com".to_string()),
            replay_path,
            scan_config_path: optional_env("SCAN_CONFIG_PATH")
                .unwrap_or_else(|| "config/scanner.toml".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
