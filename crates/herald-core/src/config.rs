use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Transport
    pub telegram_bot_token: String,

    // Identity
    pub admin_username: Option<String>,

    // Storage
    pub store_path: PathBuf,

    // Fan-out
    pub broadcast_concurrency: usize,
    pub inline_query_min_len: usize,
    pub button_label_max_length: usize,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

pub const DEFAULT_BROADCAST_CONCURRENCY: usize = 10;
pub const DEFAULT_INLINE_QUERY_MIN_LEN: usize = 3;

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_bot_token: String::new(),
            admin_username: None,
            store_path: PathBuf::from("/tmp/herald-users.json"),
            broadcast_concurrency: DEFAULT_BROADCAST_CONCURRENCY,
            inline_query_min_len: DEFAULT_INLINE_QUERY_MIN_LEN,
            button_label_max_length: 30,
            audit_log_path: PathBuf::from("/tmp/herald-audit.log"),
            audit_log_json: false,
            rate_limit_enabled: true,
            rate_limit_requests: 20,
            rate_limit_window: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let defaults = Config::default();

        let admin_username = env_str("HERALD_ADMIN").and_then(non_empty);
        let store_path = env_path("HERALD_STORE_PATH").unwrap_or(defaults.store_path);

        let broadcast_concurrency = env_usize("BROADCAST_CONCURRENCY")
            .unwrap_or(defaults.broadcast_concurrency)
            .max(1);
        let inline_query_min_len =
            env_usize("INLINE_QUERY_MIN_LEN").unwrap_or(defaults.inline_query_min_len);
        let button_label_max_length =
            env_usize("BUTTON_LABEL_MAX_LENGTH").unwrap_or(defaults.button_label_max_length);

        let audit_log_path = env_path("AUDIT_LOG_PATH").unwrap_or(defaults.audit_log_path);
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(defaults.audit_log_json);

        let rate_limit_enabled =
            env_bool("RATE_LIMIT_ENABLED").unwrap_or(defaults.rate_limit_enabled);
        let rate_limit_requests =
            env_u32("RATE_LIMIT_REQUESTS").unwrap_or(defaults.rate_limit_requests);
        let rate_limit_window = env_u64("RATE_LIMIT_WINDOW")
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit_window);

        Ok(Self {
            telegram_bot_token,
            admin_username,
            store_path,
            broadcast_concurrency,
            inline_query_min_len,
            button_label_max_length,
            audit_log_path,
            audit_log_json,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Minimal `.env` loader: `KEY=VALUE` lines, `#` comments, optional quotes.
/// Variables already present in the environment win.
fn load_dotenv_if_present(path: &Path) {
    let Ok(txt) = fs::read_to_string(path) else {
        return;
    };
    for (key, val) in parse_dotenv(&txt) {
        if env::var_os(&key).is_some() {
            continue;
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(txt: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in txt.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, val)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut val = val.trim();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }
        out.push((key.to_string(), val.to_string()));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
