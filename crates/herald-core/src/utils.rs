use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, Result};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

/// One line of the audit trail: who changed the graph or broadcast what.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub username: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, username: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            username: username.to_string(),
            targets: Vec::new(),
            content: None,
            delivered: None,
            failed: None,
            error: None,
            context: None,
        }
    }

    pub fn follow(username: &str, followees: &[String]) -> Self {
        Self {
            targets: followees.to_vec(),
            ..Self::base("follow", username)
        }
    }

    pub fn unfollow(username: &str, followees: &[String]) -> Self {
        Self {
            targets: followees.to_vec(),
            ..Self::base("unfollow", username)
        }
    }

    pub fn broadcast(
        username: &str,
        kind: &str,
        content: Option<&str>,
        delivered: usize,
        failed: usize,
    ) -> Self {
        Self {
            content: content.map(|s| s.to_string()),
            delivered: Some(delivered),
            failed: Some(failed),
            context: Some(kind.to_string()),
            ..Self::base("broadcast", username)
        }
    }

    pub fn error(username: &str, error: &str, context: Option<&str>) -> Self {
        Self {
            error: Some(error.to_string()),
            context: context.map(|s| s.to_string()),
            ..Self::base("error", username)
        }
    }
}

#[derive(Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
    // Keeps concurrent handlers from interleaving multi-line entries.
    lock: Mutex<()>,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::External("audit lock poisoned".to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        serde_json::Value::Array(xs) => xs
            .iter()
            .map(json_value_to_display)
            .collect::<Vec<_>>()
            .join(", "),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}
