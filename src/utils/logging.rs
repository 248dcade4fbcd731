//! Structured Logging with Sensitive Data Redaction
//!
//! Every log line goes to stderr as
//! `[timestamp] LEVEL [module] message | key=value ...`.
//! Field values are redacted by key name:
//! - authority and relay keys are never printed
//! - addresses are shortened
//! - digests, hashes and raw payloads are shortened

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Turn debug output on or off (`--verbose`)
pub fn set_debug(enabled: bool) {
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
}

pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Structured log entry
#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field, redacting it according to its key
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let redacted = redact_if_sensitive(key, &value.to_string());
        self.fields.push((key, redacted));
        self
    }

    /// Add a field that is always fully redacted
    pub fn redacted_field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let redacted = redact_value(&value.to_string());
        self.fields.push((key, redacted));
        self
    }

    pub fn render(&self) -> String {
        let fields_str = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");

        if fields_str.is_empty() {
            format!("[{}] {} [{}] {}", timestamp, self.level, self.module, self.message)
        } else {
            format!(
                "[{}] {} [{}] {} | {}",
                timestamp, self.level, self.module, self.message, fields_str
            )
        }
    }

    pub fn log(self) {
        if self.level == LogLevel::Debug && !is_debug_enabled() {
            return;
        }
        eprintln!("{}", self.render());
    }
}

fn redact_if_sensitive(key: &str, value: &str) -> String {
    let key_lower = key.to_lowercase();

    let fully_redacted_keys = [
        "private", "secret", "authority_key", "relay_key", "signing_key", "key_hex", "password",
    ];
    if fully_redacted_keys.iter().any(|k| key_lower.contains(k)) {
        return redact_value(value);
    }

    let address_keys = ["address", "authority", "delegate", "relay", "sender", "destination"];
    if address_keys.iter().any(|k| key_lower.contains(k)) {
        return redact_address(value);
    }

    let hash_keys = ["tx_hash", "hash", "digest", "raw"];
    if hash_keys.iter().any(|k| key_lower.contains(k)) {
        return redact_hash(value);
    }

    value.to_string()
}

fn redact_value(value: &str) -> String {
    if value.is_empty() {
        return "[EMPTY]".to_string();
    }

    let len = value.len();
    if len <= 4 {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED:{}chars]", len)
    }
}

/// Show the first 6 hex digits and last 4
fn redact_address(address: &str) -> String {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    let prefix_len = if trimmed.starts_with("0x") { 8 } else { 6 };
    let suffix_len = 4;

    if trimmed.len() <= prefix_len + suffix_len + 3 {
        return redact_value(trimmed);
    }

    format!(
        "{}...{}",
        &trimmed[..prefix_len],
        &trimmed[trimmed.len() - suffix_len..]
    )
}

fn redact_hash(hash: &str) -> String {
    let trimmed = hash.trim();

    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    if trimmed.len() <= 20 {
        return trimmed.to_string();
    }

    let prefix_len = if trimmed.starts_with("0x") { 12 } else { 10 };
    let suffix_len = 6;

    format!(
        "{}...{}",
        &trimmed[..prefix_len],
        &trimmed[trimmed.len() - suffix_len..]
    )
}

#[macro_export]
macro_rules! log_debug {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Debug,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Debug,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[macro_export]
macro_rules! log_info {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Info,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Info,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[macro_export]
macro_rules! log_warn {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Warn,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Warn,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[macro_export]
macro_rules! log_error {
    ($module:expr, $msg:expr) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Error,
            $module,
            $msg
        ).log()
    };
    ($module:expr, $msg:expr, $($key:ident = $value:expr),* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::Error,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x571D806987bB6579d80002d49274d25A216c31da";

    #[test]
    fn test_keys_never_rendered() {
        let key = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
        let entry = LogEntry::new(LogLevel::Info, "test", "Signing")
            .field("authority_key", key)
            .field("relay_key", key)
            .redacted_field("anything", key);

        let line = entry.render();
        assert!(!line.contains(key));
        assert_eq!(line.matches("[REDACTED:64chars]").count(), 3);
    }

    #[test]
    fn test_addresses_shortened() {
        for key in ["authority", "delegate", "relay", "destination"] {
            let redacted = redact_if_sensitive(key, ADDR);
            assert_eq!(redacted, "0x571D80...31da", "key {}", key);
        }
    }

    #[test]
    fn test_hashes_shortened() {
        let hash = format!("0x{}", "ab".repeat(32));
        let redacted = redact_if_sensitive("tx_hash", &hash);
        assert_eq!(redacted, "0xababababab...ababab");
        assert_eq!(redact_if_sensitive("digest", "0x1234"), "0x1234");
    }

    #[test]
    fn test_plain_fields_untouched() {
        assert_eq!(redact_if_sensitive("chain_id", "11155111"), "11155111");
        assert_eq!(redact_if_sensitive("auth_nonce", "0"), "0");
        assert_eq!(redact_value(""), "[EMPTY]");
        assert_eq!(redact_value("abc"), "[REDACTED]");
    }

    #[test]
    fn test_render_layout() {
        let line = LogEntry::new(LogLevel::Warn, "tx::relay", "Retrying").field("attempt", 2).render();
        assert!(line.contains("WARN [tx::relay] Retrying | attempt=2"));

        let bare = LogEntry::new(LogLevel::Error, "tx::relay", "Failed").render();
        assert!(bare.ends_with("ERROR [tx::relay] Failed"));
    }
}
