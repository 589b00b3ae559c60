use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_CHAT_PATH: &str = "/api/chat/stream";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TURN_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;
pub const DEFAULT_SUMMARY_PROGRESS_CHARS: [usize; 2] = [20, 120];
pub const DEFAULT_LONG_INPUT_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(
        rename = "dataContext",
        alias = "data_context",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_context: Option<String>,

    #[serde(
        rename = "logLevel",
        alias = "log_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub log_level: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn: Option<TurnConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServerConfig {
    #[serde(
        rename = "baseUrl",
        alias = "base_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub base_url: Option<String>,

    #[serde(
        rename = "chatPath",
        alias = "chat_path",
        skip_serializing_if = "Option::is_none"
    )]
    pub chat_path: Option<String>,

    #[serde(
        rename = "connectTimeoutSecs",
        alias = "connect_timeout_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TurnConfig {
    #[serde(
        rename = "timeoutSecs",
        alias = "timeout_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_secs: Option<u64>,

    #[serde(
        rename = "maxLineBytes",
        alias = "max_line_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_line_bytes: Option<usize>,

    #[serde(
        rename = "summaryProgressChars",
        alias = "summary_progress_chars",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary_progress_chars: Option<Vec<usize>>,

    #[serde(
        rename = "toolProgressChars",
        alias = "tool_progress_chars",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_progress_chars: Option<Vec<usize>>,

    #[serde(
        rename = "longInputChars",
        alias = "long_input_chars",
        skip_serializing_if = "Option::is_none"
    )]
    pub long_input_chars: Option<usize>,
}

/// Turn parameters with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSettings {
    pub timeout: Duration,
    pub max_line_bytes: usize,
    /// Cumulative character counts at which the summary route advances to
    /// its analyze and summarize steps.
    pub summary_progress_chars: Vec<usize>,
    pub tool_progress_chars: Vec<usize>,
    pub long_input_chars: usize,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TURN_TIMEOUT_SECS),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            summary_progress_chars: DEFAULT_SUMMARY_PROGRESS_CHARS.to_vec(),
            tool_progress_chars: Vec::new(),
            long_input_chars: DEFAULT_LONG_INPUT_CHARS,
        }
    }
}

impl Config {
    pub fn merge(&mut self, other: Config) {
        merge_option_replace(&mut self.schema, other.schema);
        merge_option_deep(&mut self.server, other.server);
        merge_option_replace(&mut self.model, other.model);
        merge_option_replace(&mut self.data_context, other.data_context);
        merge_option_replace(&mut self.log_level, other.log_level);
        merge_option_deep(&mut self.turn, other.turn);
    }

    pub fn base_url(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn chat_path(&self) -> &str {
        self.server
            .as_ref()
            .and_then(|s| s.chat_path.as_deref())
            .unwrap_or(DEFAULT_CHAT_PATH)
    }

    /// Full URL the chat stream is opened against.
    pub fn chat_url(&self) -> String {
        let base = self.base_url().trim_end_matches('/');
        let path = self.chat_path();
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.server
                .as_ref()
                .and_then(|s| s.connect_timeout_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }

    pub fn turn_settings(&self) -> TurnSettings {
        let defaults = TurnSettings::default();
        let Some(turn) = &self.turn else {
            return defaults;
        };
        TurnSettings {
            timeout: turn
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_line_bytes: turn.max_line_bytes.unwrap_or(defaults.max_line_bytes),
            summary_progress_chars: turn
                .summary_progress_chars
                .clone()
                .unwrap_or(defaults.summary_progress_chars),
            tool_progress_chars: turn
                .tool_progress_chars
                .clone()
                .unwrap_or(defaults.tool_progress_chars),
            long_input_chars: turn.long_input_chars.unwrap_or(defaults.long_input_chars),
        }
    }
}

trait DeepMerge {
    fn deep_merge(&mut self, other: Self);
}

fn merge_option_replace<T>(target: &mut Option<T>, source: Option<T>) {
    if let Some(value) = source {
        *target = Some(value);
    }
}

fn merge_option_deep<T: DeepMerge>(target: &mut Option<T>, source: Option<T>) {
    if let Some(source_value) = source {
        if let Some(target_value) = target {
            target_value.deep_merge(source_value);
        } else {
            *target = Some(source_value);
        }
    }
}

impl DeepMerge for ServerConfig {
    fn deep_merge(&mut self, other: Self) {
        merge_option_replace(&mut self.base_url, other.base_url);
        merge_option_replace(&mut self.chat_path, other.chat_path);
        merge_option_replace(&mut self.connect_timeout_secs, other.connect_timeout_secs);
    }
}

impl DeepMerge for TurnConfig {
    fn deep_merge(&mut self, other: Self) {
        merge_option_replace(&mut self.timeout_secs, other.timeout_secs);
        merge_option_replace(&mut self.max_line_bytes, other.max_line_bytes);
        merge_option_replace(&mut self.summary_progress_chars, other.summary_progress_chars);
        merge_option_replace(&mut self.tool_progress_chars, other.tool_progress_chars);
        merge_option_replace(&mut self.long_input_chars, other.long_input_chars);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_unset_nested_fields() {
        let mut base = Config {
            server: Some(ServerConfig {
                base_url: Some("http://a".to_string()),
                chat_path: Some("/chat".to_string()),
                connect_timeout_secs: None,
            }),
            ..Default::default()
        };
        base.merge(Config {
            server: Some(ServerConfig {
                base_url: Some("http://b".to_string()),
                ..Default::default()
            }),
            model: Some("qwen".to_string()),
            ..Default::default()
        });

        assert_eq!(base.base_url(), "http://b");
        assert_eq!(base.chat_path(), "/chat");
        assert_eq!(base.model.as_deref(), Some("qwen"));
    }

    #[test]
    fn chat_url_joins_base_and_path() {
        let mut config = Config::default();
        assert_eq!(config.chat_url(), "http://127.0.0.1:8000/api/chat/stream");

        config.server = Some(ServerConfig {
            base_url: Some("http://host:9000/".to_string()),
            chat_path: Some("stream".to_string()),
            connect_timeout_secs: None,
        });
        assert_eq!(config.chat_url(), "http://host:9000/stream");
    }

    #[test]
    fn turn_settings_fill_defaults() {
        let config = Config {
            turn: Some(TurnConfig {
                timeout_secs: Some(5),
                ..Default::default()
            }),
            ..Default::default()
        };
        let settings = config.turn_settings();
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.max_line_bytes, DEFAULT_MAX_LINE_BYTES);
        assert_eq!(settings.summary_progress_chars, vec![20, 120]);
        assert!(settings.tool_progress_chars.is_empty());
    }
}
