use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TYPING_IDLE: Duration = Duration::from_millis(1500);
pub const DEFAULT_NOTICE_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Quiet period after the last keystroke before typing is cleared.
    pub typing_idle: Duration,
    pub notice_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            typing_idle: DEFAULT_TYPING_IDLE,
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Reads `CHAT_TYPING_IDLE_MS` and `CHAT_NOTICE_CAPACITY`.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var("CHAT_TYPING_IDLE_MS").ok(),
            std::env::var("CHAT_NOTICE_CAPACITY").ok(),
        )
    }

    fn from_values(typing_idle_ms: Option<String>, notice_capacity: Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            typing_idle: parse_value::<u64>("CHAT_TYPING_IDLE_MS", typing_idle_ms)
                .map(Duration::from_millis)
                .unwrap_or(defaults.typing_idle),
            notice_capacity: parse_value::<usize>("CHAT_NOTICE_CAPACITY", notice_capacity)
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.notice_capacity),
        }
    }
}

fn parse_value<T: FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(
                component = "config",
                var = name,
                value = %raw,
                "ignoring unparsable value, using default"
            );
            None
        }
    }
}
