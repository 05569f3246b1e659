use std::time::Duration;

use serde::Deserialize;

/// Timing knobs of the render pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// How long the deferred tier may lag behind the urgent one before a
    /// catch-up is forced, in milliseconds.
    pub deferred_timeout_ms: u64,
    /// Grace period for boundaries that don't set their own, in milliseconds.
    pub default_grace_ms: u64,
}

impl RenderConfig {
    pub fn deferred_timeout(&self) -> Duration {
        Duration::from_millis(self.deferred_timeout_ms)
    }

    pub fn default_grace(&self) -> Duration {
        Duration::from_millis(self.default_grace_ms)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            deferred_timeout_ms: 5_000,
            default_grace_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{ "deferred_timeout_ms": 250 }"#).expect("valid config");
        assert_eq!(config.deferred_timeout(), Duration::from_millis(250));
        assert_eq!(config.default_grace(), Duration::ZERO);
    }
}
