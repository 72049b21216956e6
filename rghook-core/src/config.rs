use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HookError, HookResult};

/// Construction-time settings of a [`ReaderCheckpointHook`](crate::checkpoint::ReaderCheckpointHook).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    /// Logical name of the reading operator.
    ///
    /// Stays stable across redeployments, unlike the reader group's runtime
    /// name, so checkpoint state can be matched when a job resumes from a
    /// checkpoint or savepoint.
    pub reader_name: String,
    /// Upper bound on one trigger call.
    #[serde(with = "duration_millis")]
    pub trigger_timeout: Duration,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            reader_name: "reader".to_string(),
            trigger_timeout: Duration::from_secs(5),
        }
    }
}

impl HookConfig {
    /// Largest accepted trigger timeout.
    pub const MAX_TRIGGER_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn new(reader_name: impl Into<String>) -> Self {
        Self {
            reader_name: reader_name.into(),
            ..Self::default()
        }
    }

    pub fn with_trigger_timeout(mut self, trigger_timeout: Duration) -> Self {
        self.trigger_timeout = trigger_timeout;
        self
    }

    pub fn validate(&self) -> HookResult<()> {
        if self.reader_name.trim().is_empty() {
            return Err(HookError::InvalidConfig(
                "reader_name must not be empty".to_string(),
            ));
        }
        if self.trigger_timeout.is_zero() {
            return Err(HookError::InvalidConfig(
                "trigger_timeout must be greater than 0".to_string(),
            ));
        }
        if self.trigger_timeout > Self::MAX_TRIGGER_TIMEOUT {
            return Err(HookError::InvalidConfig(format!(
                "trigger_timeout must be at most {}s, got {}s",
                Self::MAX_TRIGGER_TIMEOUT.as_secs(),
                self.trigger_timeout.as_secs()
            )));
        }
        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HookConfig::default();
        assert_eq!(config.trigger_timeout, Duration::from_secs(5));
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_reader_name_rejected() {
        let err = HookConfig::new("  ").validate().unwrap_err();
        assert!(matches!(err, HookError::InvalidConfig(_)), "unexpected: {err}");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = HookConfig::new("orders")
            .with_trigger_timeout(Duration::ZERO)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("trigger_timeout"));
    }

    #[test]
    fn test_unbounded_timeout_rejected() {
        let err = HookConfig::new("orders")
            .with_trigger_timeout(Duration::MAX)
            .validate()
            .unwrap_err();
        assert!(matches!(err, HookError::InvalidConfig(_)), "unexpected: {err}");

        HookConfig::new("orders")
            .with_trigger_timeout(HookConfig::MAX_TRIGGER_TIMEOUT)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_oversized_timeout_fails_to_serialize() {
        let config = HookConfig::new("orders").with_trigger_timeout(Duration::MAX);
        assert!(bincode::serialize(&config).is_err());
    }

    #[test]
    fn test_config_bincode_roundtrip_keeps_millis() {
        let config = HookConfig::new("orders").with_trigger_timeout(Duration::from_millis(250));
        let bytes = bincode::serialize(&config).unwrap();
        let decoded: HookConfig = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, config);
    }
}
