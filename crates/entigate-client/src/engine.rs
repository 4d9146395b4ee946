//! Backend engine endpoints.

use std::fmt;
use std::time::Duration;

use entigate_proto::AttributeSource;

/// Default NNG send and receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the engine serving one source listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub source: AttributeSource,
    /// NNG address, e.g. `tcp://127.0.0.1:9400` or `ipc:///tmp/qs.sock`.
    pub address: String,
    pub timeout: Duration,
}

impl EngineConfig {
    pub fn new(source: AttributeSource, address: impl Into<String>) -> Self {
        Self {
            source,
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} engine at {}", self.source, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_engine_config() {
        let engine = EngineConfig::new(AttributeSource::Eds, "ipc:///tmp/eds.sock");
        assert_eq!(engine.timeout, DEFAULT_TIMEOUT);

        let engine = engine.with_timeout(Duration::from_millis(500));
        assert_eq!(engine.timeout, Duration::from_millis(500));
        assert_eq!(engine.to_string(), format!("{} engine at ipc:///tmp/eds.sock", AttributeSource::Eds));
    }
}
