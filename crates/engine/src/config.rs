//! Engine tuning knobs.

use std::time::Duration;

/// Default analysis worker pool size.
pub const DEFAULT_MAX_CONCURRENT_ANALYSES: usize = 4;

/// Default timeout for one external provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration for the query engine.
///
/// The HTTP server builds this from environment variables; library users
/// construct it directly.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on concurrently running asset analyses per process.
    pub max_concurrent_analyses: usize,
    /// Per-call timeout for analysis provider invocations. A timeout
    /// fails that one asset, never the whole process.
    pub provider_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_analyses: DEFAULT_MAX_CONCURRENT_ANALYSES,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_bounds() {
        let config = EngineConfig::default();
        assert!(config.max_concurrent_analyses >= 1);
        assert!(config.provider_timeout >= Duration::from_secs(1));
    }
}
