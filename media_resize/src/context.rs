use crate::config::RunConfig;
use crate::threshold::ThresholdPolicy;

/// Everything a worker reads while processing a directory. Shared read-only.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: RunConfig,
    pub policy: ThresholdPolicy,
}

impl RunContext {
    pub fn new(config: RunConfig) -> Self {
        let policy = ThresholdPolicy::from_config(&config);
        Self { config, policy }
    }
}
