//! Engine configuration.
//!
//! All generation-time policy lives in one explicit struct handed to the
//! engine at construction. Nothing here is read from process globals.

/// Configuration for BOM generation and orchestration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Gate the secondary-cloud validation pass.
    pub check_secondary: bool,
    /// Gate the missing-service precheck before generation.
    pub check_services: bool,
    /// Priority value classifying a cloud binding as secondary capacity.
    pub secondary_priority: i32,
    /// Priority value classifying a cloud binding as primary capacity.
    pub primary_priority: i32,
    /// Upper bound on concurrently running background operations across
    /// all environments. Per-environment serialization is still the
    /// environment lock's job.
    pub max_concurrent_ops: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_secondary: true,
            check_services: true,
            secondary_priority: 2,
            primary_priority: 1,
            max_concurrent_ops: 8,
        }
    }
}

impl EngineConfig {
    pub fn with_check_secondary(mut self, enabled: bool) -> Self {
        self.check_secondary = enabled;
        self
    }

    pub fn with_check_services(mut self, enabled: bool) -> Self {
        self.check_services = enabled;
        self
    }

    pub fn with_max_concurrent_ops(mut self, bound: usize) -> Self {
        self.max_concurrent_ops = bound;
        self
    }
}
