//! Rig metrics.

/// Counters for composition and execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RigMetrics {
    /// Module executions attempted
    pub modules_executed: u64,
    /// Module executions that reported failure
    pub modules_failed: u64,
    /// Queue elements skipped without executing
    pub modules_skipped: u64,
    /// Re-initializations before execution
    pub reinitializations: u64,
    /// Executables instantiated
    pub executables_created: u64,
    /// Executables reused across reconciliation
    pub executables_reused: u64,
    /// Executables discarded
    pub executables_discarded: u64,
    /// Reconciliation passes
    pub reconciliations: u64,
    /// Binding values copied
    pub bindings_copied: u64,
    /// Binding values rejected
    pub bindings_rejected: u64,
}

impl RigMetrics {
    /// Create new metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an execution and its outcome
    pub fn record_execution(&mut self, success: bool) {
        self.modules_executed += 1;
        if !success {
            self.modules_failed += 1;
        }
    }

    /// Record a skipped queue element
    pub fn record_skip(&mut self) {
        self.modules_skipped += 1;
    }

    /// Record a re-initialization
    pub fn record_reinit(&mut self) {
        self.reinitializations += 1;
    }

    /// Record an executable instantiation
    pub fn record_created(&mut self) {
        self.executables_created += 1;
    }

    /// Record an executable reuse
    pub fn record_reused(&mut self) {
        self.executables_reused += 1;
    }

    /// Record an executable discard
    pub fn record_discarded(&mut self) {
        self.executables_discarded += 1;
    }

    /// Record a reconciliation pass
    pub fn record_reconciliation(&mut self) {
        self.reconciliations += 1;
    }

    /// Record a binding copy attempt
    pub fn record_binding(&mut self, copied: bool) {
        if copied {
            self.bindings_copied += 1;
        } else {
            self.bindings_rejected += 1;
        }
    }

    /// Get success rate (0.0 - 1.0)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.modules_executed == 0 {
            return 1.0;
        }
        (self.modules_executed - self.modules_failed) as f64 / self.modules_executed as f64
    }

    /// Reset metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut metrics = RigMetrics::new();
        assert_eq!(metrics.success_rate(), 1.0);
        metrics.record_execution(true);
        metrics.record_execution(false);
        assert_eq!(metrics.success_rate(), 0.5);
        assert_eq!(metrics.modules_failed, 1);
    }

    #[test]
    fn test_binding_counters() {
        let mut metrics = RigMetrics::new();
        metrics.record_binding(true);
        metrics.record_binding(false);
        metrics.record_binding(false);
        assert_eq!(metrics.bindings_copied, 1);
        assert_eq!(metrics.bindings_rejected, 2);
        metrics.reset();
        assert_eq!(metrics, RigMetrics::default());
    }
}
