//! Process-wide registry of per-dependency breaker and bulkhead singletons.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::bulkhead::{Bulkhead, BulkheadConfig};
use crate::clock::Clock;

/// Owns the shared circuit breakers and bulkheads, one per logical
/// downstream dependency.
///
/// Every caller of a dependency must go through the same breaker and
/// bulkhead instance for failure detection to see the whole process's
/// traffic, so gates are created once per name and handed out as `Arc`s.
/// The maps are guarded individually so unrelated dependencies never
/// serialize on each other.
pub struct ResilienceRegistry {
    clock: Arc<dyn Clock>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    bulkheads: RwLock<HashMap<String, Arc<Bulkhead>>>,
}

impl ResilienceRegistry {
    /// Creates an empty registry using the given clock for all gates.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            breakers: RwLock::new(HashMap::new()),
            bulkheads: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the breaker for `name`, creating it with `config` on first
    /// use. An existing breaker wins; later configs are ignored.
    pub fn breaker(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().unwrap().get(name) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write().unwrap();
        Arc::clone(breakers.entry(name.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(name, config, Arc::clone(&self.clock)))
        }))
    }

    /// Returns the bulkhead for `name`, creating it with `config` on first
    /// use. An existing bulkhead wins; later configs are ignored.
    pub fn bulkhead(&self, name: &str, config: BulkheadConfig) -> Arc<Bulkhead> {
        if let Some(bulkhead) = self.bulkheads.read().unwrap().get(name) {
            return Arc::clone(bulkhead);
        }
        let mut bulkheads = self.bulkheads.write().unwrap();
        Arc::clone(
            bulkheads
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Bulkhead::new(name, config))),
        )
    }
}

impl std::fmt::Debug for ResilienceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceRegistry")
            .field("breakers", &self.breakers.read().unwrap().len())
            .field("bulkheads", &self.bulkheads.read().unwrap().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn same_name_returns_same_breaker() {
        let registry = ResilienceRegistry::new(Arc::new(ManualClock::new()));
        let a = registry.breaker("payment", CircuitBreakerConfig::default());
        let b = registry.breaker("payment", CircuitBreakerConfig::default());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_names_get_distinct_gates() {
        let registry = ResilienceRegistry::new(Arc::new(ManualClock::new()));
        let a = registry.breaker("payment", CircuitBreakerConfig::default());
        let b = registry.breaker("availability", CircuitBreakerConfig::default());
        assert!(!Arc::ptr_eq(&a, &b));

        let x = registry.bulkhead("payment", BulkheadConfig::default());
        let y = registry.bulkhead("availability", BulkheadConfig::default());
        assert!(!Arc::ptr_eq(&x, &y));
    }

    #[test]
    fn first_config_wins() {
        let registry = ResilienceRegistry::new(Arc::new(ManualClock::new()));
        let first = registry.bulkhead(
            "payment",
            BulkheadConfig {
                max_concurrent: 3,
                ..Default::default()
            },
        );
        let second = registry.bulkhead(
            "payment",
            BulkheadConfig {
                max_concurrent: 99,
                ..Default::default()
            },
        );
        assert!(Arc::ptr_eq(&first, &second));
    }
}
