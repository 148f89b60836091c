// src/plant/ids.rs
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_ID_PREFIX: &str = "id-";

/// Source of correlation ids for outgoing `start` commands.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// `<prefix><n>` with `n` counting up from 1. Unique within one generator,
/// not across processes or restarts.
#[derive(Debug)]
pub struct CounterIds {
    prefix: String,
    last: AtomicU64,
}

impl CounterIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last: AtomicU64::new(0),
        }
    }
}

impl Default for CounterIds {
    fn default() -> Self {
        Self::new(DEFAULT_ID_PREFIX)
    }
}

impl IdGenerator for CounterIds {
    fn next_id(&self) -> String {
        let n = self.last.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_default_prefix_starts_at_one() {
        let ids = CounterIds::default();
        assert_eq!(ids.next_id(), "id-1");
        assert_eq!(ids.next_id(), "id-2");
    }

    #[test]
    fn test_custom_prefix() {
        let ids = CounterIds::new("pump-cmd-");
        assert_eq!(ids.next_id(), "pump-cmd-1");
    }

    #[test]
    fn test_generators_are_independent() {
        let a = CounterIds::default();
        let b = CounterIds::default();
        a.next_id();
        a.next_id();
        assert_eq!(b.next_id(), "id-1");
    }

    #[test]
    fn test_no_repeats_across_threads() {
        let ids = Arc::new(CounterIds::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
