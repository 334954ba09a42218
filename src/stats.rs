use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Counter of sent messages. Clone the handle to share one counter
/// between mailboxes; separate handles count separately.
#[derive(Clone, Debug, Default)]
pub struct MessageCounter(Arc<AtomicU64>);

impl MessageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_count() {
        let counter = MessageCounter::new();
        let shared = counter.clone();

        counter.incr();
        shared.incr();

        assert_eq!(counter.count(), 2);
        assert_eq!(shared.count(), 2);
    }

    #[test]
    fn separate_counters_count_separately() {
        let a = MessageCounter::new();
        let b = MessageCounter::new();

        a.incr();

        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 0);
    }
}
