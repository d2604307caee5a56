//! Transaction-time watermark.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically non-decreasing microsecond timestamp.
///
/// The service reports a transaction time per response; echoing the highest
/// value seen back as `X-Last-Seen-Txn` gives the caller read-your-writes
/// consistency across sibling queries. The watermark only ever advances.
#[derive(Debug)]
pub struct TxnWatermark(AtomicU64);

impl TxnWatermark {
    pub fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Advance to `candidate` unless the watermark is already at or past it.
    pub fn advance_to(&self, candidate: u64) {
        let mut current = self.0.load(Ordering::Acquire);
        while current < candidate {
            match self
                .0
                .compare_exchange_weak(current, candidate, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn advances_only_forward() {
        let watermark = TxnWatermark::new(0);
        watermark.advance_to(100);
        assert_eq!(watermark.get(), 100);

        watermark.advance_to(50);
        assert_eq!(watermark.get(), 100);

        watermark.advance_to(200);
        assert_eq!(watermark.get(), 200);
    }

    #[test]
    fn ordering_of_advances_does_not_matter() {
        let a = TxnWatermark::new(10);
        a.advance_to(30);
        a.advance_to(20);

        let b = TxnWatermark::new(10);
        b.advance_to(20);
        b.advance_to(30);

        assert_eq!(a.get(), b.get());
        assert_eq!(a.get(), 30);
    }

    #[test]
    fn concurrent_advances_settle_on_the_maximum() {
        let watermark = Arc::new(TxnWatermark::new(0));
        let handles: Vec<_> = (1..=64u64)
            .map(|i| {
                let watermark = Arc::clone(&watermark);
                std::thread::spawn(move || watermark.advance_to(i * 1000))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(watermark.get(), 64_000);
    }
}
