use std::{
    fmt::Debug,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

/// Invoked with the number of newly acknowledged events
pub type AckHandler = Box<dyn Fn(usize) + Send + Sync>;

/// Invoked once per event discarded instead of acknowledged
pub type DropHandler<E> = Box<dyn Fn(E) + Send + Sync>;

/// Acknowledgment bookkeeping of one acknowledging producer.
///
/// The producer creates it and hands out `Arc` references inside every push request.
/// Only the broker mutates it: the producer observes progress through the callbacks.
pub struct ProduceState<E> {
    ack_cb: AckHandler,
    drop_cb: Option<DropHandler<E>>,
    cancelled: AtomicBool,
    /// sequence numbers start at 1, so 0 means nothing acknowledged yet
    last_ack: AtomicU64,
}

impl<E> ProduceState<E> {
    pub fn new(ack_cb: AckHandler, drop_cb: Option<DropHandler<E>>) -> Self {
        Self {
            ack_cb,
            drop_cb,
            cancelled: AtomicBool::new(false),
            last_ack: AtomicU64::new(0),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn last_ack(&self) -> u64 {
        self.last_ack.load(Ordering::Acquire)
    }

    /// Advance the acknowledged sequence to `seq`, returns the number of newly acknowledged events.
    ///
    /// Sequences at or below the current position are ignored. The ack callback is skipped once
    /// the producer is cancelled, the position still moves forward.
    pub fn ack(&self, seq: u64) -> usize {
        let prev = self.last_ack.fetch_max(seq, Ordering::AcqRel);
        if seq <= prev {
            return 0;
        }
        if self.is_cancelled() {
            return 0;
        }
        let count = (seq - prev) as usize;
        (self.ack_cb)(count);
        count
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn drop_event(&self, event: E) {
        if let Some(drop_cb) = &self.drop_cb {
            drop_cb(event);
        }
    }
}

impl<E> Debug for ProduceState<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProduceState")
            .field("cancelled", &self.is_cancelled())
            .field("last_ack", &self.last_ack())
            .field("has_drop_cb", &self.drop_cb.is_some())
            .finish()
    }
}
