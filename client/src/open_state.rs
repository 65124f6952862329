use std::sync::atomic::{AtomicBool, Ordering};

use memq_common::request::PushRequest;
use tokio::sync::mpsc::{self, error::TrySendError, Permit};
use tokio_util::sync::CancellationToken;

/// Open/closed gate in front of the broker's event intake.
///
/// Owned by exactly one producer. Publishing and closing race only through the
/// channel and the `done` signal, never through a lock.
pub(crate) struct OpenState<E> {
    is_open: AtomicBool,
    done: CancellationToken,
    events: mpsc::Sender<PushRequest<E>>,
}

impl<E> OpenState<E> {
    pub(crate) fn new(events: mpsc::Sender<PushRequest<E>>) -> Self {
        Self {
            is_open: AtomicBool::new(true),
            done: CancellationToken::new(),
            events,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    /// Close the gate, returns `true` only for the call that actually closed it
    pub(crate) fn close(&self) -> bool {
        if self
            .is_open
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.done.cancel();
        true
    }

    /// Wait for a slot in the intake, `None` if the gate closes first or the broker is gone
    pub(crate) async fn reserve(&self) -> Option<Permit<'_, PushRequest<E>>> {
        if !self.is_open() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.done.cancelled() => None,
            permit = self.events.reserve() => permit.ok(),
        }
    }

    pub(crate) fn try_reserve(&self) -> Option<Permit<'_, PushRequest<E>>> {
        if !self.is_open() {
            return None;
        }
        self.events.try_reserve().ok()
    }

    pub(crate) async fn publish(&self, req: PushRequest<E>) -> bool {
        match self.reserve().await {
            Some(permit) => {
                permit.send(req);
                true
            }
            None => false,
        }
    }

    pub(crate) fn try_publish(&self, req: PushRequest<E>) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.events.try_send(req) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Closed(_)) => false,
        }
    }
}
