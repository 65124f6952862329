use std::sync::Arc;

use tokio::sync::oneshot;

use crate::ack::ProduceState;

/// One event on its way to the broker.
///
/// Forgetful producers send `seq = 0` and no state.
#[derive(Debug)]
pub struct PushRequest<E> {
    pub event: E,
    pub seq: u64,
    pub state: Option<Arc<ProduceState<E>>>,
}

impl<E> PushRequest<E> {
    pub fn new(event: E) -> Self {
        Self {
            event,
            seq: 0,
            state: None,
        }
    }

    pub fn with_state(event: E, seq: u64, state: Arc<ProduceState<E>>) -> Self {
        Self {
            event,
            seq,
            state: Some(state),
        }
    }

    /// Whether this request was pushed by the producer owning `state`
    pub fn belongs_to(&self, state: &Arc<ProduceState<E>>) -> bool {
        self.state
            .as_ref()
            .is_some_and(|own| Arc::ptr_eq(own, state))
    }
}

/// Asks the broker to retract every event of `state` it has not acknowledged yet
#[derive(Debug)]
pub struct ProducerCancelRequest<E> {
    pub state: Arc<ProduceState<E>>,
    pub resp: oneshot::Sender<ProducerCancelResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerCancelResponse {
    pub removed: usize,
}
