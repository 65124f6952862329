use std::sync::Arc;

use memq_common::{
    ack::ProduceState,
    intake::BrokerHandle,
    request::{ProducerCancelRequest, ProducerCancelResponse, PushRequest},
};
use parking_lot::Mutex;
use tokio::sync::{
    mpsc::{self, Permit},
    oneshot,
};
use tracing::{debug, warn};

use crate::open_state::OpenState;

/// Producer tracking acknowledgments of its events through a shared [`ProduceState`]
pub struct AckProducer<E> {
    cancel_tx: mpsc::Sender<ProducerCancelRequest<E>>,
    drop_on_cancel: bool,
    /// next sequence number, only accepted requests consume one
    seq: Mutex<u64>,
    state: Arc<ProduceState<E>>,
    open_state: OpenState<E>,
}

impl<E> AckProducer<E> {
    pub(crate) fn new(
        broker: &BrokerHandle<E>,
        state: ProduceState<E>,
        drop_on_cancel: bool,
    ) -> Self {
        Self {
            cancel_tx: broker.cancel().clone(),
            drop_on_cancel,
            seq: Mutex::new(1),
            state: Arc::new(state),
            open_state: OpenState::new(broker.events().clone()),
        }
    }

    pub async fn publish(&self, event: E) -> bool {
        match self.open_state.reserve().await {
            Some(permit) => self.send(permit, event),
            None => false,
        }
    }

    pub fn try_publish(&self, event: E) -> bool {
        match self.open_state.try_reserve() {
            Some(permit) => self.send(permit, event),
            None => false,
        }
    }

    fn send(&self, permit: Permit<'_, PushRequest<E>>, event: E) -> bool {
        let mut seq = self.seq.lock();
        // the gate may have closed while waiting for capacity
        if !self.open_state.is_open() {
            return false;
        }
        permit.send(PushRequest::with_state(event, *seq, self.state.clone()));
        *seq += 1;
        true
    }

    /// Close the producer and, with drop-on-cancel, retract its unacknowledged events.
    ///
    /// Returns the number of events the broker removed. Only the first call does any work,
    /// later calls return 0.
    #[tracing::instrument(skip(self), fields(drop_on_cancel = self.drop_on_cancel))]
    pub async fn cancel(&self) -> usize {
        let closed = {
            let _seq = self.seq.lock();
            self.open_state.close()
        };
        if !closed {
            return 0;
        }
        debug!("ack producer closed");
        if !self.drop_on_cancel {
            return 0;
        }

        let (resp_tx, resp_rx) = oneshot::channel();
        let request = ProducerCancelRequest {
            state: self.state.clone(),
            resp: resp_tx,
        };
        if self.cancel_tx.send(request).await.is_err() {
            warn!("broker cancellation intake is closed");
            return 0;
        }

        // wait for the broker to process the cancellation
        match resp_rx.await {
            Ok(ProducerCancelResponse { removed }) => {
                debug!(removed, "unacknowledged events retracted");
                removed
            }
            Err(_) => {
                warn!("broker dropped the cancellation without answering");
                0
            }
        }
    }
}
