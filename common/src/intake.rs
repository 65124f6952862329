use std::num::NonZeroUsize;

use tokio::sync::mpsc;

use crate::request::{ProducerCancelRequest, PushRequest};

/// Producer-facing side of a broker: the event intake and the cancellation intake.
///
/// Cloned into every producer created from the broker.
pub struct BrokerHandle<E> {
    pub(crate) events: mpsc::Sender<PushRequest<E>>,
    pub(crate) cancel: mpsc::Sender<ProducerCancelRequest<E>>,
}

impl<E> Clone for BrokerHandle<E> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<E> BrokerHandle<E> {
    pub fn events(&self) -> &mpsc::Sender<PushRequest<E>> {
        &self.events
    }

    pub fn cancel(&self) -> &mpsc::Sender<ProducerCancelRequest<E>> {
        &self.cancel
    }
}

/// Broker-facing side, only ever received from
pub struct IntakeReceiver<E> {
    pub events: mpsc::Receiver<PushRequest<E>>,
    pub cancel: mpsc::Receiver<ProducerCancelRequest<E>>,
}

/// Create the two intakes of a broker, the event intake holds up to `capacity` requests.
///
/// Cancellation is a rendezvous: at most one request waits to be picked up.
pub fn intake<E>(capacity: NonZeroUsize) -> (BrokerHandle<E>, IntakeReceiver<E>) {
    let (events_tx, events_rx) = mpsc::channel(capacity.get());
    let (cancel_tx, cancel_rx) = mpsc::channel(1);
    (
        BrokerHandle {
            events: events_tx,
            cancel: cancel_tx,
        },
        IntakeReceiver {
            events: events_rx,
            cancel: cancel_rx,
        },
    )
}
