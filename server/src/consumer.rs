use tokio::sync::{mpsc, oneshot};

use crate::{Error, ShutdownSnafu};

pub(crate) struct GetRequest<E> {
    pub(crate) max: usize,
    pub(crate) resp: oneshot::Sender<Batch<E>>,
}

/// Reads batches of events out of the broker
pub struct Consumer<E> {
    get_tx: mpsc::Sender<GetRequest<E>>,
}

impl<E> Clone for Consumer<E> {
    fn clone(&self) -> Self {
        Self {
            get_tx: self.get_tx.clone(),
        }
    }
}

impl<E> Consumer<E> {
    pub(crate) fn new(get_tx: mpsc::Sender<GetRequest<E>>) -> Self {
        Self { get_tx }
    }

    /// Wait for at least one event and take up to `max` of them, `0` means the configured
    /// batch size
    pub async fn get(&self, max: usize) -> Result<Batch<E>, Error> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.get_tx
            .send(GetRequest { max, resp: resp_tx })
            .await
            .map_err(|_| ShutdownSnafu.build())?;
        resp_rx.await.map_err(|_| ShutdownSnafu.build())
    }
}

/// Events handed out by one `get`.
///
/// Producers are acknowledged in hand-out order: a batch dropped without `ack` holds back
/// the acknowledgments of every later batch.
#[derive(Debug)]
pub struct Batch<E> {
    id: u64,
    events: Vec<E>,
    ack_tx: mpsc::UnboundedSender<u64>,
}

impl<E> Batch<E> {
    pub(crate) fn new(id: u64, events: Vec<E>, ack_tx: mpsc::UnboundedSender<u64>) -> Self {
        Self { id, events, ack_tx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn events(&self) -> &[E] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<E> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn ack(self) -> Result<(), Error> {
        self.ack_tx
            .send(self.id)
            .map_err(|_| ShutdownSnafu.build())
    }
}
