use std::{collections::VecDeque, sync::Arc};

use memq_common::{
    ack::ProduceState,
    intake::{self, BrokerHandle, IntakeReceiver},
    request::{ProducerCancelRequest, ProducerCancelResponse, PushRequest},
    Config,
};
use snafu::ResultExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::{
    consumer::{Batch, Consumer, GetRequest},
    ConfigSnafu, Error,
};

/// In-memory broker behind the producer intakes.
///
/// A single task owns the buffer: producers reach it through [`BrokerHandle`], readers
/// through [`Consumer`]. The task stops when `token` is cancelled or the broker is dropped.
pub struct Broker<E> {
    handle: BrokerHandle<E>,
    consumer: Consumer<E>,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl<E> Broker<E>
where
    E: Send + 'static,
{
    #[tracing::instrument(skip(token))]
    pub fn start(config: Config, token: CancellationToken) -> Result<Self, Error> {
        let capacity = config.capacity().context(ConfigSnafu)?;
        let token = token.child_token();
        let (handle, intake) = intake::intake(capacity);
        let (get_tx, get_rx) = mpsc::channel(1);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();

        let state = BrokerState {
            config,
            intake,
            get_rx,
            ack_tx,
            ack_rx,
            buffer: VecDeque::with_capacity(capacity.get()),
            pending_get: None,
            in_flight: VecDeque::new(),
            next_batch_id: 0,
        };
        let task = tokio::spawn(start_broker(state, token.clone()));

        Ok(Self {
            handle,
            consumer: Consumer::new(get_tx),
            token,
            task: Some(task),
        })
    }

    pub fn handle(&self) -> BrokerHandle<E> {
        self.handle.clone()
    }

    pub fn consumer(&self) -> Consumer<E> {
        self.consumer.clone()
    }

    #[tracing::instrument(skip(self))]
    pub async fn shutdown(mut self) {
        self.token.cancel();
        let Some(task) = self.task.take() else {
            return;
        };
        if let Err(e) = task.await {
            error!("broker task error: {e:?}");
        }
    }
}

impl<E> Drop for Broker<E> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

struct InFlight<E> {
    id: u64,
    acked: bool,
    entries: Vec<(u64, Option<Arc<ProduceState<E>>>)>,
}

struct BrokerState<E> {
    config: Config,
    intake: IntakeReceiver<E>,
    get_rx: mpsc::Receiver<GetRequest<E>>,
    ack_tx: mpsc::UnboundedSender<u64>,
    ack_rx: mpsc::UnboundedReceiver<u64>,
    buffer: VecDeque<PushRequest<E>>,
    /// at most one reader waits for events
    pending_get: Option<GetRequest<E>>,
    /// handed out batches, in hand-out order
    in_flight: VecDeque<InFlight<E>>,
    next_batch_id: u64,
}

async fn start_broker<E>(mut state: BrokerState<E>, token: CancellationToken) {
    loop {
        if !state.buffer.is_empty() {
            if let Some(req) = state.pending_get.take() {
                state.deliver(req);
            }
        }
        let accepting = state.buffer.len() < state.config.events;

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            Some(req) = state.intake.cancel.recv() => state.handle_cancel(req),
            Some(id) = state.ack_rx.recv() => state.handle_ack(id),
            Some(req) = state.get_rx.recv(), if state.pending_get.is_none() => {
                state.pending_get = Some(req);
            }
            Some(req) = state.intake.events.recv(), if accepting => state.handle_push(req),
            else => break,
        }
    }
    debug!(
        buffered = state.buffer.len(),
        in_flight = state.in_flight.len(),
        "broker stopped"
    );
}

impl<E> BrokerState<E> {
    fn handle_push(&mut self, req: PushRequest<E>) {
        let cancelled = req
            .state
            .as_ref()
            .is_some_and(|state| state.is_cancelled());
        if !cancelled {
            self.buffer.push_back(req);
            return;
        }
        trace!(seq = req.seq, "discard event of cancelled producer");
        if let Some(state) = req.state {
            state.drop_event(req.event);
        }
    }

    fn deliver(&mut self, req: GetRequest<E>) {
        if req.resp.is_closed() {
            return;
        }
        let max = match req.max {
            0 => self.config.max_batch_size,
            max => max.min(self.config.max_batch_size),
        };
        let count = max.min(self.buffer.len());

        let mut events = Vec::with_capacity(count);
        let mut entries = Vec::with_capacity(count);
        for PushRequest { event, seq, state } in self.buffer.drain(..count) {
            events.push(event);
            entries.push((seq, state));
        }

        let id = self.next_batch_id;
        match req.resp.send(Batch::new(id, events, self.ack_tx.clone())) {
            Ok(()) => {
                trace!(id, count, "batch handed out");
                self.next_batch_id += 1;
                self.in_flight.push_back(InFlight {
                    id,
                    acked: false,
                    entries,
                });
            }
            Err(mut batch) => {
                // reader went away, keep the events for the next one
                let events = batch.take_events();
                for (event, (seq, state)) in events.into_iter().zip(entries).rev() {
                    self.buffer.push_front(PushRequest { event, seq, state });
                }
            }
        }
    }

    fn handle_ack(&mut self, id: u64) {
        let Some(batch) = self.in_flight.iter_mut().find(|batch| batch.id == id) else {
            warn!(id, "ack for unknown batch");
            return;
        };
        batch.acked = true;

        while self.in_flight.front().is_some_and(|batch| batch.acked) {
            let Some(InFlight { id, entries, .. }) = self.in_flight.pop_front() else {
                break;
            };
            // one ack per producer per batch, at its highest sequence number
            let mut latest: Vec<(Arc<ProduceState<E>>, u64)> = Vec::new();
            for (seq, state) in entries {
                let Some(state) = state else {
                    continue;
                };
                match latest.iter_mut().find(|(s, _)| Arc::ptr_eq(s, &state)) {
                    Some((_, last)) => *last = (*last).max(seq),
                    None => latest.push((state, seq)),
                }
            }
            for (state, seq) in latest {
                state.ack(seq);
            }
            trace!(id, "batch acknowledged");
        }
    }

    #[tracing::instrument(skip_all)]
    fn handle_cancel(&mut self, req: ProducerCancelRequest<E>) {
        let ProducerCancelRequest { state, resp } = req;
        // requests still in the intake are discarded by `handle_push` once they arrive
        state.cancel();

        let mut removed = 0;
        let mut kept = VecDeque::with_capacity(self.buffer.len());
        for pushed in self.buffer.drain(..) {
            if pushed.belongs_to(&state) {
                state.drop_event(pushed.event);
                removed += 1;
            } else {
                kept.push_back(pushed);
            }
        }
        self.buffer = kept;

        debug!(removed, "producer cancelled");
        if resp.send(ProducerCancelResponse { removed }).is_err() {
            warn!("producer stopped waiting for cancellation");
        }
    }
}
