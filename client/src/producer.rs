use memq_common::{
    ack::{AckHandler, DropHandler, ProduceState},
    intake::BrokerHandle,
};

pub use self::{acker::AckProducer, forgetful::ForgetfulProducer};

mod acker;
mod forgetful;

pub struct ProducerBuilder<E> {
    broker: BrokerHandle<E>,
    ack_cb: Option<AckHandler>,
    drop_cb: Option<DropHandler<E>>,
    drop_on_cancel: bool,
}

impl<E> ProducerBuilder<E> {
    pub fn new(broker: BrokerHandle<E>) -> Self {
        Self {
            broker,
            ack_cb: None,
            drop_cb: None,
            drop_on_cancel: false,
        }
    }

    /// Track acknowledgments, `cb` receives the number of newly acknowledged events.
    ///
    /// Without an ack callback the producer is forgetful.
    pub fn on_ack(mut self, cb: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.ack_cb = Some(Box::new(cb));
        self
    }

    /// Receive events the broker discards instead of acknowledging, ignored by forgetful producers
    pub fn on_drop(mut self, cb: impl Fn(E) + Send + Sync + 'static) -> Self {
        self.drop_cb = Some(Box::new(cb));
        self
    }

    /// Retract unacknowledged events from the broker on cancel
    pub fn drop_on_cancel(mut self, drop_on_cancel: bool) -> Self {
        self.drop_on_cancel = drop_on_cancel;
        self
    }

    pub fn build(self) -> Producer<E> {
        match self.ack_cb {
            Some(ack_cb) => Producer::Ack(AckProducer::new(
                &self.broker,
                ProduceState::new(ack_cb, self.drop_cb),
                self.drop_on_cancel,
            )),
            None => Producer::Forgetful(ForgetfulProducer::new(&self.broker)),
        }
    }
}

pub enum Producer<E> {
    Forgetful(ForgetfulProducer<E>),
    Ack(AckProducer<E>),
}

impl<E> Producer<E> {
    /// Wait until the broker accepts `event`, `false` once the producer is cancelled
    pub async fn publish(&self, event: E) -> bool {
        match self {
            Producer::Forgetful(p) => p.publish(event).await,
            Producer::Ack(p) => p.publish(event).await,
        }
    }

    /// Like `publish` but gives up immediately when the intake is full
    pub fn try_publish(&self, event: E) -> bool {
        match self {
            Producer::Forgetful(p) => p.try_publish(event),
            Producer::Ack(p) => p.try_publish(event),
        }
    }

    pub async fn cancel(&self) -> usize {
        match self {
            Producer::Forgetful(p) => p.cancel(),
            Producer::Ack(p) => p.cancel().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        num::NonZeroUsize,
        sync::Arc,
        time::{Duration, Instant},
    };

    use memq_common::{
        intake::{self, IntakeReceiver},
        request::ProducerCancelResponse,
    };
    use tokio::sync::oneshot;

    use super::*;

    fn broker(capacity: usize) -> (BrokerHandle<u32>, IntakeReceiver<u32>) {
        intake::intake(NonZeroUsize::new(capacity).unwrap())
    }

    fn ack_producer(handle: BrokerHandle<u32>, drop_on_cancel: bool) -> Producer<u32> {
        ProducerBuilder::new(handle)
            .on_ack(|_| {})
            .drop_on_cancel(drop_on_cancel)
            .build()
    }

    #[tokio::test]
    async fn builder_selects_variant() {
        let (handle, _rx) = broker(1);
        let producer = ProducerBuilder::new(handle.clone()).on_drop(|_| {}).build();
        assert!(matches!(producer, Producer::Forgetful(_)));
        assert!(matches!(ack_producer(handle, false), Producer::Ack(_)));
    }

    #[tokio::test]
    async fn forgetful_publishes_until_cancel() {
        let (handle, mut rx) = broker(16);
        let producer = ProducerBuilder::new(handle).build();
        for i in 0..10 {
            assert!(producer.publish(i).await);
        }
        for i in 0..10 {
            let req = rx.events.recv().await.unwrap();
            assert_eq!(req.event, i);
            assert_eq!(req.seq, 0);
            assert!(req.state.is_none());
        }

        assert_eq!(producer.cancel().await, 0);
        assert!(!producer.publish(10).await);
        assert!(!producer.try_publish(11));
        assert!(rx.events.try_recv().is_err());
        assert!(rx.cancel.try_recv().is_err());
    }

    #[tokio::test]
    async fn try_publish_never_blocks() {
        let (handle, _rx) = broker(1);
        let forgetful = ProducerBuilder::new(handle.clone()).build();
        let acker = ack_producer(handle, false);

        let start = Instant::now();
        assert!(forgetful.try_publish(1));
        assert!(!forgetful.try_publish(2));
        assert!(!acker.try_publish(3));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn ack_sequence_is_dense() {
        let (handle, mut rx) = broker(1);
        let producer = ack_producer(handle, false);

        assert!(producer.try_publish(1));
        // full intake rejects without consuming a sequence number
        assert!(!producer.try_publish(2));
        let first = rx.events.recv().await.unwrap();

        for event in 3..=5 {
            assert!(producer.publish(event).await);
            let req = rx.events.recv().await.unwrap();
            assert_eq!(req.event, event);
            assert_eq!(req.seq, event as u64 - 1);
            assert!(Arc::ptr_eq(
                req.state.as_ref().unwrap(),
                first.state.as_ref().unwrap()
            ));
        }
        assert_eq!(first.seq, 1);
    }

    #[tokio::test]
    async fn cancel_without_drop_skips_broker() {
        let (handle, mut rx) = broker(4);
        let producer = ack_producer(handle, false);
        assert!(producer.publish(1).await);

        assert_eq!(producer.cancel().await, 0);
        assert!(rx.cancel.try_recv().is_err());
        assert!(!producer.publish(2).await);
        assert_eq!(rx.events.recv().await.unwrap().seq, 1);
        assert!(rx.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_with_drop_waits_for_broker() {
        let (handle, mut rx) = broker(4);
        let producer = Arc::new(ack_producer(handle, true));
        assert!(producer.publish(1).await);
        let pushed = rx.events.recv().await.unwrap();

        let cancel = {
            let producer = producer.clone();
            tokio::spawn(async move { producer.cancel().await })
        };

        let request = rx.cancel.recv().await.unwrap();
        assert!(pushed.belongs_to(&request.state));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!cancel.is_finished());

        request
            .resp
            .send(ProducerCancelResponse { removed: 3 })
            .unwrap();
        assert_eq!(cancel.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let (handle, mut rx) = broker(4);
        let producer = Arc::new(ack_producer(handle, true));
        let responder = tokio::spawn(async move {
            let mut requests = 0;
            while let Some(request) = rx.cancel.recv().await {
                requests += 1;
                request
                    .resp
                    .send(ProducerCancelResponse { removed: 2 })
                    .ok();
            }
            requests
        });

        assert_eq!(producer.cancel().await, 2);
        assert_eq!(producer.cancel().await, 0);
        drop(producer);
        assert_eq!(responder.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn cancel_with_broker_gone_returns_zero() {
        let (handle, rx) = broker(4);
        let producer = ack_producer(handle, true);
        drop(rx);
        assert_eq!(producer.cancel().await, 0);

        let (handle, mut rx) = broker(4);
        let producer = ack_producer(handle, true);
        let (seen_tx, seen_rx) = oneshot::channel();
        tokio::spawn(async move {
            // drop the response sender without answering
            let request = rx.cancel.recv().await.unwrap();
            drop(request);
            seen_tx.send(()).ok();
        });
        assert_eq!(producer.cancel().await, 0);
        seen_rx.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_publish_and_cancel() {
        let (handle, mut rx) = broker(8);
        let producer = Arc::new(ack_producer(handle, false));

        let consumer = tokio::spawn(async move {
            let mut seqs = Vec::new();
            while let Some(req) = rx.events.recv().await {
                seqs.push(req.seq);
                tokio::task::yield_now().await;
            }
            seqs
        });

        let publishers = (0..50)
            .map(|i| {
                let producer = producer.clone();
                tokio::spawn(async move {
                    let mut accepted = 0;
                    for j in 0..20 {
                        if producer.publish(i * 100 + j).await {
                            accepted += 1;
                        }
                    }
                    accepted
                })
            })
            .collect::<Vec<_>>();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(producer.cancel().await, 0);

        let accepted: usize = futures::future::join_all(publishers)
            .await
            .into_iter()
            .map(|res| res.unwrap())
            .sum();
        drop(producer);

        let seqs = consumer.await.unwrap();
        assert_eq!(accepted, seqs.len());
        let expected = (1..=seqs.len() as u64).collect::<Vec<_>>();
        assert_eq!(seqs, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_forgetful_publish_and_cancel() {
        let (handle, mut rx) = broker(8);
        let producer = Arc::new(ProducerBuilder::new(handle).build());

        let consumer = tokio::spawn(async move {
            let mut received = 0;
            while rx.events.recv().await.is_some() {
                received += 1;
            }
            received
        });

        let publishers = (0..50)
            .map(|i| {
                let producer = producer.clone();
                tokio::spawn(async move { producer.publish(i).await })
            })
            .collect::<Vec<_>>();
        producer.cancel().await;

        let accepted = futures::future::join_all(publishers)
            .await
            .into_iter()
            .filter(|res| *res.as_ref().unwrap())
            .count();
        drop(producer);

        assert_eq!(consumer.await.unwrap(), accepted);
    }
}
