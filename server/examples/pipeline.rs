use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use memq_client::ProducerBuilder;
use memq_server::{Broker, Config};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_filter(
                    filter::Targets::new()
                        .with_target("memq_server", Level::TRACE)
                        .with_target("memq_client", Level::DEBUG)
                        .with_target("pipeline", Level::INFO),
                ),
        )
        .init();

    let config = Config {
        events: 64,
        max_batch_size: 16,
    };
    let broker = Broker::<String>::start(config, CancellationToken::new())
        .expect("config is valid");

    let acked = Arc::new(AtomicUsize::new(0));
    let shipper = {
        let acked = acked.clone();
        ProducerBuilder::new(broker.handle())
            .on_ack(move |n| {
                acked.fetch_add(n, Ordering::SeqCst);
            })
            .on_drop(|event| info!(%event, "event retracted"))
            .drop_on_cancel(true)
            .build()
    };
    let metrics = ProducerBuilder::new(broker.handle()).build();

    let consumer = broker.consumer();
    let reader = tokio::spawn(async move {
        let mut shipped = 0;
        while let Ok(batch) = consumer.get(0).await {
            shipped += batch.len();
            info!(id = batch.id(), events = batch.len(), "batch shipped");
            tokio::time::sleep(Duration::from_millis(10)).await;
            if batch.ack().is_err() {
                break;
            }
        }
        shipped
    });

    for i in 0..100 {
        shipper.publish(format!("log line {i}")).await;
        if !metrics.try_publish(format!("metric {i}")) {
            info!(i, "metrics intake full, sample skipped");
        }
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let removed = shipper.cancel().await;
    metrics.cancel().await;
    info!(
        removed,
        acked = acked.load(Ordering::SeqCst),
        "producers cancelled"
    );

    broker.shutdown().await;
    let shipped = reader.await.expect("reader task");
    info!(shipped, "pipeline stopped");
}
