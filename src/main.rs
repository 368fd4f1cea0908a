use std::{collections::BTreeMap, sync::Arc};

use anyhow::Context;
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use redis_stream_adapter::{
    adapter::StreamCommandAdapter,
    commands::{AcknowledgeCommand, AddRecord, GroupCommand, KeyCommand, RangeCommand, ReadCommand},
    config::AdapterConfig,
    memory::{MemoryConnectionProvider, MemoryEngine},
    stream::{Body, Consumer, ReadOffset, ReadOptions, RecordId, StreamOffset},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const STREAM_KEY: &str = "orders";

fn order(item: &str, quantity: u32) -> Body {
    BTreeMap::from([
        (Bytes::from("item"), Bytes::from(item.to_string())),
        (Bytes::from("quantity"), Bytes::from(quantity.to_string())),
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AdapterConfig::from_args(std::env::args()).context("invalid command line")?;
    info!(?config, "starting stream adapter demo");

    let provider = Arc::new(MemoryConnectionProvider::new(MemoryEngine::new(), &config));
    let stats = provider.stats();
    let adapter = StreamCommandAdapter::new(provider, config);

    let added = adapter
        .xadd(stream::iter([
            AddRecord::of(order("apples", 3)).to(STREAM_KEY),
            AddRecord::of(order("pears", 1)).to(STREAM_KEY),
            AddRecord::of(order("plums", 12)).to(STREAM_KEY),
        ]))
        .map_ok(|response| response.into_output())
        .try_collect::<Vec<_>>()
        .await?;
    info!(ids = ?added, "records added");

    let mut ranges = adapter.xrange(stream::iter([RangeCommand::stream(STREAM_KEY)]));
    while let Some(response) = ranges.next().await {
        let mut records = response?.into_output();

        while let Some(record) = records.next().await {
            let record = record?;
            info!(id = %record.id(), body = ?record.body(), "range");
        }
    }

    let created = adapter
        .xgroup(stream::iter([GroupCommand::create_group(ReadOffset::after(RecordId::MIN))
            .at(STREAM_KEY)
            .group("billing")]))
        .map_ok(|response| response.into_output())
        .try_collect::<Vec<_>>()
        .await?;
    info!(status = ?created, "consumer group created");

    let read = ReadCommand::new([StreamOffset::last_consumed(STREAM_KEY)])
        .read_options(ReadOptions::empty().block_millis(100).count(2))
        .as_consumer(Consumer::new("billing", "worker-1"));

    let mut delivered = Vec::new();
    let mut reads = adapter.read(stream::iter([read]));
    while let Some(response) = reads.next().await {
        let mut records = response?.into_output();

        while let Some(record) = records.next().await {
            let record = record?;
            info!(id = %record.id(), "delivered to worker-1");
            delivered.push(record.id());
        }
    }

    let acknowledged = adapter
        .xack(stream::iter([AcknowledgeCommand::stream(STREAM_KEY)
            .group("billing")
            .records(delivered)]))
        .map_ok(|response| response.into_output())
        .try_collect::<Vec<_>>()
        .await?;
    info!(count = ?acknowledged, "records acknowledged");

    let lengths = adapter
        .xlen(stream::iter([KeyCommand::new(STREAM_KEY)]))
        .map_ok(|response| response.into_output())
        .try_collect::<Vec<_>>()
        .await?;
    info!(length = ?lengths, "stream length");

    info!(
        shared_calls = stats.shared_calls(),
        dedicated_calls = stats.dedicated_calls(),
        dedicated_acquired = stats.dedicated_acquired(),
        "done"
    );

    Ok(())
}
