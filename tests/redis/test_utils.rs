use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use redis_stream_adapter::{
    adapter::StreamCommandAdapter,
    commands::{AddRecord, CommandError, RangeCommand, ReadCommand},
    config::AdapterConfig,
    connection::{ConnectionProvider, DedicatedChannel},
    memory::{ChannelStats, MemoryConnectionProvider, MemoryEngine},
    native::{
        NativeBody, NativeConsumer, NativeLimit, NativeMessageStream, NativeRange,
        NativeStreamCommands, NativeStreamOffset, XAddArgs, XReadArgs,
    },
    stream::{Body, Record, RecordId},
};

/// Test utilities for building commands and bodies
pub struct TestUtils;

impl TestUtils {
    /// Config with a small dedicated pool that gives up quickly
    pub fn config() -> AdapterConfig {
        AdapterConfig {
            dedicated_channels: 2,
            dedicated_acquire_timeout: Duration::from_millis(100),
            max_concurrent_lengths: 4,
        }
    }

    pub fn body(pairs: &[(&str, &str)]) -> Body {
        pairs
            .iter()
            .map(|(field, value)| {
                (
                    Bytes::copy_from_slice(field.as_bytes()),
                    Bytes::copy_from_slice(value.as_bytes()),
                )
            })
            .collect::<BTreeMap<Bytes, Bytes>>()
    }

    pub fn fruit(name: &str) -> Body {
        Self::body(&[("fruit", name)])
    }

    pub fn add(key: &str, id: &str, fruit: &str) -> AddRecord {
        AddRecord::of(Self::fruit(fruit))
            .to(key.to_string())
            .with_id(id.parse::<RecordId>().unwrap())
    }
}

/// Test environment: an in-memory engine behind a provider and an adapter
pub struct TestEnv {
    pub engine: MemoryEngine,
    pub provider: Arc<MemoryConnectionProvider>,
    pub stats: Arc<ChannelStats>,
    pub adapter: StreamCommandAdapter,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_config(TestUtils::config())
    }

    pub fn with_config(config: AdapterConfig) -> Self {
        let engine = MemoryEngine::new();
        let provider = Arc::new(MemoryConnectionProvider::new(engine.clone(), &config));

        Self {
            engine,
            stats: provider.stats(),
            adapter: StreamCommandAdapter::new(provider.clone(), config),
            provider,
        }
    }

    /// Add records and assert every add succeeds
    pub async fn add_ok(&self, commands: Vec<AddRecord>) -> Vec<RecordId> {
        let responses = self
            .adapter
            .xadd(stream::iter(commands))
            .collect::<Vec<_>>()
            .await;

        responses
            .into_iter()
            .map(|response| response.expect("add failed").into_output())
            .collect()
    }

    /// Run one range command and collect its records
    pub async fn range(&self, command: RangeCommand) -> Result<Vec<Record>, CommandError> {
        let mut responses = self.adapter.xrange(stream::iter([command]));
        let response = responses.next().await.expect("no response");

        match response {
            Ok(response) => response.into_output().try_collect().await,
            Err(failure) => Err(failure.cause),
        }
    }

    /// Run one reverse range command and collect its records
    pub async fn revrange(&self, command: RangeCommand) -> Result<Vec<Record>, CommandError> {
        let mut responses = self.adapter.xrevrange(stream::iter([command]));
        let response = responses.next().await.expect("no response");

        match response {
            Ok(response) => response.into_output().try_collect().await,
            Err(failure) => Err(failure.cause),
        }
    }

    /// Run one read command and collect its records
    pub async fn read(&self, command: ReadCommand) -> Result<Vec<Record>, CommandError> {
        read_records(&self.adapter, command).await
    }

    pub fn ids(records: &[Record]) -> Vec<String> {
        records.iter().map(|record| record.id().value()).collect()
    }
}

pub async fn read_records(
    adapter: &StreamCommandAdapter,
    command: ReadCommand,
) -> Result<Vec<Record>, CommandError> {
    let mut responses = adapter.read(stream::iter([command]));
    let response = responses.next().await.expect("no response");

    match response {
        Ok(response) => response.into_output().try_collect().await,
        Err(failure) => Err(failure.cause),
    }
}

/// Provider whose shared channel fails every keyed call on `broken_key` with a
/// transport error and forwards everything else to a memory provider.
/// Writes on this key succeed but the channel answers with an unreadable id.
pub const GARBLED_KEY: &str = "garbled";

pub struct FaultyProvider {
    inner: Arc<MemoryConnectionProvider>,
    broken_key: Bytes,
}

impl FaultyProvider {
    pub fn new(inner: Arc<MemoryConnectionProvider>, broken_key: &str) -> Self {
        Self {
            inner,
            broken_key: Bytes::copy_from_slice(broken_key.as_bytes()),
        }
    }
}

#[async_trait]
impl ConnectionProvider for FaultyProvider {
    fn shared(&self) -> Arc<dyn NativeStreamCommands> {
        Arc::new(FaultyChannel {
            inner: self.inner.shared(),
            broken_key: self.broken_key.clone(),
        })
    }

    async fn acquire_dedicated(&self) -> Result<DedicatedChannel, CommandError> {
        self.inner.acquire_dedicated().await
    }
}

struct FaultyChannel {
    inner: Arc<dyn NativeStreamCommands>,
    broken_key: Bytes,
}

impl FaultyChannel {
    fn check(&self, key: &Bytes) -> Result<(), CommandError> {
        if *key == self.broken_key {
            return Err(CommandError::Transport("connection reset".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl NativeStreamCommands for FaultyChannel {
    async fn xadd(
        &self,
        key: Bytes,
        args: XAddArgs,
        body: NativeBody,
    ) -> Result<String, CommandError> {
        self.check(&key)?;

        if key == GARBLED_KEY {
            self.inner.xadd(key, args, body).await?;
            return Ok("garbled".to_string());
        }

        self.inner.xadd(key, args, body).await
    }

    async fn xack(&self, key: Bytes, group: Bytes, ids: Vec<String>) -> Result<u64, CommandError> {
        self.check(&key)?;
        self.inner.xack(key, group, ids).await
    }

    async fn xdel(&self, key: Bytes, ids: Vec<String>) -> Result<u64, CommandError> {
        self.check(&key)?;
        self.inner.xdel(key, ids).await
    }

    async fn xlen(&self, key: Bytes) -> Result<u64, CommandError> {
        self.check(&key)?;
        self.inner.xlen(key).await
    }

    fn xrange(
        &self,
        key: Bytes,
        range: NativeRange,
        limit: Option<NativeLimit>,
    ) -> NativeMessageStream {
        match self.check(&key) {
            Ok(()) => self.inner.xrange(key, range, limit),
            Err(error) => stream::once(async move { Err(error) }).boxed(),
        }
    }

    fn xrevrange(
        &self,
        key: Bytes,
        range: NativeRange,
        limit: Option<NativeLimit>,
    ) -> NativeMessageStream {
        match self.check(&key) {
            Ok(()) => self.inner.xrevrange(key, range, limit),
            Err(error) => stream::once(async move { Err(error) }).boxed(),
        }
    }

    fn xread(&self, args: XReadArgs, offsets: Vec<NativeStreamOffset>) -> NativeMessageStream {
        self.inner.xread(args, offsets)
    }

    fn xreadgroup(
        &self,
        consumer: NativeConsumer,
        args: XReadArgs,
        offsets: Vec<NativeStreamOffset>,
    ) -> NativeMessageStream {
        self.inner.xreadgroup(consumer, args, offsets)
    }

    async fn xtrim(&self, key: Bytes, approximate: bool, count: u64) -> Result<u64, CommandError> {
        self.check(&key)?;
        self.inner.xtrim(key, approximate, count).await
    }

    async fn xgroup_create(
        &self,
        offset: NativeStreamOffset,
        group: Bytes,
    ) -> Result<String, CommandError> {
        self.check(&offset.name)?;
        self.inner.xgroup_create(offset, group).await
    }

    async fn xgroup_delconsumer(
        &self,
        key: Bytes,
        consumer: NativeConsumer,
    ) -> Result<bool, CommandError> {
        self.check(&key)?;
        self.inner.xgroup_delconsumer(key, consumer).await
    }

    async fn xgroup_destroy(&self, key: Bytes, group: Bytes) -> Result<bool, CommandError> {
        self.check(&key)?;
        self.inner.xgroup_destroy(key, group).await
    }
}
