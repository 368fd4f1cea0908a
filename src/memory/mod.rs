//! In-process stream engine and a connection provider built on top of it.
//!
//! The provider hands out one shared channel and a bounded pool of dedicated
//! channels. All channels talk to the same [`MemoryEngine`], they only differ
//! in how they are accounted for.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::{sync::Semaphore, time::timeout};
use tracing::{debug, warn};

use crate::{
    commands::{CommandError, ExecutionChannel},
    config::AdapterConfig,
    connection::{ConnectionProvider, DedicatedChannel},
    native::{
        NativeBody, NativeConsumer, NativeLimit, NativeMessageStream, NativeRange,
        NativeStreamCommands, NativeStreamOffset, XAddArgs, XReadArgs,
    },
};

pub mod engine;
pub mod key_value_store;
pub mod state;

pub use engine::MemoryEngine;

/// Call and lease counters of a [`MemoryConnectionProvider`].
#[derive(Debug, Default)]
pub struct ChannelStats {
    shared_calls: AtomicU64,
    dedicated_calls: AtomicU64,
    dedicated_acquired: AtomicU64,
    dedicated_in_use: AtomicU64,
}

impl ChannelStats {
    pub fn shared_calls(&self) -> u64 {
        self.shared_calls.load(Ordering::SeqCst)
    }

    pub fn dedicated_calls(&self) -> u64 {
        self.dedicated_calls.load(Ordering::SeqCst)
    }

    /// Dedicated leases handed out so far.
    pub fn dedicated_acquired(&self) -> u64 {
        self.dedicated_acquired.load(Ordering::SeqCst)
    }

    /// Dedicated leases not yet released.
    pub fn dedicated_in_use(&self) -> u64 {
        self.dedicated_in_use.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u64 {
        self.shared_calls() + self.dedicated_calls()
    }

    fn record_call(&self, channel: ExecutionChannel) {
        let counter = match channel {
            ExecutionChannel::Shared => &self.shared_calls,
            ExecutionChannel::Dedicated => &self.dedicated_calls,
        };

        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// A channel to the in-memory engine.
#[derive(Debug)]
pub struct MemoryChannel {
    engine: MemoryEngine,
    kind: ExecutionChannel,
    stats: Arc<ChannelStats>,
}

impl MemoryChannel {
    pub fn new(engine: MemoryEngine, kind: ExecutionChannel, stats: Arc<ChannelStats>) -> Self {
        Self {
            engine,
            kind,
            stats,
        }
    }

    fn record_call(&self, command: &str) {
        debug!(channel = ?self.kind, command, "native call");
        self.stats.record_call(self.kind);
    }

    fn read(
        &self,
        args: XReadArgs,
        offsets: Vec<NativeStreamOffset>,
        consumer: Option<NativeConsumer>,
    ) -> NativeMessageStream {
        if args.block.is_some() && self.kind == ExecutionChannel::Shared {
            warn!("blocking read issued on the shared channel");
        }

        let engine = self.engine.clone();

        try_stream! {
            let messages = engine.read(offsets, args, consumer).await?;

            for message in messages {
                yield message;
            }
        }
        .boxed()
    }
}

#[async_trait]
impl NativeStreamCommands for MemoryChannel {
    async fn xadd(
        &self,
        key: Bytes,
        args: XAddArgs,
        body: NativeBody,
    ) -> Result<String, CommandError> {
        self.record_call("XADD");
        self.engine.xadd(key, args.id, body).await
    }

    async fn xack(&self, key: Bytes, group: Bytes, ids: Vec<String>) -> Result<u64, CommandError> {
        self.record_call("XACK");
        self.engine.xack(&key, &group, &ids).await
    }

    async fn xdel(&self, key: Bytes, ids: Vec<String>) -> Result<u64, CommandError> {
        self.record_call("XDEL");
        self.engine.xdel(&key, &ids).await
    }

    async fn xlen(&self, key: Bytes) -> Result<u64, CommandError> {
        self.record_call("XLEN");
        Ok(self.engine.xlen(&key).await)
    }

    fn xrange(
        &self,
        key: Bytes,
        range: NativeRange,
        limit: Option<NativeLimit>,
    ) -> NativeMessageStream {
        self.record_call("XRANGE");
        self.engine.scan(key, range, limit, false)
    }

    fn xrevrange(
        &self,
        key: Bytes,
        range: NativeRange,
        limit: Option<NativeLimit>,
    ) -> NativeMessageStream {
        self.record_call("XREVRANGE");
        self.engine.scan(key, range, limit, true)
    }

    fn xread(&self, args: XReadArgs, offsets: Vec<NativeStreamOffset>) -> NativeMessageStream {
        self.record_call("XREAD");
        self.read(args, offsets, None)
    }

    fn xreadgroup(
        &self,
        consumer: NativeConsumer,
        args: XReadArgs,
        offsets: Vec<NativeStreamOffset>,
    ) -> NativeMessageStream {
        self.record_call("XREADGROUP");
        self.read(args, offsets, Some(consumer))
    }

    async fn xtrim(&self, key: Bytes, approximate: bool, count: u64) -> Result<u64, CommandError> {
        self.record_call("XTRIM");
        Ok(self.engine.xtrim(&key, approximate, count).await)
    }

    async fn xgroup_create(
        &self,
        offset: NativeStreamOffset,
        group: Bytes,
    ) -> Result<String, CommandError> {
        self.record_call("XGROUP CREATE");
        self.engine.xgroup_create(&offset, group).await
    }

    async fn xgroup_delconsumer(
        &self,
        key: Bytes,
        consumer: NativeConsumer,
    ) -> Result<bool, CommandError> {
        self.record_call("XGROUP DELCONSUMER");
        self.engine.xgroup_delconsumer(&key, &consumer).await
    }

    async fn xgroup_destroy(&self, key: Bytes, group: Bytes) -> Result<bool, CommandError> {
        self.record_call("XGROUP DESTROY");
        self.engine.xgroup_destroy(&key, &group).await
    }
}

/// Connection provider over a [`MemoryEngine`] with a bounded dedicated pool.
#[derive(Debug)]
pub struct MemoryConnectionProvider {
    engine: MemoryEngine,
    shared: Arc<MemoryChannel>,
    dedicated: Arc<Semaphore>,
    acquire_timeout: Duration,
    stats: Arc<ChannelStats>,
}

impl MemoryConnectionProvider {
    pub fn new(engine: MemoryEngine, config: &AdapterConfig) -> Self {
        let stats = Arc::new(ChannelStats::default());

        Self {
            shared: Arc::new(MemoryChannel::new(
                engine.clone(),
                ExecutionChannel::Shared,
                Arc::clone(&stats),
            )),
            engine,
            dedicated: Arc::new(Semaphore::new(config.dedicated_channels)),
            acquire_timeout: config.dedicated_acquire_timeout,
            stats,
        }
    }

    pub fn engine(&self) -> &MemoryEngine {
        &self.engine
    }

    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl ConnectionProvider for MemoryConnectionProvider {
    fn shared(&self) -> Arc<dyn NativeStreamCommands> {
        self.shared.clone()
    }

    async fn acquire_dedicated(&self) -> Result<DedicatedChannel, CommandError> {
        let permit = match timeout(
            self.acquire_timeout,
            Arc::clone(&self.dedicated).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(CommandError::ResourceExhaustion(
                    "dedicated channel pool is closed".to_string(),
                ))
            }
            Err(_) => {
                warn!(timeout = ?self.acquire_timeout, "dedicated channel pool exhausted");
                return Err(CommandError::ResourceExhaustion(format!(
                    "no channel became available within {:?}",
                    self.acquire_timeout
                )));
            }
        };

        self.stats.dedicated_acquired.fetch_add(1, Ordering::SeqCst);
        self.stats.dedicated_in_use.fetch_add(1, Ordering::SeqCst);

        let channel = Arc::new(MemoryChannel::new(
            self.engine.clone(),
            ExecutionChannel::Dedicated,
            Arc::clone(&self.stats),
        ));
        let stats = Arc::clone(&self.stats);

        Ok(DedicatedChannel::new(channel, move || {
            stats.dedicated_in_use.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        }))
    }
}
