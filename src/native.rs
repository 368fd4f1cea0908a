//! Engine-native argument types and the command channel they are sent through.
//!
//! Everything in here speaks the engine's vocabulary: identifiers and cursors
//! are plain strings, group and consumer names are raw bytes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::commands::CommandError;

pub type NativeBody = BTreeMap<Bytes, Bytes>;

/// Lazy sequence of entries returned by scans and reads.
pub type NativeMessageStream = BoxStream<'static, Result<NativeMessage, CommandError>>;

/// One bound of a native range scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    Unbounded,
    Including(String),
    Excluding(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRange {
    pub lower: Boundary,
    pub upper: Boundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeLimit {
    pub offset: u64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStreamOffset {
    pub name: Bytes,
    pub offset: String,
}

impl NativeStreamOffset {
    pub fn new(name: Bytes, offset: impl Into<String>) -> Self {
        Self {
            name,
            offset: offset.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeConsumer {
    pub group: Bytes,
    pub name: Bytes,
}

impl NativeConsumer {
    pub fn new(group: Bytes, name: Bytes) -> Self {
        Self { group, name }
    }
}

/// XADD arguments. Without an id the engine generates one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XAddArgs {
    pub id: Option<String>,
}

impl XAddArgs {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// XREAD/XREADGROUP arguments. `block` of `0` waits forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XReadArgs {
    pub block: Option<u64>,
    pub count: Option<u64>,
    pub no_ack: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeMessage {
    pub stream: Bytes,
    pub id: String,
    pub body: NativeBody,
}

/// Stream commands understood by an execution engine.
///
/// One method per native command. Single-value commands resolve once; scans and
/// reads return lazy streams that only reach the engine when polled.
#[async_trait]
pub trait NativeStreamCommands: Send + Sync {
    async fn xadd(&self, key: Bytes, args: XAddArgs, body: NativeBody)
        -> Result<String, CommandError>;

    async fn xack(&self, key: Bytes, group: Bytes, ids: Vec<String>) -> Result<u64, CommandError>;

    async fn xdel(&self, key: Bytes, ids: Vec<String>) -> Result<u64, CommandError>;

    async fn xlen(&self, key: Bytes) -> Result<u64, CommandError>;

    fn xrange(
        &self,
        key: Bytes,
        range: NativeRange,
        limit: Option<NativeLimit>,
    ) -> NativeMessageStream;

    fn xrevrange(
        &self,
        key: Bytes,
        range: NativeRange,
        limit: Option<NativeLimit>,
    ) -> NativeMessageStream;

    fn xread(&self, args: XReadArgs, offsets: Vec<NativeStreamOffset>) -> NativeMessageStream;

    fn xreadgroup(
        &self,
        consumer: NativeConsumer,
        args: XReadArgs,
        offsets: Vec<NativeStreamOffset>,
    ) -> NativeMessageStream;

    async fn xtrim(&self, key: Bytes, approximate: bool, count: u64)
        -> Result<u64, CommandError>;

    async fn xgroup_create(
        &self,
        offset: NativeStreamOffset,
        group: Bytes,
    ) -> Result<String, CommandError>;

    async fn xgroup_delconsumer(
        &self,
        key: Bytes,
        consumer: NativeConsumer,
    ) -> Result<bool, CommandError>;

    async fn xgroup_destroy(&self, key: Bytes, group: Bytes) -> Result<bool, CommandError>;
}
