//! Client-side stream values: identifiers, records, cursors and read options.

mod record_id;

use std::{collections::BTreeMap, ops::Bound, time::Duration};

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::commands::CommandError;

pub use record_id::RecordId;

/// Field/value pairs of a single stream entry.
pub type Body = BTreeMap<Bytes, Bytes>;

/// Lazy sequence of records produced by range scans and reads. Nothing is
/// fetched until the stream is polled, and it cannot be restarted.
pub type RecordStream = BoxStream<'static, Result<Record, CommandError>>;

/// One entry of a stream. Records are only produced by reads and range scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    stream: Bytes,
    id: RecordId,
    body: Body,
}

impl Record {
    pub fn new(stream: impl Into<Bytes>, id: RecordId, body: Body) -> Self {
        Self {
            stream: stream.into(),
            id,
            body,
        }
    }

    pub fn stream(&self) -> &Bytes {
        &self.stream
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }
}

/// A named reader within a consumer group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Consumer {
    pub group: String,
    pub name: String,
}

impl Consumer {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

/// Cursor position a read or a group creation starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOffset {
    /// Only entries added after the call (`$`).
    Latest,
    /// Entries never delivered to the consumer group (`>`).
    LastConsumed,
    /// Entries after the given identifier.
    After(RecordId),
}

impl ReadOffset {
    pub fn latest() -> Self {
        ReadOffset::Latest
    }

    pub fn last_consumed() -> Self {
        ReadOffset::LastConsumed
    }

    pub fn after(id: RecordId) -> Self {
        ReadOffset::After(id)
    }

    /// The cursor token understood by the engine.
    pub fn offset(&self) -> String {
        match self {
            ReadOffset::Latest => "$".to_string(),
            ReadOffset::LastConsumed => ">".to_string(),
            ReadOffset::After(id) => id.value(),
        }
    }
}

/// A stream key paired with the cursor to read it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOffset {
    pub key: Bytes,
    pub offset: ReadOffset,
}

impl StreamOffset {
    pub fn create(key: impl Into<Bytes>, offset: ReadOffset) -> Self {
        Self {
            key: key.into(),
            offset,
        }
    }

    pub fn latest(key: impl Into<Bytes>) -> Self {
        Self::create(key, ReadOffset::Latest)
    }

    pub fn last_consumed(key: impl Into<Bytes>) -> Self {
        Self::create(key, ReadOffset::LastConsumed)
    }

    pub fn from_start(key: impl Into<Bytes>) -> Self {
        Self::create(key, ReadOffset::After(RecordId::MIN))
    }
}

/// Options of a read: blocking duration, per-stream count and acknowledgment mode.
///
/// `block` is kept in milliseconds as given by the caller. A negative or absent
/// value means the read never blocks; `0` blocks until data arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    block: Option<i64>,
    count: Option<u64>,
    no_ack: bool,
}

impl ReadOptions {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn block(self, timeout: Duration) -> Self {
        let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        self.block_millis(millis)
    }

    pub fn block_millis(mut self, millis: i64) -> Self {
        self.block = Some(millis);
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn no_ack(mut self) -> Self {
        self.no_ack = true;
        self
    }

    pub fn get_block(&self) -> Option<i64> {
        self.block
    }

    pub fn get_count(&self) -> Option<u64> {
        self.count
    }

    pub fn is_no_ack(&self) -> bool {
        self.no_ack
    }
}

/// Pagination of a range scan. A limit without count is unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limit {
    pub offset: u64,
    pub count: Option<u64>,
}

impl Limit {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn limit() -> Self {
        Self::default()
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn is_unlimited(&self) -> bool {
        self.count.is_none()
    }
}

/// Interval of record identifiers to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub lower: Bound<String>,
    pub upper: Bound<String>,
}

impl Range {
    pub fn new(lower: Bound<String>, upper: Bound<String>) -> Self {
        Self { lower, upper }
    }

    pub fn unbounded() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    pub fn closed(lower: impl Into<String>, upper: impl Into<String>) -> Self {
        Self::new(Bound::Included(lower.into()), Bound::Included(upper.into()))
    }

    pub fn open(lower: impl Into<String>, upper: impl Into<String>) -> Self {
        Self::new(Bound::Excluded(lower.into()), Bound::Excluded(upper.into()))
    }
}
