use std::collections::{BTreeMap, HashMap, HashSet};

use bytes::Bytes;

use crate::{native::NativeBody, stream::RecordId};

/// Delivery bookkeeping for one entry handed to a consumer and not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub consumer: Bytes,
    pub delivery_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroup {
    pub last_delivered: RecordId,
    pub pending: BTreeMap<RecordId, PendingEntry>,
    pub consumers: HashSet<Bytes>,
}

impl ConsumerGroup {
    pub fn new(last_delivered: RecordId) -> Self {
        Self {
            last_delivered,
            pending: BTreeMap::new(),
            consumers: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub entries: BTreeMap<RecordId, NativeBody>,
    /// Highest id ever added. Deleting or trimming entries never lowers it.
    pub last_id: RecordId,
    pub groups: HashMap<Bytes, ConsumerGroup>,
}

impl Stream {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            last_id: RecordId::MIN,
            groups: HashMap::new(),
        }
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::new()
    }
}

pub type KeyValueStore = HashMap<Bytes, Stream>;
