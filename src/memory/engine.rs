use std::{
    ops::Bound,
    str::FromStr,
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_stream::try_stream;
use bytes::Bytes;
use futures::StreamExt;
use tokio::{
    sync::{mpsc, Mutex},
    time::Instant,
};
use tracing::debug;

use crate::{
    commands::CommandError,
    memory::{
        key_value_store::{ConsumerGroup, KeyValueStore, PendingEntry, Stream},
        state::{State, Subscriber},
    },
    native::{
        Boundary, NativeBody, NativeConsumer, NativeLimit, NativeMessage, NativeMessageStream,
        NativeRange, NativeStreamOffset, XReadArgs,
    },
    stream::RecordId,
};

/// Entries fetched per store lock while scanning a range.
const PAGE_SIZE: usize = 64;

const INVALID_ID: &str = "ERR Invalid stream ID specified as stream command argument";
const ID_NOT_GREATER_THAN_ZERO: &str = "ERR The ID specified in XADD must be greater than 0-0";
const ID_NOT_GREATER_THAN_TOP: &str =
    "ERR The ID specified in XADD is equal or smaller than the target stream top item";
const KEY_REQUIRED: &str = "ERR The XGROUP subcommand requires the key to exist. Note that for CREATE you may want to use the MKSTREAM option to create an empty stream automatically.";

#[derive(Debug, Default)]
pub struct Inner {
    pub store: KeyValueStore,
    pub state: State,
}

/// Stream engine keeping everything in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    inner: Arc<Mutex<Inner>>,
}

/// Resolved position of one stream in a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    After(RecordId),
    Undelivered,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn xadd(
        &self,
        key: Bytes,
        id: Option<String>,
        body: NativeBody,
    ) -> Result<String, CommandError> {
        if body.is_empty() {
            return Err(server_error(
                "ERR wrong number of arguments for 'xadd' command",
            ));
        }

        let mut guard = self.inner.lock().await;
        let Inner { store, state } = &mut *guard;

        let last_id = store
            .get(&key)
            .map(|stream| stream.last_id)
            .unwrap_or(RecordId::MIN);
        let record_id = next_record_id(last_id, id.as_deref(), get_timestamp_in_milliseconds()?)?;

        let stream = store.entry(key.clone()).or_default();
        stream.entries.insert(record_id, body);
        stream.last_id = record_id;

        state.send_to_subscribers(&key);
        debug!(key = ?key, id = %record_id, "entry added");

        Ok(record_id.value())
    }

    pub async fn xlen(&self, key: &Bytes) -> u64 {
        let guard = self.inner.lock().await;

        guard
            .store
            .get(key)
            .map(|stream| stream.entries.len() as u64)
            .unwrap_or(0)
    }

    pub async fn xdel(&self, key: &Bytes, ids: &[String]) -> Result<u64, CommandError> {
        let ids = parse_record_ids(ids)?;
        let mut guard = self.inner.lock().await;

        let Some(stream) = guard.store.get_mut(key) else {
            return Ok(0);
        };

        let deleted = ids
            .iter()
            .filter(|id| stream.entries.remove(*id).is_some())
            .count();

        Ok(deleted as u64)
    }

    /// Keeps the newest `count` entries. Trimming is always exact, which also
    /// satisfies approximate requests.
    pub async fn xtrim(&self, key: &Bytes, approximate: bool, count: u64) -> u64 {
        let mut guard = self.inner.lock().await;

        let Some(stream) = guard.store.get_mut(key) else {
            return 0;
        };

        let mut removed = 0;
        while stream.entries.len() as u64 > count {
            stream.entries.pop_first();
            removed += 1;
        }

        debug!(key = ?key, approximate, removed, "stream trimmed");
        removed
    }

    pub async fn xack(
        &self,
        key: &Bytes,
        group: &Bytes,
        ids: &[String],
    ) -> Result<u64, CommandError> {
        let ids = parse_record_ids(ids)?;
        let mut guard = self.inner.lock().await;

        let Some(group) = guard
            .store
            .get_mut(key)
            .and_then(|stream| stream.groups.get_mut(group))
        else {
            return Ok(0);
        };

        let acknowledged = ids
            .iter()
            .filter(|id| group.pending.remove(*id).is_some())
            .count();

        Ok(acknowledged as u64)
    }

    pub async fn xgroup_create(
        &self,
        offset: &NativeStreamOffset,
        group: Bytes,
    ) -> Result<String, CommandError> {
        let mut guard = self.inner.lock().await;

        let Some(stream) = guard.store.get_mut(&offset.name) else {
            return Err(server_error(KEY_REQUIRED));
        };

        if stream.groups.contains_key(&group) {
            return Err(server_error(
                "BUSYGROUP Consumer Group name already exists",
            ));
        }

        let last_delivered = match offset.offset.as_str() {
            "$" => stream.last_id,
            token => parse_stream_id(token, 0)?,
        };

        stream
            .groups
            .insert(group.clone(), ConsumerGroup::new(last_delivered));
        debug!(key = ?offset.name, group = ?group, %last_delivered, "consumer group created");

        Ok("OK".to_string())
    }

    /// Removes a consumer and drops its pending entries. Returns whether the
    /// consumer existed.
    pub async fn xgroup_delconsumer(
        &self,
        key: &Bytes,
        consumer: &NativeConsumer,
    ) -> Result<bool, CommandError> {
        let mut guard = self.inner.lock().await;

        let Some(stream) = guard.store.get_mut(key) else {
            return Err(server_error(KEY_REQUIRED));
        };

        let Some(group) = stream.groups.get_mut(&consumer.group) else {
            return Err(no_group(key, &consumer.group));
        };

        if !group.consumers.remove(&consumer.name) {
            return Ok(false);
        }

        group
            .pending
            .retain(|_, pending_entry| pending_entry.consumer != consumer.name);

        Ok(true)
    }

    pub async fn xgroup_destroy(&self, key: &Bytes, group: &Bytes) -> Result<bool, CommandError> {
        let mut guard = self.inner.lock().await;

        let Some(stream) = guard.store.get_mut(key) else {
            return Err(server_error(KEY_REQUIRED));
        };

        Ok(stream.groups.remove(group).is_some())
    }

    /// Number of pending entries of a group, or `None` if the group is unknown.
    pub async fn pending_count(&self, key: &Bytes, group: &Bytes) -> Option<usize> {
        let guard = self.inner.lock().await;

        guard
            .store
            .get(key)
            .and_then(|stream| stream.groups.get(group))
            .map(|group| group.pending.len())
    }

    /// Lazily scans a stream, one page per store lock.
    pub fn scan(
        &self,
        key: Bytes,
        range: NativeRange,
        limit: Option<NativeLimit>,
        reverse: bool,
    ) -> NativeMessageStream {
        let engine = self.clone();

        try_stream! {
            let lower = to_scan_bound(&range.lower, 0)?;
            let upper = to_scan_bound(&range.upper, u64::MAX)?;
            let mut skip = limit.map(|limit| limit.offset).unwrap_or(0);
            let mut remaining = limit.map(|limit| limit.count).unwrap_or(u64::MAX);
            let mut cursor: Option<RecordId> = None;

            while remaining > 0 {
                let page = engine.scan_page(&key, &lower, &upper, cursor, reverse).await;
                let is_last_page = page.len() < PAGE_SIZE;

                for (id, body) in page {
                    cursor = Some(id);

                    if skip > 0 {
                        skip -= 1;
                        continue;
                    }

                    if remaining == 0 {
                        break;
                    }
                    remaining -= 1;

                    yield NativeMessage {
                        stream: key.clone(),
                        id: id.value(),
                        body,
                    };
                }

                if is_last_page {
                    break;
                }
            }
        }
        .boxed()
    }

    async fn scan_page(
        &self,
        key: &Bytes,
        lower: &Bound<RecordId>,
        upper: &Bound<RecordId>,
        cursor: Option<RecordId>,
        reverse: bool,
    ) -> Vec<(RecordId, NativeBody)> {
        let guard = self.inner.lock().await;

        let Some(stream) = guard.store.get(key) else {
            return Vec::new();
        };

        let entries: Box<dyn Iterator<Item = (&RecordId, &NativeBody)> + '_> = match (reverse, cursor) {
            (false, None) => Box::new(stream.entries.iter()),
            (false, Some(cursor)) => Box::new(
                stream
                    .entries
                    .range((Bound::Excluded(cursor), Bound::Unbounded)),
            ),
            (true, None) => Box::new(stream.entries.iter().rev()),
            (true, Some(cursor)) => Box::new(
                stream
                    .entries
                    .range((Bound::Unbounded, Bound::Excluded(cursor)))
                    .rev(),
            ),
        };

        let entries: Box<dyn Iterator<Item = (&RecordId, &NativeBody)> + '_> = if reverse {
            Box::new(
                entries
                    .skip_while(|(id, _)| !is_at_or_before(upper, id))
                    .take_while(|(id, _)| is_at_or_after(lower, id)),
            )
        } else {
            Box::new(
                entries
                    .skip_while(|(id, _)| !is_at_or_after(lower, id))
                    .take_while(|(id, _)| is_at_or_before(upper, id)),
            )
        };

        entries
            .take(PAGE_SIZE)
            .map(|(id, body)| (*id, body.clone()))
            .collect()
    }

    /// Reads entries after each cursor, in the order the streams were given.
    ///
    /// With `block` set and nothing to return, waits for an XADD on any of the
    /// keys (forever for `0`) and reads again. `$` is resolved once, when the
    /// call starts. With a consumer, `>` delivers new entries to the group and
    /// an explicit id returns the consumer's pending history after that id.
    pub async fn read(
        &self,
        offsets: Vec<NativeStreamOffset>,
        args: XReadArgs,
        consumer: Option<NativeConsumer>,
    ) -> Result<Vec<NativeMessage>, CommandError> {
        let deadline = match args.block {
            Some(0) | None => None,
            Some(millis) => Some(Instant::now() + Duration::from_millis(millis)),
        };

        let mut guard = self.inner.lock().await;
        let cursors = resolve_cursors(&guard.store, &offsets, consumer.is_some())?;
        let can_block = args.block.is_some()
            && cursors
                .iter()
                .all(|(_, cursor)| consumer.is_none() || *cursor == Cursor::Undelivered);

        loop {
            let messages = match &consumer {
                None => read_streams(&guard.store, &cursors, args.count),
                Some(consumer) => read_group(&mut guard.store, &cursors, consumer, &args)?,
            };

            if !messages.is_empty() || !can_block {
                return Ok(messages);
            }

            let (sender, mut receiver) = mpsc::channel(1);
            for (key, _) in &cursors {
                guard.state.add_subscriber(
                    key.clone(),
                    Subscriber {
                        sender: sender.clone(),
                    },
                );
            }
            drop(guard);

            let woken = wait_for_data(&mut receiver, deadline).await;

            guard = self.inner.lock().await;
            guard
                .state
                .remove_subscribers(cursors.iter().map(|(key, _)| key), &sender);

            if !woken {
                return Ok(Vec::new());
            }
        }
    }
}

fn resolve_cursors(
    store: &KeyValueStore,
    offsets: &[NativeStreamOffset],
    is_group_read: bool,
) -> Result<Vec<(Bytes, Cursor)>, CommandError> {
    let mut cursors = Vec::with_capacity(offsets.len());

    for offset in offsets {
        let cursor = match (offset.offset.as_str(), is_group_read) {
            ("$", false) => Cursor::After(
                store
                    .get(&offset.name)
                    .map(|stream| stream.last_id)
                    .unwrap_or(RecordId::MIN),
            ),
            ("$", true) => {
                return Err(server_error(
                    "ERR The $ ID is meaningless in the context of XREADGROUP",
                ))
            }
            (">", true) => Cursor::Undelivered,
            (">", false) => {
                return Err(server_error(
                    "ERR The > ID can be specified only when calling XREADGROUP",
                ))
            }
            (token, _) => Cursor::After(parse_stream_id(token, 0)?),
        };

        cursors.push((offset.name.clone(), cursor));
    }

    Ok(cursors)
}

fn read_streams(
    store: &KeyValueStore,
    cursors: &[(Bytes, Cursor)],
    count: Option<u64>,
) -> Vec<NativeMessage> {
    let mut messages = Vec::new();

    for (key, cursor) in cursors {
        let (Some(stream), Cursor::After(after)) = (store.get(key), cursor) else {
            continue;
        };

        messages.extend(
            stream
                .entries
                .range((Bound::Excluded(*after), Bound::Unbounded))
                .take(count_limit(count))
                .map(|(id, body)| NativeMessage {
                    stream: key.clone(),
                    id: id.value(),
                    body: body.clone(),
                }),
        );
    }

    messages
}

fn read_group(
    store: &mut KeyValueStore,
    cursors: &[(Bytes, Cursor)],
    consumer: &NativeConsumer,
    args: &XReadArgs,
) -> Result<Vec<NativeMessage>, CommandError> {
    let mut messages = Vec::new();

    for (key, cursor) in cursors {
        let Some(Stream {
            entries, groups, ..
        }) = store.get_mut(key)
        else {
            return Err(no_group(key, &consumer.group));
        };

        let Some(group) = groups.get_mut(&consumer.group) else {
            return Err(no_group(key, &consumer.group));
        };

        group.consumers.insert(consumer.name.clone());

        match cursor {
            Cursor::Undelivered => {
                let delivered = entries
                    .range((Bound::Excluded(group.last_delivered), Bound::Unbounded))
                    .take(count_limit(args.count))
                    .map(|(id, body)| (*id, body.clone()))
                    .collect::<Vec<(RecordId, NativeBody)>>();

                for (id, body) in delivered {
                    group.last_delivered = id;

                    if !args.no_ack {
                        group.pending.insert(
                            id,
                            PendingEntry {
                                consumer: consumer.name.clone(),
                                delivery_count: 1,
                            },
                        );
                    }

                    messages.push(NativeMessage {
                        stream: key.clone(),
                        id: id.value(),
                        body,
                    });
                }
            }
            Cursor::After(after) => {
                let history = group
                    .pending
                    .range((Bound::Excluded(*after), Bound::Unbounded))
                    .filter(|(_, pending_entry)| pending_entry.consumer == consumer.name)
                    .take(count_limit(args.count))
                    .map(|(id, _)| *id)
                    .collect::<Vec<RecordId>>();

                for id in history {
                    messages.push(NativeMessage {
                        stream: key.clone(),
                        id: id.value(),
                        body: entries.get(&id).cloned().unwrap_or_default(),
                    });
                }
            }
        }
    }

    Ok(messages)
}

/// Waits for an XADD notification. Returns `false` on timeout.
async fn wait_for_data(receiver: &mut mpsc::Receiver<()>, deadline: Option<Instant>) -> bool {
    match deadline {
        None => receiver.recv().await.is_some(),
        Some(deadline) => matches!(
            tokio::time::timeout_at(deadline, receiver.recv()).await,
            Ok(Some(()))
        ),
    }
}

/// Picks the id of a new entry given the stream's top item.
///
/// `*` uses the current time, or continues the top item's sequence if the
/// clock is behind it. `ms-*` picks the next sequence for `ms`. Explicit ids
/// must be greater than both `0-0` and the top item.
fn next_record_id(
    last_id: RecordId,
    requested: Option<&str>,
    now_millis: u64,
) -> Result<RecordId, CommandError> {
    let requested = match requested {
        None => RecordId::AutoGenerate,
        Some(value) => RecordId::from_str(value).map_err(|_| server_error(INVALID_ID))?,
    };

    let last_millis = last_id.timestamp().unwrap_or(0);
    let last_sequence = last_id.sequence().unwrap_or(0);

    match requested {
        RecordId::AutoGenerate if now_millis > last_millis => Ok(RecordId::of(now_millis, 0)),
        RecordId::AutoGenerate => Ok(RecordId::of(last_millis, next_sequence(last_sequence)?)),
        RecordId::AutoSequence(millis) if millis > last_millis => Ok(RecordId::of(millis, 0)),
        RecordId::AutoSequence(millis) if millis == last_millis => {
            Ok(RecordId::of(millis, next_sequence(last_sequence)?))
        }
        RecordId::AutoSequence(_) => Err(server_error(ID_NOT_GREATER_THAN_TOP)),
        RecordId::Concrete { .. } if requested == RecordId::MIN => {
            Err(server_error(ID_NOT_GREATER_THAN_ZERO))
        }
        RecordId::Concrete { .. } if requested <= last_id => {
            Err(server_error(ID_NOT_GREATER_THAN_TOP))
        }
        RecordId::Concrete { .. } => Ok(requested),
    }
}

fn next_sequence(sequence: u64) -> Result<u64, CommandError> {
    sequence
        .checked_add(1)
        .ok_or_else(|| server_error(ID_NOT_GREATER_THAN_TOP))
}

/// Parses "ms-seq", or the "ms" shorthand whose sequence becomes
/// `missing_sequence`. `-` and `+` stand for the smallest and largest ids.
fn parse_stream_id(value: &str, missing_sequence: u64) -> Result<RecordId, CommandError> {
    match value {
        "-" => return Ok(RecordId::MIN),
        "+" => return Ok(RecordId::MAX),
        _ => (),
    }

    let split_value = value.split('-').collect::<Vec<&str>>();

    if split_value.len() > 2 {
        return Err(server_error(INVALID_ID));
    }

    let millis = split_value[0]
        .parse::<u64>()
        .map_err(|_| server_error(INVALID_ID))?;

    let sequence = match split_value.get(1) {
        Some(sequence) => sequence
            .parse::<u64>()
            .map_err(|_| server_error(INVALID_ID))?,
        None => missing_sequence,
    };

    Ok(RecordId::of(millis, sequence))
}

fn parse_record_ids(ids: &[String]) -> Result<Vec<RecordId>, CommandError> {
    ids.iter().map(|id| parse_stream_id(id, 0)).collect()
}

fn to_scan_bound(boundary: &Boundary, missing_sequence: u64) -> Result<Bound<RecordId>, CommandError> {
    match boundary {
        Boundary::Unbounded => Ok(Bound::Unbounded),
        Boundary::Including(value) => Ok(Bound::Included(parse_stream_id(value, missing_sequence)?)),
        Boundary::Excluding(value) => Ok(Bound::Excluded(parse_stream_id(value, missing_sequence)?)),
    }
}

fn is_at_or_after(lower: &Bound<RecordId>, id: &RecordId) -> bool {
    match lower {
        Bound::Unbounded => true,
        Bound::Included(bound) => id >= bound,
        Bound::Excluded(bound) => id > bound,
    }
}

fn is_at_or_before(upper: &Bound<RecordId>, id: &RecordId) -> bool {
    match upper {
        Bound::Unbounded => true,
        Bound::Included(bound) => id <= bound,
        Bound::Excluded(bound) => id < bound,
    }
}

/// A missing or zero count reads everything.
fn count_limit(count: Option<u64>) -> usize {
    match count {
        None | Some(0) => usize::MAX,
        Some(count) => usize::try_from(count).unwrap_or(usize::MAX),
    }
}

fn get_timestamp_in_milliseconds() -> Result<u64, CommandError> {
    let duration_since_epoch = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| server_error("ERR system time is before unix epoch"))?;

    Ok(u64::try_from(duration_since_epoch.as_millis()).unwrap_or(u64::MAX))
}

fn server_error(message: &str) -> CommandError {
    CommandError::Server(message.to_string())
}

fn no_group(key: &Bytes, group: &Bytes) -> CommandError {
    CommandError::Server(format!(
        "NOGROUP No such key '{}' or consumer group '{}'",
        String::from_utf8_lossy(key),
        String::from_utf8_lossy(group)
    ))
}
