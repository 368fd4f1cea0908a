use std::{ops::Bound, str::FromStr};

use bytes::Bytes;
use futures::StreamExt;

use crate::{
    commands::command_error::CommandError,
    native::{
        Boundary, NativeConsumer, NativeLimit, NativeMessage, NativeMessageStream, NativeRange,
        NativeStreamOffset, XReadArgs,
    },
    stream::{Consumer, Limit, Range, ReadOptions, Record, RecordId, RecordStream, StreamOffset},
};

/// Converts a client range into the engine's range, keeping each bound's kind.
///
/// An unbounded side becomes `Boundary::Unbounded` (no bound argument), an
/// excluded side becomes `Boundary::Excluding`.
///
/// # Arguments
///
/// * `range` - The client range, with bounds as id strings or `-`/`+`
///
/// # Returns
///
/// * `NativeRange` - Lower and upper boundaries in the engine's form
pub fn to_native_range(range: &Range) -> NativeRange {
    NativeRange {
        lower: to_boundary(&range.lower),
        upper: to_boundary(&range.upper),
    }
}

fn to_boundary(bound: &Bound<String>) -> Boundary {
    match bound {
        Bound::Unbounded => Boundary::Unbounded,
        Bound::Included(value) => Boundary::Including(value.clone()),
        Bound::Excluded(value) => Boundary::Excluding(value.clone()),
    }
}

/// Converts a pagination limit.
///
/// # Arguments
///
/// * `limit` - The client limit, with an offset and an optional count
///
/// # Returns
///
/// * `Some(NativeLimit)` - When a count is set
/// * `None` - When the limit is unlimited, so no limit argument is sent at all
pub fn to_native_limit(limit: &Limit) -> Option<NativeLimit> {
    limit.count.map(|count| NativeLimit {
        offset: limit.offset,
        count,
    })
}

/// Converts identifiers to their string form, keeping the input order.
///
/// # Arguments
///
/// * `record_ids` - Concrete identifiers, e.g. `1526919030474-0`
///
/// # Returns
///
/// * `Vec<String>` - One string per identifier, in the same order
pub fn record_ids_to_strings(record_ids: &[RecordId]) -> Vec<String> {
    if record_ids.len() == 1 {
        return vec![record_ids[0].value()];
    }

    record_ids.iter().map(RecordId::value).collect()
}

/// Pairs a stream key with the engine's cursor token (`$`, `>` or an id).
pub fn to_native_stream_offset(stream_offset: &StreamOffset) -> NativeStreamOffset {
    NativeStreamOffset::new(stream_offset.key.clone(), stream_offset.offset.offset())
}

/// Converts stream offsets in order. The order decides which stream's backlog
/// the engine scans first.
///
/// # Arguments
///
/// * `stream_offsets` - One offset per stream to read
///
/// # Returns
///
/// * `Vec<NativeStreamOffset>` - Key and cursor token pairs, in input order
pub fn to_native_stream_offsets(stream_offsets: &[StreamOffset]) -> Vec<NativeStreamOffset> {
    stream_offsets.iter().map(to_native_stream_offset).collect()
}

pub fn to_native_consumer(consumer: &Consumer) -> NativeConsumer {
    NativeConsumer::new(
        Bytes::copy_from_slice(consumer.group.as_bytes()),
        Bytes::copy_from_slice(consumer.name.as_bytes()),
    )
}

/// Converts read options into XREAD arguments.
///
/// # Arguments
///
/// * `read_options` - Block duration, count and no-ack flag of a read
///
/// # Returns
///
/// * `XReadArgs` - With `block` set only for a non-negative duration, since a
///   negative one means the read never blocks
pub fn to_read_args(read_options: &ReadOptions) -> XReadArgs {
    XReadArgs {
        block: read_options
            .get_block()
            .and_then(|millis| u64::try_from(millis).ok()),
        count: read_options.get_count(),
        no_ack: read_options.is_no_ack(),
    }
}

/// Converts an entry returned by the engine, copying key, id and body as they are.
///
/// # Arguments
///
/// * `message` - A stream entry as the engine returned it
///
/// # Returns
///
/// * `Ok(Record)` - The entry with a parsed identifier
/// * `Err(CommandError)` - If the engine's id is not a concrete stream id
pub fn to_record(message: NativeMessage) -> Result<Record, CommandError> {
    let id = RecordId::from_str(&message.id)?;

    Ok(Record::new(message.stream, id, message.body))
}

/// Converts every entry of an engine stream, passing errors through unchanged.
pub fn to_record_stream(messages: NativeMessageStream) -> RecordStream {
    messages
        .map(|message| message.and_then(to_record))
        .boxed()
}
