use std::sync::Arc;

use bytes::Bytes;

use crate::{
    commands::{
        command_error::{require, CommandError},
        stream_utils::{to_native_limit, to_native_range, to_record_stream},
    },
    native::{NativeLimit, NativeRange, NativeStreamCommands},
    stream::{Limit, Range, RecordStream},
};

/// Scans a stream between two identifiers. Used for both scan directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeCommand {
    pub key: Option<Bytes>,
    pub range: Option<Range>,
    pub limit: Option<Limit>,
}

impl RangeCommand {
    /// A scan over the whole stream without limit.
    pub fn stream(key: impl Into<Bytes>) -> Self {
        Self {
            key: Some(key.into()),
            range: Some(Range::unbounded()),
            limit: Some(Limit::unlimited()),
        }
    }

    pub fn within(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub struct XrangeArguments {
    key: Bytes,
    range: NativeRange,
    limit: Option<NativeLimit>,
}

impl XrangeArguments {
    pub fn parse(command: &RangeCommand) -> Result<Self, CommandError> {
        let key = require(&command.key, "Key must not be null")?.clone();
        let range = require(&command.range, "Range must not be null")?;
        let limit = require(&command.limit, "Limit must not be null")?;

        Ok(Self {
            key,
            range: to_native_range(range),
            limit: to_native_limit(limit),
        })
    }
}

/// Ascending scan. Records are fetched as the returned stream is polled.
pub fn xrange(channel: Arc<dyn NativeStreamCommands>, arguments: XrangeArguments) -> RecordStream {
    to_record_stream(channel.xrange(arguments.key, arguments.range, arguments.limit))
}

/// Descending scan. Records are fetched as the returned stream is polled.
pub fn xrevrange(
    channel: Arc<dyn NativeStreamCommands>,
    arguments: XrangeArguments,
) -> RecordStream {
    to_record_stream(channel.xrevrange(arguments.key, arguments.range, arguments.limit))
}
